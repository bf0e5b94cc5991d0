//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the caches.
//!
//! # Tasks
//! - Sweeper: removes expired entries from every store at a configured
//!   interval

mod sweeper;

pub use sweeper::spawn_sweeper_task;
