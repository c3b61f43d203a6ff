//! Background Tasks Module
//!
//! Tasks that run alongside a cache engine for its lifetime.
//!
//! # Tasks
//! - TTL sweeper: removes expired entries at the configured interval

mod sweep;

pub(crate) use sweep::spawn_sweeper;
