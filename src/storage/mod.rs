//! Storage Shard Module
//!
//! A shard is a single-process key/value store for `short -> long` URL pairs.
//! Shards know nothing about each other; placement and replication are decided
//! by the routing tier.
//!
//! ## Core Concepts
//! - **Point operations**: READ (empty reply = not found), WRITE (upsert, last writer wins), STATUS.
//! - **Self-healing store**: a corrupt or unreadable store is dropped, recreated empty and the
//!   operation retried once; a second failure stops the shard.

pub mod service;
pub mod store;
