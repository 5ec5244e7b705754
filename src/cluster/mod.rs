//! Cluster Plumbing
//!
//! Everything the four tiers share: server identity, the line protocol, the
//! one-shot peer client, the bounded connection server, static configuration
//! and URL validation.
//!
//! ## Core Concepts
//! - **Address**: `(tier, host, port)` value; the unit of membership everywhere.
//! - **One exchange per connection**: a request, a reply, then close. No pipelining.
//! - **Degrade, don't raise**: every peer call yields a `Result`; callers treat an error as "peer down".

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod types;
pub mod validation;
