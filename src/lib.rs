//! Distributed URL Shortener Library
//!
//! Core modules of a four-tier URL shortener. The binary (`main.rs`) starts one of
//! the tiers per process.
//!
//! ## Architecture Modules
//! - **`cluster`**: What every tier shares: addresses, the line protocol, the TCP server
//!   loop, the client side of an exchange, input validation and the static cluster file.
//! - **`storage`**: Storage shards. Each owns one slice of the short-to-long mapping,
//!   persisted in a local file.
//! - **`routing`**: Routing nodes. Validate requests, pick shards by hash and replicate
//!   writes to neighbouring shards.
//! - **`balancer`**: The client entry point. Round-robins over routing nodes and caches
//!   recent lookups.
//! - **`admin`**: The control plane. Health-checks every server, pushes membership to the
//!   tiers that route on it and relaunches failed servers.

pub mod admin;
pub mod balancer;
pub mod cluster;
pub mod error;
pub mod routing;
pub mod storage;
