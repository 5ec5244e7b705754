//! Load Balancer Module
//!
//! Entry point for clients. Each client connection is one HTTP-shaped request,
//! relayed to a routing node and answered with that node's reply.
//!
//! ## Core Concepts
//! - **Round-robin**: a cursor over the current node list advances once per selection; a refused
//!   connection moves on to the next node, up to a fixed number of attempts.
//! - **Cache**: successful reads (307) and writes (201) are cached; a cached GET is answered
//!   without contacting any node. A background sweep drops entries past their TTL.
//! - **Membership**: UPDATE from the control plane replaces the node list and resets the cursor.

pub mod cache;
pub mod selector;
pub mod service;
