//! Routing Node Module
//!
//! Translates short-URL keys into storage shards.
//!
//! ## Core Concepts
//! - **Placement**: the primary shard is `hash(short) mod N` over the node's current shard list.
//! - **Replication**: writes also go, best effort, to the next and previous shard in the list.
//! - **Fallback reads**: an empty primary read is retried on the neighbours before reporting 404.
//! - **Membership**: the control plane pushes the active shard list with UPDATE; it replaces the
//!   old list in one swap.

pub mod partitioner;
pub mod service;

#[cfg(test)]
mod tests;
