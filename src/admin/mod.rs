//! Admin Module
//!
//! The control plane. Knows every server in the cluster, decides which of them are
//! alive, and keeps the load balancers and routing nodes pointed at live peers.
//!
//! ## Core Concepts
//! - **Membership**: the known set plus one active list per tier. Changes raise pending
//!   pushes instead of being sent immediately.
//! - **Monitoring cycle**: probe every known server, push the lists that changed, then hand
//!   every silent server to the launcher. Runs every two seconds while enabled.
//! - **Scale**: operators add or remove servers through the HTTP control surface.

pub mod handlers;
pub mod launcher;
pub mod membership;
pub mod service;
