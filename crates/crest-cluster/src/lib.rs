//! crest-cluster — Kubernetes scale-subresource backend.
//!
//! Resizes the pools under test through the cluster API. Scaling is a
//! read-modify-write of the scale subresource, so concurrent changes
//! fail loudly instead of being overwritten.

pub mod client;
pub mod pool;

pub use client::{ClusterClient, Scale, ScaleSpec, ScaleStatus};
pub use pool::ScaledPool;
