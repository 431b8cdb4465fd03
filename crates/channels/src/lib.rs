//! Multi-channel distribution of approved content.
//!
//! Publishing: one [`ChannelPublisher`] call per channel, isolated per task.
//! Registry: the static channel table from configuration decides which
//! requested channels exist and are enabled.

pub mod distribution;
pub mod publisher;

pub use distribution::DistributionEngine;
pub use publisher::{prepare_payload, ChannelPublisher, PublishReceipt, SimulatedPublisher};
