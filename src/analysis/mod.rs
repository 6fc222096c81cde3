//! Signal conditioning for decoded recordings.
//!
//! - [`design`] turns a [`FilterSpec`] into a biquad cascade
//! - [`filters`] runs cascades over samples, one channel or many
//! - [`response`] evaluates frequency and transient responses
//! - [`resample`] decimates signals for display

pub mod complex;
pub mod design;
pub mod filters;
pub mod resample;
pub mod response;
pub mod tables;

use thiserror::Error;

pub use design::{design, Behavior, Biquad, Characteristic, FilterSpec, Transform};
pub use filters::{Cascade, ChannelId, DelayState, FilterBank, FilterEngine};
pub use resample::{resample, resample_pair};
pub use response::{Marker, ResponsePoint, TransientResponse};

/// Errors raised while designing or running filters
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Missing required filter parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Unknown filter behavior: {0}")]
    UnknownBehavior(String),

    #[error("Unknown filter characteristic: {0}")]
    UnknownCharacteristic(String),

    #[error("Unknown filter transform: {0}")]
    UnknownTransform(String),

    #[error("The {transform} transform does not support {behavior} filters")]
    UnsupportedBehavior {
        behavior: Behavior,
        transform: Transform,
    },

    #[error("Invalid filter parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown channel {channel} (bank has {count})")]
    UnknownChannel { channel: ChannelId, count: usize },
}
