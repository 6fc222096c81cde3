//! edfscope - EDF/EDF+ recording decoding and signal conditioning
//!
//! This library decodes European Data Format recordings into physical
//! samples and annotations, designs and runs biquad filter cascades, and
//! resamples signals for display.
//!
//! ## Module Structure
//!
//! - [`parsers`] - EDF/EDF+ header, signal and annotation decoding
//! - [`analysis`] - Filter design, filtering engine, responses and resampling
//! - [`settings`] - Pipeline settings and filter presets

pub mod analysis;
pub mod parsers;
pub mod settings;
