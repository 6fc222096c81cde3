//! Runtime biquad cascade.
//!
//! Coefficients live in an immutable, shareable [`Cascade`]; per-channel delay
//! lines live in [`DelayState`]. A [`FilterEngine`] pairs one cascade with one
//! state for streaming use, and a [`FilterBank`] runs one cascade over many
//! channels, each with its own state.

use std::sync::Arc;

use rayon::prelude::*;

use super::design::{self, Biquad, FilterSpec};
use super::response::{self, ResponsePoint, TransientResponse};
use super::FilterError;

/// Shared, immutable list of sections
pub type Cascade = Arc<[Biquad]>;

/// Delay elements `[z0, z1]` for every section of a cascade
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DelayState {
    z: Vec<[f64; 2]>,
}

impl DelayState {
    pub fn new(stages: usize) -> Self {
        Self {
            z: vec![[0.0; 2]; stages],
        }
    }

    pub fn reset(&mut self) {
        self.z.iter_mut().for_each(|z| *z = [0.0; 2]);
    }

    pub fn is_zero(&self) -> bool {
        self.z.iter().all(|z| *z == [0.0; 2])
    }

    /// Push one sample through every section
    #[inline]
    fn step(&mut self, stages: &[Biquad], x: f64) -> f64 {
        stages
            .iter()
            .zip(self.z.iter_mut())
            .fold(x, |input, (s, z)| {
                let t = s.k * input - s.a[0] * z[0] - s.a[1] * z[1];
                let y = s.b[0] * t + s.b[1] * z[0] + s.b[2] * z[1];
                z[1] = z[0];
                z[0] = t;
                y
            })
    }

    fn run_in_place(&mut self, stages: &[Biquad], data: &mut [f64]) {
        for x in data.iter_mut() {
            *x = self.step(stages, *x);
        }
    }
}

/// A cascade with its own delay state
#[derive(Clone, Debug)]
pub struct FilterEngine {
    cascade: Cascade,
    state: DelayState,
}

impl FilterEngine {
    pub fn new(stages: impl Into<Cascade>) -> Self {
        let cascade = stages.into();
        let state = DelayState::new(cascade.len());
        Self { cascade, state }
    }

    /// Design and wrap a cascade in one step
    pub fn from_spec(spec: &FilterSpec) -> Result<Self, FilterError> {
        Ok(Self::new(design::design(spec)?))
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn state(&self) -> &DelayState {
        &self.state
    }

    pub fn single_step(&mut self, x: f64) -> f64 {
        self.state.step(&self.cascade, x)
    }

    pub fn multi_step(&mut self, input: &[f64]) -> Vec<f64> {
        let mut out = input.to_vec();
        self.multi_step_in_place(&mut out);
        out
    }

    pub fn multi_step_in_place(&mut self, data: &mut [f64]) {
        self.state.run_in_place(&self.cascade, data);
    }

    /// Filter from the last sample to the first; output keeps input order
    pub fn reverse_step(&mut self, input: &[f64]) -> Vec<f64> {
        let mut out = input.to_vec();
        for x in out.iter_mut().rev() {
            *x = self.state.step(&self.cascade, *x);
        }
        out
    }

    /// Zero-phase filtering.
    ///
    /// The forward pass continues from the engine's current state; the
    /// reverse pass always starts from a fresh state.
    pub fn filtfilt(&mut self, input: &[f64]) -> Vec<f64> {
        let mut out = self.multi_step(input);
        let mut reverse = DelayState::new(self.cascade.len());
        for x in out.iter_mut().rev() {
            *x = reverse.step(&self.cascade, *x);
        }
        out
    }

    /// Run the cascade on scratch state, leaving the engine state untouched
    pub fn simulate(&self, input: &[f64]) -> Vec<f64> {
        let mut scratch = DelayState::new(self.cascade.len());
        let mut out = input.to_vec();
        scratch.run_in_place(&self.cascade, &mut out);
        out
    }

    /// Clear all delay elements
    pub fn reinit(&mut self) {
        self.state.reset();
    }

    pub fn response_at(&self, sample_rate: f64, freq: f64) -> ResponsePoint {
        response::response_at(&self.cascade, sample_rate, freq)
    }

    pub fn response(&self, resolution: usize) -> Vec<ResponsePoint> {
        response::response(&self.cascade, resolution)
    }

    /// Response to a unit step of `len` samples, from a fresh state
    pub fn step_response(&self, len: usize) -> TransientResponse {
        TransientResponse::from_output(self.simulate(&vec![1.0; len]))
    }

    /// Response to a unit impulse of `len` samples, from a fresh state
    pub fn impulse_response(&self, len: usize) -> TransientResponse {
        let mut input = vec![0.0; len];
        if let Some(first) = input.first_mut() {
            *first = 1.0;
        }
        TransientResponse::from_output(self.simulate(&input))
    }
}

/// Index of a channel within a [`FilterBank`]
pub type ChannelId = usize;

/// One cascade applied to many independent channels
#[derive(Clone, Debug)]
pub struct FilterBank {
    cascade: Cascade,
    states: Vec<DelayState>,
}

impl FilterBank {
    pub fn new(cascade: impl Into<Cascade>, channels: usize) -> Self {
        let cascade = cascade.into();
        let states = vec![DelayState::new(cascade.len()); channels];
        Self { cascade, states }
    }

    pub fn channel_count(&self) -> usize {
        self.states.len()
    }

    pub fn add_channel(&mut self) -> ChannelId {
        self.states.push(DelayState::new(self.cascade.len()));
        self.states.len() - 1
    }

    fn state_mut(&mut self, channel: ChannelId) -> Result<&mut DelayState, FilterError> {
        let count = self.states.len();
        self.states
            .get_mut(channel)
            .ok_or(FilterError::UnknownChannel { channel, count })
    }

    /// Filter a block of one channel, continuing from its previous state
    pub fn process(&mut self, channel: ChannelId, data: &mut [f64]) -> Result<(), FilterError> {
        let cascade = Arc::clone(&self.cascade);
        self.state_mut(channel)?.run_in_place(&cascade, data);
        Ok(())
    }

    /// Filter one block per channel in parallel; `blocks[i]` belongs to channel `i`
    pub fn process_all(&mut self, blocks: &mut [Vec<f64>]) -> Result<(), FilterError> {
        if blocks.len() != self.states.len() {
            return Err(FilterError::InvalidParameter {
                name: "blocks",
                reason: format!(
                    "expected {} channel blocks, got {}",
                    self.states.len(),
                    blocks.len()
                ),
            });
        }
        let cascade = &self.cascade;
        blocks
            .par_iter_mut()
            .zip(self.states.par_iter_mut())
            .for_each(|(block, state)| state.run_in_place(cascade, block));
        Ok(())
    }

    pub fn reset(&mut self, channel: ChannelId) -> Result<(), FilterError> {
        self.state_mut(channel)?.reset();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        self.states.iter_mut().for_each(DelayState::reset);
    }
}
