//! Frequency and transient response of a biquad cascade.

use std::f64::consts::PI;

use serde::Serialize;

use super::complex::{Complex, ONE};
use super::design::Biquad;

/// Response of the cascade at one frequency
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ResponsePoint {
    pub magnitude: f64,
    /// Wrapped phase in radians, summed over stages
    pub phase: f64,
    pub db_magnitude: f64,
    /// Phase with 2π jumps removed; equals `phase` for single-point evaluation
    pub unwrapped_phase: f64,
    pub phase_delay: f64,
    pub group_delay: f64,
}

/// Complex gain of one section at `z⁻¹ = e^{-jθ}`
fn section_gain(stage: &Biquad, theta: f64) -> Complex {
    let z1 = Complex::from_polar(1.0, -theta);
    let z2 = z1 * z1;
    let num = Complex::from(stage.b[0]) + z1.scale(stage.b[1]) + z2.scale(stage.b[2]);
    let den = ONE + z1.scale(stage.a[0]) + z2.scale(stage.a[1]);
    (num / den).scale(stage.k)
}

/// Evaluate the cascade at `freq` Hz for a given sample rate.
///
/// Stage magnitudes multiply and stage phases add.
pub fn response_at(stages: &[Biquad], sample_rate: f64, freq: f64) -> ResponsePoint {
    let theta = 2.0 * PI * freq / sample_rate;
    let (magnitude, phase) = stages.iter().fold((1.0, 0.0), |(mag, ph), stage| {
        let h = section_gain(stage, theta);
        (mag * h.norm(), ph + h.arg())
    });
    ResponsePoint {
        magnitude,
        phase,
        db_magnitude: 20.0 * magnitude.log10(),
        unwrapped_phase: phase,
        phase_delay: 0.0,
        group_delay: 0.0,
    }
}

/// Sweep `resolution` points from DC to Nyquist.
///
/// The sweep uses a nominal sample rate of `2 · resolution`, so point `i` is
/// normalized frequency `i / resolution`. Phase is unwrapped and phase and
/// group delay are derived from it.
pub fn response(stages: &[Biquad], resolution: usize) -> Vec<ResponsePoint> {
    let sample_rate = 2.0 * resolution as f64;
    let mut points: Vec<ResponsePoint> = (0..resolution)
        .map(|i| response_at(stages, sample_rate, i as f64))
        .collect();
    unwrap_phase(&mut points);
    derive_delays(&mut points);
    points
}

/// Remove jumps larger than π between consecutive points.
///
/// Several stages can wrap at the same frequency, so a jump is corrected by
/// the nearest multiple of 2π rather than a single turn.
fn unwrap_phase(points: &mut [ResponsePoint]) {
    let mut offset = 0.0;
    for i in 0..points.len() {
        if i > 0 {
            let jump = points[i].phase - points[i - 1].phase;
            if jump.abs() > PI {
                offset -= 2.0 * PI * (jump / (2.0 * PI)).round();
            }
        }
        points[i].unwrapped_phase = points[i].phase + offset;
    }
}

fn derive_delays(points: &mut [ResponsePoint]) {
    let n = points.len() as f64;
    for i in 1..points.len() {
        let phi = points[i].unwrapped_phase.abs();
        let prev = points[i - 1].unwrapped_phase.abs();
        points[i].phase_delay = phi / (i as f64 / n);
        points[i].group_delay = (phi - prev).abs() * n / PI;
    }

    // No usable derivative near DC: point 0 takes point 2, point 1 takes point 3
    match points.len() {
        0 | 1 => {}
        2 => {
            points[0].phase_delay = points[1].phase_delay;
            points[0].group_delay = points[1].group_delay;
        }
        len => {
            let (phase_delay, group_delay) = (points[2].phase_delay, points[2].group_delay);
            let next = if len > 3 { points[3].group_delay } else { group_delay };
            points[0].phase_delay = phase_delay;
            points[0].group_delay = group_delay;
            points[1].phase_delay = phase_delay;
            points[1].group_delay = next;
        }
    }
}

/// Sample index and value of a notable point in a transient response
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub sample: usize,
    pub value: f64,
}

/// Step or impulse response with its first overshoot and undershoot
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransientResponse {
    pub out: Vec<f64>,
    /// First local maximum
    pub peak: Option<Marker>,
    /// First local minimum after `peak`
    pub settle: Option<Marker>,
}

impl TransientResponse {
    pub fn from_output(out: Vec<f64>) -> Self {
        let mut peak = None;
        let mut settle = None;
        for (i, pair) in out.windows(2).enumerate() {
            if peak.is_none() {
                if pair[0] > pair[1] {
                    peak = Some(Marker {
                        sample: i,
                        value: pair[0],
                    });
                }
            } else if pair[0] < pair[1] {
                settle = Some(Marker {
                    sample: i,
                    value: pair[0],
                });
                break;
            }
        }
        Self { out, peak, settle }
    }
}
