//! Biquad cascade design.
//!
//! A [`FilterSpec`] describes a filter by behavior, characteristic, sample
//! rate and cutoff. [`design`] turns it into second-order sections using one
//! of three discretizations:
//!
//! - bilinear (default): RBJ cookbook sections with per-stage Q and
//!   frequency correction from the characteristic tables
//! - matched-Z: analog prototype poles mapped through `z = e^{sT}`,
//!   lowpass only
//! - Bessel-Thomson: second-order Bessel sections, lowpass and highpass

use std::f64::consts::{LN_2, PI};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::tables::{self, MAX_ORDER};
use super::FilterError;

/// Frequency-domain shape of the filter
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
    Allpass,
    Peak,
    Lowshelf,
    Highshelf,
}

/// Response family; selects per-stage Q and frequency correction
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Characteristic {
    #[default]
    #[strum(to_string = "butterworth")]
    Butterworth,
    #[strum(to_string = "bessel")]
    Bessel,
    /// 0.5 dB passband ripple
    #[strum(to_string = "chebyshev05", serialize = "tschebyscheff05")]
    #[serde(alias = "tschebyscheff05")]
    Chebyshev05,
    #[strum(to_string = "chebyshev1", serialize = "tschebyscheff1")]
    #[serde(alias = "tschebyscheff1")]
    Chebyshev1,
    #[strum(to_string = "chebyshev2", serialize = "tschebyscheff2")]
    #[serde(alias = "tschebyscheff2")]
    Chebyshev2,
    #[strum(to_string = "chebyshev3", serialize = "tschebyscheff3")]
    #[serde(alias = "tschebyscheff3")]
    Chebyshev3,
}

impl Characteristic {
    pub const ALL: [Characteristic; 6] = [
        Characteristic::Butterworth,
        Characteristic::Bessel,
        Characteristic::Chebyshev05,
        Characteristic::Chebyshev1,
        Characteristic::Chebyshev2,
        Characteristic::Chebyshev3,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Characteristic::Butterworth => 0,
            Characteristic::Bessel => 1,
            Characteristic::Chebyshev05 => 2,
            Characteristic::Chebyshev1 => 3,
            Characteristic::Chebyshev2 => 4,
            Characteristic::Chebyshev3 => 5,
        }
    }

    /// Passband ripple in dB for the Chebyshev family
    pub fn ripple_db(self) -> Option<f64> {
        match self {
            Characteristic::Chebyshev05 => Some(0.5),
            Characteristic::Chebyshev1 => Some(1.0),
            Characteristic::Chebyshev2 => Some(2.0),
            Characteristic::Chebyshev3 => Some(3.0),
            Characteristic::Butterworth | Characteristic::Bessel => None,
        }
    }
}

/// Discretization applied to the analog prototype
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Bilinear,
    MatchedZ,
    BesselThomson,
}

/// Parse a behavior name such as `"lowpass"`
pub fn parse_behavior(name: &str) -> Result<Behavior, FilterError> {
    name.parse()
        .map_err(|_| FilterError::UnknownBehavior(name.to_string()))
}

/// Parse a characteristic name such as `"bessel"` or `"tschebyscheff1"`
pub fn parse_characteristic(name: &str) -> Result<Characteristic, FilterError> {
    name.parse()
        .map_err(|_| FilterError::UnknownCharacteristic(name.to_string()))
}

/// Parse a transform name such as `"matched_z"`
pub fn parse_transform(name: &str) -> Result<Transform, FilterError> {
    name.parse()
        .map_err(|_| FilterError::UnknownTransform(name.to_string()))
}

fn default_order() -> usize {
    1
}

/// Complete description of a filter to design
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FilterSpec {
    pub behavior: Behavior,
    /// Required by the bilinear and matched-Z transforms
    #[serde(default)]
    pub characteristic: Option<Characteristic>,
    #[serde(default)]
    pub transform: Transform,
    /// Number of second-order stages, clamped to [`MAX_ORDER`]
    #[serde(default = "default_order")]
    pub order: usize,
    pub sample_rate: f64,
    pub cutoff: f64,
    /// Gain in dB for peak and shelf behaviors
    #[serde(default)]
    pub gain: Option<f64>,
    /// Bandwidth in octaves; replaces Q when set
    #[serde(default)]
    pub bandwidth: Option<f64>,
    /// Normalize the characteristic to its -1 dB point instead of -3 dB
    #[serde(default)]
    pub one_db: bool,
    /// Move the numerator normalization into the stage input gain `k`
    #[serde(default)]
    pub pre_gain: bool,
}

impl FilterSpec {
    pub fn new(behavior: Behavior, sample_rate: f64, cutoff: f64) -> Self {
        Self {
            behavior,
            characteristic: Some(Characteristic::Butterworth),
            transform: Transform::Bilinear,
            order: 1,
            sample_rate,
            cutoff,
            gain: None,
            bandwidth: None,
            one_db: false,
            pre_gain: false,
        }
    }

    pub fn lowpass(sample_rate: f64, cutoff: f64, order: usize) -> Self {
        Self::new(Behavior::Lowpass, sample_rate, cutoff).with_order(order)
    }

    pub fn highpass(sample_rate: f64, cutoff: f64, order: usize) -> Self {
        Self::new(Behavior::Highpass, sample_rate, cutoff).with_order(order)
    }

    pub fn bandpass(sample_rate: f64, center: f64, order: usize) -> Self {
        Self::new(Behavior::Bandpass, sample_rate, center).with_order(order)
    }

    pub fn bandstop(sample_rate: f64, center: f64, order: usize) -> Self {
        Self::new(Behavior::Bandstop, sample_rate, center).with_order(order)
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristic = Some(characteristic);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain = Some(gain_db);
        self
    }

    pub fn with_bandwidth(mut self, octaves: f64) -> Self {
        self.bandwidth = Some(octaves);
        self
    }

    pub fn with_one_db(mut self) -> Self {
        self.one_db = true;
        self
    }

    pub fn with_pre_gain(mut self) -> Self {
        self.pre_gain = true;
        self
    }

    fn validate(&self) -> Result<(), FilterError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            return Err(invalid("cutoff", "must be positive"));
        }
        if self.transform == Transform::Bilinear && self.characteristic.is_none() {
            return Err(FilterError::MissingParameter("characteristic"));
        }
        if self.order == 0 {
            return Err(invalid("order", "must be at least 1"));
        }
        if let Some(bw) = self.bandwidth {
            if !(bw.is_finite() && bw > 0.0) {
                return Err(invalid("bandwidth", "must be positive"));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> FilterError {
    FilterError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// One second-order section in normalized form (`a0 == 1`).
///
/// Evaluated as `t = k·x − a1·z0 − a2·z1`, `y = b0·t + b1·z0 + b2·z1`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 2],
    pub k: f64,
}

impl Biquad {
    /// Section that passes its input through unchanged
    pub const IDENTITY: Biquad = Biquad {
        b: [1.0, 0.0, 0.0],
        a: [0.0, 0.0],
        k: 1.0,
    };

    /// Build from raw coefficients, dividing through by `a0`
    fn normalized(b: [f64; 3], a0: f64, a1: f64, a2: f64, k: f64) -> Self {
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [a1 / a0, a2 / a0],
            k,
        }
    }

    /// Gain at DC, `k·Σb / (1 + Σa)`
    pub fn dc_gain(&self) -> f64 {
        self.k * (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }
}

/// Design the cascade described by `spec`.
///
/// Orders above [`MAX_ORDER`] are clamped with a warning.
pub fn design(spec: &FilterSpec) -> Result<Vec<Biquad>, FilterError> {
    spec.validate()?;

    let order = if spec.order > MAX_ORDER {
        tracing::warn!(
            "Filter order {} exceeds maximum, clamping to {}",
            spec.order,
            MAX_ORDER
        );
        MAX_ORDER
    } else {
        spec.order
    };

    let stages = match spec.transform {
        Transform::Bilinear => bilinear_cascade(spec, order)?,
        Transform::MatchedZ => matched_z_cascade(spec, order)?,
        Transform::BesselThomson => bessel_thomson_cascade(spec, order)?,
    };

    tracing::debug!(
        "Designed {} {} filter: {} stages, cutoff {} Hz at {} Hz",
        spec.transform,
        spec.behavior,
        stages.len(),
        spec.cutoff,
        spec.sample_rate
    );
    Ok(stages)
}

// ============================================================================
// Bilinear (RBJ cookbook)
// ============================================================================

fn bilinear_cascade(spec: &FilterSpec, order: usize) -> Result<Vec<Biquad>, FilterError> {
    let needs_gain = matches!(
        spec.behavior,
        Behavior::Peak | Behavior::Lowshelf | Behavior::Highshelf
    );
    let gain = match (needs_gain, spec.gain) {
        (true, None) => return Err(FilterError::MissingParameter("gain")),
        (_, g) => g.unwrap_or(0.0),
    };

    let rows = match spec.characteristic {
        Some(Characteristic::Butterworth) | None => None,
        Some(c) => Some(
            tables::stages(c, order).ok_or_else(|| invalid("order", "outside table range"))?,
        ),
    };

    Ok((0..order)
        .map(|i| {
            let (q, f) = match rows {
                Some(rows) => (rows[i].q, rows[i].f(spec.one_db)),
                None => (butterworth_q(order, i), 1.0),
            };

            let mut cutoff = match spec.behavior {
                Behavior::Highpass => spec.cutoff / f,
                _ => spec.cutoff * f,
            };
            let band = matches!(spec.behavior, Behavior::Bandpass | Behavior::Bandstop);
            if band && spec.characteristic == Some(Characteristic::Bessel) {
                cutoff *= (order as f64).sqrt() / order as f64;
            }
            rbj_section(
                spec.behavior,
                spec.sample_rate,
                cutoff,
                q,
                spec.bandwidth,
                gain,
                spec.pre_gain,
            )
        })
        .collect())
}

/// Q of stage `i` in an `order`-stage Butterworth cascade
pub fn butterworth_q(order: usize, i: usize) -> f64 {
    0.5 / (PI / (2.0 * order as f64) * (i as f64 + 0.5)).sin()
}

fn rbj_section(
    behavior: Behavior,
    sample_rate: f64,
    cutoff: f64,
    q: f64,
    bandwidth: Option<f64>,
    gain_db: f64,
    pre_gain: bool,
) -> Biquad {
    let w = 2.0 * PI * cutoff / sample_rate;
    let (sw, cw) = w.sin_cos();
    let alpha = match bandwidth {
        Some(bw) => sw * (LN_2 / 2.0 * bw * w / sw).sinh(),
        None => sw / (2.0 * q),
    };

    match behavior {
        Behavior::Lowpass => {
            let g = (1.0 - cw) / 2.0;
            let a0 = 1.0 + alpha;
            split_gain([1.0, 2.0, 1.0], g, a0, -2.0 * cw, 1.0 - alpha, pre_gain)
        }
        Behavior::Highpass => {
            let g = (1.0 + cw) / 2.0;
            let a0 = 1.0 + alpha;
            split_gain([1.0, -2.0, 1.0], g, a0, -2.0 * cw, 1.0 - alpha, pre_gain)
        }
        Behavior::Bandpass => {
            let a0 = 1.0 + alpha;
            split_gain([1.0, 0.0, -1.0], alpha, a0, -2.0 * cw, 1.0 - alpha, pre_gain)
        }
        Behavior::Bandstop => Biquad::normalized(
            [1.0, -2.0 * cw, 1.0],
            1.0 + alpha,
            -2.0 * cw,
            1.0 - alpha,
            1.0,
        ),
        Behavior::Allpass => Biquad::normalized(
            [1.0 - alpha, -2.0 * cw, 1.0 + alpha],
            1.0 + alpha,
            -2.0 * cw,
            1.0 - alpha,
            1.0,
        ),
        Behavior::Peak => {
            let a = 10f64.powf(gain_db / 40.0);
            Biquad::normalized(
                [1.0 + alpha * a, -2.0 * cw, 1.0 - alpha * a],
                1.0 + alpha / a,
                -2.0 * cw,
                1.0 - alpha / a,
                1.0,
            )
        }
        Behavior::Lowshelf => {
            let a = 10f64.powf(gain_db / 40.0);
            let sa = 2.0 * a.sqrt() * alpha;
            Biquad::normalized(
                [
                    a * ((a + 1.0) - (a - 1.0) * cw + sa),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cw),
                    a * ((a + 1.0) - (a - 1.0) * cw - sa),
                ],
                (a + 1.0) + (a - 1.0) * cw + sa,
                -2.0 * ((a - 1.0) + (a + 1.0) * cw),
                (a + 1.0) + (a - 1.0) * cw - sa,
                1.0,
            )
        }
        Behavior::Highshelf => {
            let a = 10f64.powf(gain_db / 40.0);
            let sa = 2.0 * a.sqrt() * alpha;
            Biquad::normalized(
                [
                    a * ((a + 1.0) + (a - 1.0) * cw + sa),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cw),
                    a * ((a + 1.0) + (a - 1.0) * cw - sa),
                ],
                (a + 1.0) - (a - 1.0) * cw + sa,
                2.0 * ((a - 1.0) - (a + 1.0) * cw),
                (a + 1.0) - (a - 1.0) * cw - sa,
                1.0,
            )
        }
    }
}

/// Numerator `g·shape`, with `g` either folded into `b` or carried in `k`
fn split_gain(shape: [f64; 3], g: f64, a0: f64, a1: f64, a2: f64, pre_gain: bool) -> Biquad {
    if pre_gain {
        Biquad::normalized(shape, a0, a1, a2, g)
    } else {
        Biquad::normalized([shape[0] * g, shape[1] * g, shape[2] * g], a0, a1, a2, 1.0)
    }
}

// ============================================================================
// Matched-Z
// ============================================================================

fn matched_z_cascade(spec: &FilterSpec, order: usize) -> Result<Vec<Biquad>, FilterError> {
    if spec.behavior != Behavior::Lowpass {
        return Err(FilterError::UnsupportedBehavior {
            behavior: spec.behavior,
            transform: Transform::MatchedZ,
        });
    }

    let characteristic = spec.characteristic.ok_or(FilterError::MissingParameter("as"))?;
    let rows = tables::stages(characteristic, order)
        .ok_or_else(|| invalid("order", "outside table range"))?;
    let w = 2.0 * PI * spec.cutoff / spec.sample_rate;

    Ok(rows
        .iter()
        .map(|row| {
            let (a_s, b_s) = row.poles(spec.one_db);
            let s = -a_s / (2.0 * b_s);
            let im = (a_s * a_s / (4.0 * b_s * b_s) - 1.0 / b_s).abs().sqrt();
            let a1 = -2.0 * (s * w).exp() * (w * im).cos();
            let a2 = (2.0 * s * w).exp();
            let g = 1.0 + a1 + a2;
            if spec.pre_gain {
                Biquad {
                    b: [1.0, 0.0, 0.0],
                    a: [a1, a2],
                    k: g,
                }
            } else {
                Biquad {
                    b: [g, 0.0, 0.0],
                    a: [a1, a2],
                    k: 1.0,
                }
            }
        })
        .collect())
}

// ============================================================================
// Bessel-Thomson
// ============================================================================

fn bessel_thomson_cascade(spec: &FilterSpec, order: usize) -> Result<Vec<Biquad>, FilterError> {
    let k = (PI * spec.cutoff / spec.sample_rate).tan();
    let k2 = k * k;

    let stage = match spec.behavior {
        Behavior::Lowpass => {
            let a0 = 1.0 + 3.0 * k + 3.0 * k2;
            let g = 3.0 * k2 / a0;
            Biquad {
                b: [g, 2.0 * g, g],
                a: [(6.0 * k2 - 2.0) / a0, (3.0 * k2 - 3.0 * k + 1.0) / a0],
                k: 1.0,
            }
        }
        Behavior::Highpass => {
            let a0 = k2 + 3.0 * k + 3.0;
            let g = 3.0 / a0;
            Biquad {
                b: [g, -2.0 * g, g],
                a: [(2.0 * k2 - 6.0) / a0, (k2 - 3.0 * k + 3.0) / a0],
                k: 1.0,
            }
        }
        behavior => {
            return Err(FilterError::UnsupportedBehavior {
                behavior,
                transform: Transform::BesselThomson,
            })
        }
    };
    Ok(vec![stage; order])
}
