//! Per-stage correction tables for the tabulated filter characteristics.
//!
//! Each characteristic is described by its analog lowpass prototype, factored
//! into second-order sections `1 / (1 + a·s + b·s²)`. From the prototype
//! poles every row carries:
//!
//! - `q`: quality factor of the section, `sqrt(b) / a`
//! - `f3db` / `f1db`: section pole frequency relative to the cascade cutoff,
//!   with the cutoff defined as the -3 dB or -1 dB point of the whole cascade
//! - `as`/`bs`: the section coefficients `a`, `b` rescaled to the same
//!   cutoff, consumed by the matched-Z designer
//!
//! Tables are built once per process and indexed by characteristic and stage
//! count (1..=[`MAX_ORDER`]).

use std::f64::consts::PI;
use std::sync::OnceLock;

use super::complex::{polyval, Complex, ONE};
use super::design::Characteristic;

/// Largest supported number of second-order stages
pub const MAX_ORDER: usize = 12;

/// One second-order section of a tabulated characteristic
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageRow {
    pub q: f64,
    pub f3db: f64,
    pub f1db: f64,
    pub as3db: f64,
    pub bs3db: f64,
    pub as1db: f64,
    pub bs1db: f64,
}

impl StageRow {
    /// Frequency correction factor for the selected cutoff definition
    pub fn f(&self, one_db: bool) -> f64 {
        if one_db {
            self.f1db
        } else {
            self.f3db
        }
    }

    /// Matched-Z section coefficients `(as, bs)` for the selected cutoff definition
    pub fn poles(&self, one_db: bool) -> (f64, f64) {
        if one_db {
            (self.as1db, self.bs1db)
        } else {
            (self.as3db, self.bs3db)
        }
    }
}

type CharacteristicTable = Vec<Vec<StageRow>>;

static TABLES: OnceLock<Vec<CharacteristicTable>> = OnceLock::new();

/// Rows for `order` stages of `characteristic`, or `None` outside 1..=MAX_ORDER
pub fn stages(characteristic: Characteristic, order: usize) -> Option<&'static [StageRow]> {
    if order == 0 || order > MAX_ORDER {
        return None;
    }
    let tables = TABLES.get_or_init(|| {
        tracing::debug!("Building filter characteristic tables");
        Characteristic::ALL
            .iter()
            .map(|&c| (1..=MAX_ORDER).map(|order| build_rows(c, order)).collect())
            .collect()
    });
    tables
        .get(characteristic.index())
        .and_then(|t| t.get(order - 1))
        .map(|rows| rows.as_slice())
}

/// Analog prototype sections `(a, b)` for `order` stages, before normalization
fn prototype_sections(characteristic: Characteristic, order: usize) -> Vec<(f64, f64)> {
    let poles = match characteristic.ripple_db() {
        Some(ripple) => chebyshev_poles(order, ripple),
        None if characteristic == Characteristic::Bessel => bessel_poles(order),
        None => butterworth_poles(order),
    };
    poles
        .into_iter()
        .map(|p| {
            let m = p.norm_sqr();
            (-2.0 * p.re / m, 1.0 / m)
        })
        .collect()
}

fn build_rows(characteristic: Characteristic, order: usize) -> Vec<StageRow> {
    let sections = prototype_sections(characteristic, order);
    let w3 = attenuation_point(&sections, 3.0);
    let w1 = attenuation_point(&sections, 1.0);

    let mut rows: Vec<StageRow> = sections
        .iter()
        .map(|&(a, b)| StageRow {
            q: b.sqrt() / a,
            f3db: 1.0 / (w3 * b.sqrt()),
            f1db: 1.0 / (w1 * b.sqrt()),
            as3db: a * w3,
            bs3db: b * w3 * w3,
            as1db: a * w1,
            bs1db: b * w1 * w1,
        })
        .collect();
    // Highest Q first, the same order the Butterworth closed form produces
    rows.sort_by(|x, y| y.q.total_cmp(&x.q));
    rows
}

/// Attenuation in dB of the cascade at angular frequency `w`, relative to DC
fn attenuation_db(sections: &[(f64, f64)], w: f64) -> f64 {
    sections
        .iter()
        .map(|&(a, b)| {
            let re = 1.0 - b * w * w;
            let im = a * w;
            10.0 * (re * re + im * im).log10()
        })
        .sum()
}

/// Lowest frequency above the passband where attenuation reaches `db`
fn attenuation_point(sections: &[(f64, f64)], db: f64) -> f64 {
    const STEP: f64 = 0.01;
    const LIMIT: f64 = 1.0e3;

    let mut lo = 0.0;
    while lo < LIMIT && attenuation_db(sections, lo + STEP) < db {
        lo += STEP;
    }
    let mut hi = lo + STEP;
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if attenuation_db(sections, mid) < db {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Upper-half-plane poles of a Butterworth prototype with `2 * order` poles
fn butterworth_poles(order: usize) -> Vec<Complex> {
    let n = 2 * order;
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * n) as f64;
            Complex::new(-theta.sin(), theta.cos())
        })
        .collect()
}

/// Upper-half-plane poles of a Chebyshev type I prototype, ripple edge at 1 rad/s
fn chebyshev_poles(order: usize, ripple_db: f64) -> Vec<Complex> {
    let n = 2 * order;
    let epsilon = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
    let mu = (1.0 / epsilon).asinh() / n as f64;
    (0..order)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * n) as f64;
            Complex::new(-mu.sinh() * theta.sin(), mu.cosh() * theta.cos())
        })
        .collect()
}

/// Upper-half-plane poles of a Bessel prototype (unit group delay at DC)
fn bessel_poles(order: usize) -> Vec<Complex> {
    let n = 2 * order;

    // Reverse Bessel polynomial, coefficients of s^k for k = 0..=n
    let mut coeffs = vec![0.0; n + 1];
    coeffs[n] = 1.0;
    for k in (0..n).rev() {
        coeffs[k] = coeffs[k + 1] * ((2 * n - k) * (k + 1)) as f64 / (2 * (n - k)) as f64;
    }

    // Substitute s = r·x so the roots sit near the unit circle
    let r = coeffs[0].powf(1.0 / n as f64);
    let scaled: Vec<f64> = (0..=n)
        .rev()
        .map(|k| coeffs[k] * r.powi(k as i32 - n as i32))
        .collect();

    durand_kerner(&scaled)
        .into_iter()
        .filter(|root| root.im > 0.0)
        .map(|root| root.scale(r))
        .collect()
}

/// All roots of a monic real polynomial given highest power first
fn durand_kerner(coeffs: &[f64]) -> Vec<Complex> {
    let degree = coeffs.len() - 1;
    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex> = (0..degree)
        .scan(ONE, |acc, _| {
            let current = *acc;
            *acc = *acc * seed;
            Some(current)
        })
        .collect();

    for _ in 0..2000 {
        let mut largest_step: f64 = 0.0;
        for i in 0..degree {
            let denom = (0..degree)
                .filter(|&j| j != i)
                .fold(ONE, |acc, j| acc * (roots[i] - roots[j]));
            let step = polyval(coeffs, roots[i]) / denom;
            roots[i] = roots[i] - step;
            largest_step = largest_step.max(step.norm());
        }
        if largest_step < 1e-14 {
            break;
        }
    }
    roots
}
