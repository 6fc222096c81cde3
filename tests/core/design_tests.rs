//! Tests for biquad cascade design
//!
//! Tests cover:
//! - Cutoff placement for each characteristic
//! - RBJ behaviors (band, allpass, peak, shelves)
//! - Matched-Z and Bessel-Thomson transforms
//! - Stage order independence

use crate::common::float_cmp::{assert_approx_eq, DEFAULT_TOLERANCE};
use edfscope::analysis::response::response_at;
use edfscope::analysis::tables;
use edfscope::analysis::{design, Behavior, Biquad, Characteristic, FilterSpec, Transform};

const FS: f64 = 1000.0;

fn db_at(stages: &[Biquad], freq: f64) -> f64 {
    response_at(stages, FS, freq).db_magnitude
}

// ============================================
// Characteristic Tests
// ============================================

#[test]
fn test_butterworth_lowpass_shape() {
    let stages = design(&FilterSpec::lowpass(FS, 40.0, 3)).unwrap();
    assert_eq!(stages.len(), 3);
    assert_approx_eq(db_at(&stages, 0.0), 0.0, 1e-9);
    assert_approx_eq(db_at(&stages, 40.0), -3.0103, 0.01);
    assert!(db_at(&stages, 400.0) < -60.0);
}

#[test]
fn test_butterworth_highpass_shape() {
    let stages = design(&FilterSpec::highpass(FS, 40.0, 2)).unwrap();
    assert!(response_at(&stages, FS, 0.0).magnitude < 1e-9);
    assert_approx_eq(db_at(&stages, 40.0), -3.0103, 0.01);
    assert_approx_eq(db_at(&stages, 499.0), 0.0, 0.01);
}

#[test]
fn test_tabulated_characteristics_meet_cutoff() {
    for characteristic in [
        Characteristic::Bessel,
        Characteristic::Chebyshev05,
        Characteristic::Chebyshev1,
        Characteristic::Chebyshev2,
        Characteristic::Chebyshev3,
    ] {
        let spec = FilterSpec::lowpass(FS, 10.0, 3).with_characteristic(characteristic);
        let stages = design(&spec).unwrap();
        assert_approx_eq(db_at(&stages, 0.0), 0.0, 1e-9);
        let at_cutoff = db_at(&stages, 10.0);
        assert!(
            (at_cutoff + 3.0).abs() < 0.1,
            "{} at cutoff: {} dB",
            characteristic,
            at_cutoff
        );
    }
}

#[test]
fn test_one_db_normalization() {
    let spec = FilterSpec::lowpass(FS, 10.0, 2)
        .with_characteristic(Characteristic::Bessel)
        .with_one_db();
    let stages = design(&spec).unwrap();
    assert!((db_at(&stages, 10.0) + 1.0).abs() < 0.1);
}

#[test]
fn test_chebyshev_passband_ripple() {
    let spec = FilterSpec::lowpass(FS, 10.0, 2).with_characteristic(Characteristic::Chebyshev1);
    let stages = design(&spec).unwrap();
    let peak = (0..100)
        .map(|i| db_at(&stages, i as f64 * 0.1))
        .fold(f64::MIN, f64::max);
    assert!(peak > 0.8 && peak < 1.2, "ripple peak {} dB", peak);
}

#[test]
fn test_bessel_band_scaling_lowers_stage_frequency() {
    let order = 4;
    let spec = FilterSpec::bandpass(FS, 50.0, order).with_characteristic(Characteristic::Bessel);
    let stages = design(&spec).unwrap();
    assert_eq!(stages.len(), order);
    let rows = tables::stages(Characteristic::Bessel, order).unwrap();

    // Each stage is an RBJ bandpass centred on 50·f·sqrt(N)/N
    for (stage, row) in stages.iter().zip(rows) {
        let center = 50.0 * row.f3db * (order as f64).sqrt() / order as f64;
        let w = 2.0 * std::f64::consts::PI * center / FS;
        assert_approx_eq(stage.a[0], -2.0 * w.cos() / (1.0 + w.sin() / (2.0 * row.q)), 1e-12);
    }
}

#[test]
fn test_stage_order_does_not_change_magnitude() {
    let spec = FilterSpec::lowpass(FS, 30.0, 4).with_characteristic(Characteristic::Chebyshev2);
    let stages = design(&spec).unwrap();
    let mut reversed = stages.clone();
    reversed.reverse();
    for f in [0.0, 5.0, 30.0, 90.0, 250.0] {
        let a = response_at(&stages, FS, f).magnitude;
        let b = response_at(&reversed, FS, f).magnitude;
        assert_approx_eq(a, b, 1e-12);
    }
}

#[test]
fn test_corrected_stage_past_nyquist_still_designs() {
    let fs = 200.0;
    let specs = [
        FilterSpec::lowpass(fs, 70.0, 2).with_characteristic(Characteristic::Bessel),
        FilterSpec::highpass(fs, 60.0, 2).with_characteristic(Characteristic::Chebyshev3),
    ];
    for spec in &specs {
        let stages = design(spec).unwrap();
        assert_eq!(stages.len(), 2);
        for stage in &stages {
            assert!(stage.b.iter().chain(&stage.a).all(|c| c.is_finite()));
            assert!(stage.k.is_finite());
        }
    }

    // The Bessel correction moves at least one stage above Nyquist
    let rows = tables::stages(Characteristic::Bessel, 2).unwrap();
    assert!(rows.iter().any(|row| 70.0 * row.f3db >= fs / 2.0));
}

// ============================================
// RBJ Behavior Tests
// ============================================

#[test]
fn test_bandpass_and_bandstop_centre() {
    let bp = design(&FilterSpec::bandpass(FS, 60.0, 1)).unwrap();
    assert_approx_eq(db_at(&bp, 60.0), 0.0, 1e-6);
    assert!(db_at(&bp, 5.0) < -10.0);

    let bs = design(&FilterSpec::bandstop(FS, 50.0, 1)).unwrap();
    assert!(response_at(&bs, FS, 50.0).magnitude < 1e-9);
    assert_approx_eq(db_at(&bs, 0.0), 0.0, 1e-9);
}

#[test]
fn test_bandwidth_replaces_q() {
    let narrow = design(&FilterSpec::bandpass(FS, 100.0, 1).with_bandwidth(0.2)).unwrap();
    let wide = design(&FilterSpec::bandpass(FS, 100.0, 1).with_bandwidth(2.0)).unwrap();
    assert_approx_eq(db_at(&narrow, 100.0), 0.0, 1e-6);
    assert!(db_at(&narrow, 70.0) < db_at(&wide, 70.0));
}

#[test]
fn test_allpass_is_flat() {
    let stages = design(&FilterSpec::new(Behavior::Allpass, FS, 100.0).with_order(2)).unwrap();
    for f in [0.0, 50.0, 100.0, 300.0, 499.0] {
        assert_approx_eq(response_at(&stages, FS, f).magnitude, 1.0, 1e-9);
    }
}

#[test]
fn test_peak_gain_at_centre() {
    let spec = FilterSpec::new(Behavior::Peak, FS, 100.0).with_gain(6.0);
    let stages = design(&spec).unwrap();
    assert_approx_eq(db_at(&stages, 100.0), 6.0, 1e-6);
    assert_approx_eq(db_at(&stages, 0.0), 0.0, 1e-9);
}

#[test]
fn test_shelves() {
    let low = design(&FilterSpec::new(Behavior::Lowshelf, FS, 100.0).with_gain(-12.0)).unwrap();
    assert_approx_eq(db_at(&low, 0.0), -12.0, 1e-6);
    assert_approx_eq(db_at(&low, 500.0), 0.0, 1e-6);

    let high = design(&FilterSpec::new(Behavior::Highshelf, FS, 100.0).with_gain(9.0)).unwrap();
    assert_approx_eq(db_at(&high, 0.0), 0.0, 1e-6);
    assert_approx_eq(db_at(&high, 500.0), 9.0, 1e-6);
}

// ============================================
// Transform Tests
// ============================================

#[test]
fn test_matched_z_lowpass() {
    let spec = FilterSpec::lowpass(FS, 10.0, 2)
        .with_characteristic(Characteristic::Butterworth)
        .with_transform(Transform::MatchedZ);
    let stages = design(&spec).unwrap();
    assert_eq!(stages.len(), 2);
    assert_approx_eq(db_at(&stages, 0.0), 0.0, 1e-9);
    assert!((db_at(&stages, 10.0) + 3.0).abs() < 0.5);
    assert!(db_at(&stages, 100.0) < -40.0);
}

#[test]
fn test_matched_z_pre_gain() {
    let spec = FilterSpec::lowpass(FS, 10.0, 1).with_transform(Transform::MatchedZ);
    let plain = design(&spec).unwrap()[0];
    let split = design(&spec.clone().with_pre_gain()).unwrap()[0];
    assert_eq!(split.b, [1.0, 0.0, 0.0]);
    assert_approx_eq(split.k, plain.b[0], DEFAULT_TOLERANCE);
}

#[test]
fn test_bessel_thomson_lowpass_is_monotonic() {
    let spec = FilterSpec::lowpass(FS, 50.0, 2).with_transform(Transform::BesselThomson);
    let stages = design(&spec).unwrap();
    let mags: Vec<f64> = (0..50)
        .map(|i| response_at(&stages, FS, i as f64 * 10.0).magnitude)
        .collect();
    assert_approx_eq(mags[0], 1.0, 1e-12);
    for pair in mags.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12);
    }
}

#[test]
fn test_bessel_thomson_highpass_blocks_dc() {
    let spec = FilterSpec::highpass(FS, 50.0, 1).with_transform(Transform::BesselThomson);
    let stages = design(&spec).unwrap();
    assert!(response_at(&stages, FS, 0.0).magnitude < 1e-12);
    assert_approx_eq(response_at(&stages, FS, 500.0).magnitude, 1.0, 1e-9);
}
