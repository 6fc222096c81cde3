//! End-to-end decode, filter and resample pipelines
//!
//! Tests cover:
//! - Preset selection for every channel of the reference recording
//! - Preset filtering followed by display resampling
//! - Filtering all channels through one bank

use crate::common::float_cmp::assert_approx_eq;
use crate::common::synthetic::{reference_recording, REFERENCE_LABELS};
use edfscope::analysis::{design, resample_pair, FilterBank, FilterEngine, FilterSpec};
use edfscope::parsers::RecordingDecoder;
use edfscope::settings::PipelineSettings;

#[test]
fn test_presets_follow_labels() {
    let settings = PipelineSettings::default();
    let names: Vec<Option<&str>> = REFERENCE_LABELS
        .iter()
        .map(|label| settings.preset_for_label(label).map(|p| p.name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            Some("eeg"),
            Some("eeg"),
            Some("eeg"),
            Some("eeg"),
            Some("eog"),
            Some("eog"),
            Some("emg"),
            Some("ecg"),
            None,
            None,
            None,
            None,
        ]
    );
}

#[test]
fn test_eeg_preset_then_resample() {
    let decoder = RecordingDecoder::new(reference_recording());
    let header = decoder.header().unwrap();
    let index = header.find_signal("EEG Fpz-Cz").unwrap();
    let fs = header.signals[index].sampling_frequency(header.record_duration);
    assert_eq!(fs, 200.0);

    let mut samples = decoder.read_signal(index, None).unwrap();
    assert_eq!(samples.len(), 120_000);

    let settings = PipelineSettings::default();
    let preset = settings.preset_for_label(&header.signals[index].label).unwrap();
    preset.apply(fs, &mut samples).unwrap();
    assert_eq!(samples.len(), 120_000);
    assert!(samples.iter().all(|x| x.is_finite()));

    // 1 Hz tone passes, its offset is removed
    let middle = &samples[20_000..100_000];
    let mean = middle.iter().sum::<f64>() / middle.len() as f64;
    let peak = middle.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
    assert!(mean.abs() < 1.0, "mean {}", mean);
    assert!(peak > 290.0 && peak < 310.0, "peak {}", peak);

    let times: Vec<f64> = (0..samples.len()).map(|i| i as f64 / fs).collect();
    let (t, v) = resample_pair(&times, &samples, settings.display_points);
    assert_eq!(t.len(), 2000);
    assert_eq!(v.len(), 2000);
    assert_eq!(t[0], 0.0);
    assert_approx_eq(t[1999], 119_999.0 / fs, 1e-9);
    assert_eq!(v[1999], samples[119_999]);
}

#[test]
fn test_highpass_settles_constant_channel() {
    let fs = 200.0;
    let mut engine = FilterEngine::from_spec(&FilterSpec::highpass(fs, 0.3, 1)).unwrap();
    let out = engine.multi_step(&vec![42.0; 200 * 120]);
    assert!(out.iter().all(|x| x.is_finite()));
    assert!(out.last().unwrap().abs() < 1e-6);
}

#[test]
fn test_bank_filters_every_channel() {
    let decoder = RecordingDecoder::new(reference_recording());
    let indices: Vec<usize> = (0..REFERENCE_LABELS.len()).collect();
    let mut blocks = decoder.read_signals(&indices, Some(0..30)).unwrap();
    let raw = blocks.clone();

    let cascade = design(&FilterSpec::lowpass(200.0, 35.0, 2)).unwrap();
    let mut bank = FilterBank::new(cascade.clone(), indices.len());
    bank.process_all(&mut blocks).unwrap();

    let engine = FilterEngine::new(cascade);
    for (filtered, input) in blocks.iter().zip(&raw) {
        assert_eq!(filtered.len(), 6000);
        assert_eq!(filtered, &engine.simulate(input));
    }

    // Block count must match channel count
    assert!(bank.process_all(&mut blocks[..3]).is_err());
}
