//! Tests for decoding recordings from disk
//!
//! Tests cover:
//! - Memory-mapped decoding of a written recording
//! - Header, signal and annotation reads from the map
//! - Format detection on file contents

use std::fs::File;
use std::io::Write;

use chrono::{Datelike, Timelike};
use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::common::synthetic::{reference_recording, reference_sine};
use edfscope::parsers::edf::detect;
use edfscope::parsers::RecordingDecoder;

fn write_reference() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&reference_recording()).unwrap();
    file.flush().unwrap();
    file
}

fn map(file: &NamedTempFile) -> Mmap {
    let handle = File::open(file.path()).unwrap();
    unsafe { Mmap::map(&handle).unwrap() }
}

#[test]
fn test_mapped_recording_header() {
    let file = write_reference();
    let mmap = map(&file);
    assert!(detect(&mmap));

    let decoder = RecordingDecoder::new(mmap);
    let header = decoder.header().unwrap();
    assert_eq!(header.signal_count, 13);
    assert_eq!(header.data_records, 600);
    assert!(header.is_edf_plus());
    assert_eq!(header.annotation_signal(), Some(12));

    let start = header.start_datetime().unwrap();
    assert_eq!((start.year(), start.month(), start.day()), (2024, 3, 15));
    assert_eq!((start.hour(), start.minute()), (22, 30));
}

#[test]
fn test_mapped_signal_and_annotations() {
    let file = write_reference();
    let mmap = map(&file);
    let decoder = RecordingDecoder::new(&mmap[..]);

    let digital = decoder.read_digital_signal(0, Some(10..12)).unwrap();
    assert_eq!(digital.len(), 400);
    assert!(digital
        .iter()
        .enumerate()
        .all(|(i, &d)| d == reference_sine(2000 + i)));

    let events = decoder.read_annotations(None).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].onset, 600.0);
}

#[test]
fn test_detect_rejects_other_files() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"Time,RPM,MAP\n0.0,850,35\n").unwrap();
    file.flush().unwrap();
    let contents = std::fs::read(file.path()).unwrap();
    assert!(!detect(&contents));
}
