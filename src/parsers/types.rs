use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;

/// Label marker identifying the EDF+ annotation signal
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Reserved-field prefix of continuous EDF+ recordings
pub const EDF_PLUS_CONTINUOUS: &str = "EDF+C";

/// Reserved-field prefix of discontinuous EDF+ recordings (not supported)
pub const EDF_PLUS_DISCONTINUOUS: &str = "EDF+D";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while decoding a recording
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The reserved field marks a discontinuous (EDF+D) recording
    #[error("Discontinuous EDF+ recordings are not supported")]
    Discontinuous,

    /// A header field could not be parsed
    #[error("Invalid header field '{field}' at offset {offset}: {value:?}")]
    Field {
        field: &'static str,
        offset: usize,
        value: String,
    },

    /// The buffer ends before a required read
    #[error("Truncated data at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The declared signal count cannot describe a valid header
    #[error("Invalid signal count: {0}")]
    InvalidSignalCount(i64),

    /// Signal index past the end of the signal table
    #[error("Signal index {index} out of range ({count} signals)")]
    SignalOutOfRange { index: usize, count: usize },

    /// Requested records outside the recording
    #[error("Record range {start}..{end} out of range ({count} records)")]
    RecordOutOfRange {
        start: usize,
        end: usize,
        count: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

// ============================================================================
// Header
// ============================================================================

/// Per-signal metadata from the signal header block
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SignalDescriptor {
    pub label: String,
    pub transducer_type: String,
    /// Physical unit label, e.g. "uV"
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefiltering: String,
    pub samples_per_record: usize,
    pub reserved: String,
}

impl SignalDescriptor {
    /// Slope of the digital-to-physical map, zero when the digital range is empty
    pub fn gain(&self) -> f64 {
        let digital_span = (self.digital_max - self.digital_min) as f64;
        if digital_span == 0.0 {
            0.0
        } else {
            (self.physical_max - self.physical_min) / digital_span
        }
    }

    /// Intercept of the digital-to-physical map
    pub fn offset(&self) -> f64 {
        if self.digital_max == self.digital_min {
            0.0
        } else {
            self.physical_min - self.digital_min as f64 * self.gain()
        }
    }

    /// Convert one stored sample into physical units.
    ///
    /// A degenerate digital range (`digital_max == digital_min`) maps every
    /// sample to `0.0`.
    #[inline]
    pub fn digital_to_physical(&self, digital: i16) -> f64 {
        if self.digital_max == self.digital_min {
            return 0.0;
        }
        self.physical_min
            + (digital as f64 - self.digital_min as f64) * (self.physical_max - self.physical_min)
                / (self.digital_max - self.digital_min) as f64
    }

    /// Samples per second given the record duration of the recording
    pub fn sampling_frequency(&self, record_duration: f64) -> f64 {
        if record_duration > 0.0 {
            self.samples_per_record as f64 / record_duration
        } else {
            0.0
        }
    }

    /// Whether this signal carries EDF+ annotations rather than samples
    pub fn is_annotation(&self) -> bool {
        self.label.contains(ANNOTATION_LABEL)
    }
}

/// Decoded EDF/EDF+ header
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Header {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    /// Raw "dd.mm.yy" start date
    pub start_date: String,
    /// Raw "hh.mm.ss" start time
    pub start_time: String,
    pub header_bytes: usize,
    pub reserved: String,
    /// Declared number of data records (-1 when unknown)
    pub data_records: i64,
    /// Duration of one data record in seconds
    pub record_duration: f64,
    pub signal_count: usize,
    pub signals: Vec<SignalDescriptor>,
}

impl Header {
    /// Whether the reserved field marks the file as EDF+
    pub fn is_edf_plus(&self) -> bool {
        self.reserved.starts_with("EDF+")
    }

    /// Whether the reserved field marks a discontinuous recording
    pub fn is_discontinuous(&self) -> bool {
        self.reserved.starts_with(EDF_PLUS_DISCONTINUOUS)
    }

    /// Recording length in seconds
    pub fn total_duration(&self) -> f64 {
        self.data_records.max(0) as f64 * self.record_duration
    }

    /// Index of the first annotation signal, if any
    pub fn annotation_signal(&self) -> Option<usize> {
        self.signals.iter().position(|s| s.is_annotation())
    }

    /// Find a signal by label (case-insensitive, surrounding whitespace ignored)
    pub fn find_signal(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        self.signals
            .iter()
            .position(|s| s.label.trim().eq_ignore_ascii_case(label))
    }

    /// Start of the recording as a local date-time.
    ///
    /// Two-digit years use the EDF clipping rule: 85-99 are 1985-1999, the
    /// rest are 2000-2084.
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        let mut date = self.start_date.split('.').map(|p| p.trim().parse::<u32>());
        let (day, month, year) = (date.next()?.ok()?, date.next()?.ok()?, date.next()?.ok()?);
        let year = if year >= 85 { 1900 + year } else { 2000 + year };

        let mut time = self.start_time.split('.').map(|p| p.trim().parse::<u32>());
        let (hour, minute, second) = (time.next()?.ok()?, time.next()?.ok()?, time.next()?.ok()?);

        let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        Some(NaiveDateTime::new(date, time))
    }
}

/// One EDF+ annotation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationEvent {
    /// Seconds after the recording start
    pub onset: f64,
    /// Seconds, when the TAL carries a duration
    pub duration: Option<f64>,
    pub text: String,
}
