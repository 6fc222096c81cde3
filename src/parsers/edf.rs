//! EDF / EDF+ recording decoder
//!
//! Layout of a recording with N signals:
//! - Bytes 0..256: global header (fixed-width ASCII fields)
//! - Bytes 256..256+256*N: signal headers, stored column-major. All N labels
//!   come first, then all N transducer types, and so on, so field X of
//!   signal i lives at `256 + start(X)*N + width(X)*i`.
//! - From `header_bytes`: data records, each the concatenation over signals of
//!   `samples_per_record` little-endian i16 samples.
//!
//! The decoder never copies or mutates the buffer. Signals and annotations are
//! decoded on demand by record range.

use rayon::prelude::*;
use std::ops::Range;
use std::sync::OnceLock;

use super::annotations;
use super::cursor::BinaryCursor;
use super::types::{
    AnnotationEvent, DecodeError, Header, Result, SignalDescriptor, EDF_PLUS_DISCONTINUOUS,
};

/// Size of the global header block
pub const GLOBAL_HEADER_SIZE: usize = 256;

/// Size of the header block contributed by each signal
pub const SIGNAL_HEADER_SIZE: usize = 256;

/// Fields of the per-signal header block, in storage order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalField {
    Label,
    TransducerType,
    PhysicalDimension,
    PhysicalMin,
    PhysicalMax,
    DigitalMin,
    DigitalMax,
    Prefiltering,
    SamplesPerRecord,
    Reserved,
}

impl SignalField {
    pub const ALL: [SignalField; 10] = [
        SignalField::Label,
        SignalField::TransducerType,
        SignalField::PhysicalDimension,
        SignalField::PhysicalMin,
        SignalField::PhysicalMax,
        SignalField::DigitalMin,
        SignalField::DigitalMax,
        SignalField::Prefiltering,
        SignalField::SamplesPerRecord,
        SignalField::Reserved,
    ];

    /// Width in bytes of this field for one signal
    pub fn width(self) -> usize {
        match self {
            SignalField::Label => 16,
            SignalField::TransducerType => 80,
            SignalField::PhysicalDimension => 8,
            SignalField::PhysicalMin => 8,
            SignalField::PhysicalMax => 8,
            SignalField::DigitalMin => 8,
            SignalField::DigitalMax => 8,
            SignalField::Prefiltering => 80,
            SignalField::SamplesPerRecord => 8,
            SignalField::Reserved => 32,
        }
    }

    /// Sum of the widths of all fields stored before this one
    pub fn start(self) -> usize {
        Self::ALL
            .iter()
            .take_while(|&&f| f != self)
            .map(|f| f.width())
            .sum()
    }

    fn name(self) -> &'static str {
        match self {
            SignalField::Label => "label",
            SignalField::TransducerType => "transducer_type",
            SignalField::PhysicalDimension => "physical_dimension",
            SignalField::PhysicalMin => "physical_min",
            SignalField::PhysicalMax => "physical_max",
            SignalField::DigitalMin => "digital_min",
            SignalField::DigitalMax => "digital_max",
            SignalField::Prefiltering => "prefiltering",
            SignalField::SamplesPerRecord => "samples_per_record",
            SignalField::Reserved => "signal_reserved",
        }
    }
}

/// Byte offset of `field` for signal `index` in a file with `signal_count` signals
pub fn signal_field_offset(field: SignalField, signal_count: usize, index: usize) -> usize {
    GLOBAL_HEADER_SIZE + field.start() * signal_count + field.width() * index
}

/// Check whether `data` starts like an EDF/EDF+ file.
///
/// The version field is "0" padded with spaces and the declared header length
/// must match the declared signal count.
pub fn detect(data: &[u8]) -> bool {
    if data.len() < GLOBAL_HEADER_SIZE || &data[0..8] != b"0       " {
        return false;
    }
    let cursor = BinaryCursor::new(data);
    let header_bytes = cursor.read_number::<usize>(184, 8, "header_bytes");
    let signal_count = cursor.read_number::<usize>(252, 4, "signal_count");
    match (header_bytes, signal_count) {
        (Ok(bytes), Ok(count)) => bytes == GLOBAL_HEADER_SIZE + SIGNAL_HEADER_SIZE * count,
        _ => false,
    }
}

/// Decoder over an in-memory recording.
///
/// `B` is any owner of the bytes: a `Vec<u8>`, an `Arc<[u8]>`, a borrowed
/// slice or a `memmap2::Mmap`.
pub struct RecordingDecoder<B> {
    data: B,
    header: OnceLock<Header>,
}

impl<B: AsRef<[u8]>> RecordingDecoder<B> {
    pub fn new(data: B) -> Self {
        Self {
            data,
            header: OnceLock::new(),
        }
    }

    fn cursor(&self) -> BinaryCursor<'_> {
        BinaryCursor::new(self.data.as_ref())
    }

    /// Decode the header and return an owned copy.
    ///
    /// The first successful decode is cached; later calls clone the cache.
    pub fn read_header(&self) -> Result<Header> {
        self.header().cloned()
    }

    /// Borrow the cached header, decoding it on first use
    pub fn header(&self) -> Result<&Header> {
        if let Some(header) = self.header.get() {
            return Ok(header);
        }
        let header = parse_header(self.cursor())?;
        tracing::info!(
            "Decoded EDF header: {} signals, {} records of {}s",
            header.signal_count,
            header.data_records,
            header.record_duration
        );
        // A concurrent caller may have won the race; both decoded the same bytes
        Ok(self.header.get_or_init(|| header))
    }

    /// Number of complete data records available.
    ///
    /// A negative declared count (-1 while a recorder is still writing) is
    /// replaced by the number of whole records that fit in the buffer.
    pub fn record_count(&self) -> Result<usize> {
        let header = self.header()?;
        if header.data_records >= 0 {
            return Ok(header.data_records as usize);
        }
        let record_size = record_size(header);
        let available = self.data.as_ref().len().saturating_sub(header.header_bytes);
        let count = if record_size == 0 {
            0
        } else {
            available / record_size
        };
        tracing::warn!(
            "Header declares {} data records, using {} from file size",
            header.data_records,
            count
        );
        Ok(count)
    }

    /// Decode one signal in physical units over `records` (all records when `None`)
    pub fn read_signal(&self, index: usize, records: Option<Range<usize>>) -> Result<Vec<f64>> {
        let header = self.header()?;
        let signal = signal_at(header, index)?;
        let mut out = Vec::new();
        self.for_each_record(index, records, |bytes| {
            out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|c| signal.digital_to_physical(i16::from_le_bytes([c[0], c[1]]))),
            );
        })?;
        Ok(out)
    }

    /// Decode one signal as stored digital values, without calibration
    pub fn read_digital_signal(
        &self,
        index: usize,
        records: Option<Range<usize>>,
    ) -> Result<Vec<i16>> {
        let mut out = Vec::new();
        self.for_each_record(index, records, |bytes| {
            out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]])),
            );
        })?;
        Ok(out)
    }

    /// Decode several signals in parallel over the same record range
    pub fn read_signals(
        &self,
        indices: &[usize],
        records: Option<Range<usize>>,
    ) -> Result<Vec<Vec<f64>>>
    where
        B: Sync,
    {
        // Decode the header once up front so workers only borrow the cache
        self.header()?;
        indices
            .par_iter()
            .map(|&index| self.read_signal(index, records.clone()))
            .collect()
    }

    /// Decode the EDF+ annotations stored in `records`.
    ///
    /// Recordings without an annotation signal return an empty list.
    pub fn read_annotations(&self, records: Option<Range<usize>>) -> Result<Vec<AnnotationEvent>> {
        let header = self.header()?;
        let Some(index) = header.annotation_signal() else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        self.for_each_record(index, records, |bytes| {
            events.extend(annotations::parse_record(bytes));
        })?;
        tracing::debug!("Decoded {} annotation events", events.len());
        Ok(events)
    }

    /// Call `visit` with the raw bytes of signal `index` in each requested record
    fn for_each_record<F>(&self, index: usize, records: Option<Range<usize>>, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8]),
    {
        let header = self.header()?;
        let signal = signal_at(header, index)?;
        let count = self.record_count()?;
        let range = records.unwrap_or(0..count);
        if range.start > range.end || range.end > count {
            return Err(DecodeError::RecordOutOfRange {
                start: range.start,
                end: range.end,
                count,
            });
        }

        let stride = record_size(header);
        let signal_offset: usize = header.signals[..index]
            .iter()
            .map(|s| s.samples_per_record * 2)
            .sum();
        let width = signal.samples_per_record * 2;

        let cursor = self.cursor();
        let data_len = self.data.as_ref().len();
        for record in range {
            // Header-declared sizes can place a record past the address space
            let start = record
                .checked_mul(stride)
                .and_then(|offset| offset.checked_add(header.header_bytes))
                .and_then(|offset| offset.checked_add(signal_offset))
                .ok_or(DecodeError::Truncated {
                    offset: header.header_bytes,
                    needed: usize::MAX,
                    available: data_len.saturating_sub(header.header_bytes),
                })?;
            visit(cursor.slice(start, width)?);
        }
        Ok(())
    }
}

fn signal_at(header: &Header, index: usize) -> Result<&SignalDescriptor> {
    header.signals.get(index).ok_or(DecodeError::SignalOutOfRange {
        index,
        count: header.signals.len(),
    })
}

/// Bytes in one data record
fn record_size(header: &Header) -> usize {
    header.signals.iter().map(|s| s.samples_per_record * 2).sum()
}

fn parse_header(cursor: BinaryCursor<'_>) -> Result<Header> {
    let reserved = cursor.read_ascii(192, 44)?;
    if reserved.starts_with(EDF_PLUS_DISCONTINUOUS) {
        return Err(DecodeError::Discontinuous);
    }

    let signal_count: i64 = cursor.read_number(252, 4, "signal_count")?;
    if signal_count < 0 {
        return Err(DecodeError::InvalidSignalCount(signal_count));
    }
    let signal_count = signal_count as usize;

    let mut header = Header {
        version: cursor.read_ascii(0, 8)?,
        patient_id: cursor.read_ascii(8, 80)?,
        recording_id: cursor.read_ascii(88, 80)?,
        start_date: cursor.read_ascii(168, 8)?,
        start_time: cursor.read_ascii(176, 8)?,
        header_bytes: cursor.read_number(184, 8, "header_bytes")?,
        reserved,
        data_records: cursor.read_number(236, 8, "data_records")?,
        record_duration: cursor.read_number(244, 8, "record_duration")?,
        signal_count,
        signals: Vec::with_capacity(signal_count),
    };

    // Fail before allocating per-signal state when the block cannot be there
    cursor.slice(GLOBAL_HEADER_SIZE, SIGNAL_HEADER_SIZE * signal_count)?;

    for i in 0..signal_count {
        let text = |field: SignalField| {
            cursor.read_ascii(signal_field_offset(field, signal_count, i), field.width())
        };
        let number = |field: SignalField| {
            cursor.read_number::<f64>(
                signal_field_offset(field, signal_count, i),
                field.width(),
                field.name(),
            )
        };
        let integer = |field: SignalField| {
            cursor.read_number::<i32>(
                signal_field_offset(field, signal_count, i),
                field.width(),
                field.name(),
            )
        };

        header.signals.push(SignalDescriptor {
            label: text(SignalField::Label)?,
            transducer_type: text(SignalField::TransducerType)?,
            physical_dimension: text(SignalField::PhysicalDimension)?,
            physical_min: number(SignalField::PhysicalMin)?,
            physical_max: number(SignalField::PhysicalMax)?,
            digital_min: integer(SignalField::DigitalMin)?,
            digital_max: integer(SignalField::DigitalMax)?,
            prefiltering: text(SignalField::Prefiltering)?,
            samples_per_record: cursor.read_number(
                signal_field_offset(SignalField::SamplesPerRecord, signal_count, i),
                SignalField::SamplesPerRecord.width(),
                SignalField::SamplesPerRecord.name(),
            )?,
            reserved: text(SignalField::Reserved)?,
        });
    }

    Ok(header)
}
