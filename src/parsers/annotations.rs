//! EDF+ time-stamped annotation lists (TALs).
//!
//! An annotation record holds one or more TALs, each terminated by a NUL:
//!
//! ```text
//! +Onset[\x15Duration]\x14[Text\x14]*\0
//! ```
//!
//! The first TAL of every record is the record time-keeping entry with an
//! empty text; it yields no event. Malformed TALs are dropped.

use super::types::AnnotationEvent;

/// Separates the onset/duration block and the texts of a TAL
pub const TAL_SEPARATOR: u8 = 0x14;

/// Separates onset from duration inside the first TAL field
pub const DURATION_SEPARATOR: u8 = 0x15;

/// Decode every TAL in one annotation record
pub fn parse_record(bytes: &[u8]) -> Vec<AnnotationEvent> {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut events = Vec::new();
    for tal in bytes[..end].split(|&b| b == 0) {
        if tal.is_empty() {
            continue;
        }
        match parse_tal(tal) {
            Some(mut parsed) => events.append(&mut parsed),
            None => tracing::debug!(
                "Skipping malformed TAL: {:?}",
                String::from_utf8_lossy(tal)
            ),
        }
    }
    events
}

/// Decode a single TAL. Returns `None` when the onset or duration is not a
/// number.
fn parse_tal(tal: &[u8]) -> Option<Vec<AnnotationEvent>> {
    let mut fields = tal.split(|&b| b == TAL_SEPARATOR);
    let timing = fields.next()?;

    let mut timing_parts = timing.split(|&b| b == DURATION_SEPARATOR);
    let onset = parse_seconds(timing_parts.next()?)?;
    let duration = match timing_parts.next() {
        Some(raw) if !raw.is_empty() => Some(parse_seconds(raw)?),
        _ => None,
    };

    Some(
        fields
            .filter(|text| !text.is_empty())
            .map(|text| AnnotationEvent {
                onset,
                duration,
                text: String::from_utf8_lossy(text).trim().to_string(),
            })
            .collect(),
    )
}

fn parse_seconds(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    let first = text.chars().next()?;
    if !(first == '+' || first == '-' || first.is_ascii_digit()) {
        return None;
    }
    let value: f64 = text.strip_prefix('+').unwrap_or(text).parse().ok()?;
    value.is_finite().then_some(value)
}
