pub mod annotations;
pub mod cursor;
pub mod edf;
pub mod types;

pub use cursor::BinaryCursor;
pub use edf::RecordingDecoder;
pub use types::{AnnotationEvent, DecodeError, Header, SignalDescriptor};
