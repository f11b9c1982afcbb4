//! # Formats Module
//!
//! Binary encodings used by the local snapshot store.

pub mod record_codec;

pub use record_codec::{RecordHeader, decode_record, encode_record};
