//! Protocol Layer: GC Protection Wire Format
//!
//! Prinsip desain:
//! - Flat Binary: record bisa di-cast langsung tanpa parsing
//! - Fixed-size records: kedua record tepat 16 bytes
//! - No allocation: encode/decode langsung ke/dari buffer

mod encoder;
mod message;

pub use encoder::{BatchDecoder, BatchEncoder, BATCH_HEADER_SIZE, MAX_REQUESTS_PER_BATCH};
pub use message::{
    CommandCode, ProtectionMessage, ProtectionRequest, RequestKind, MESSAGE_SIZE, REQUEST_SIZE,
};
