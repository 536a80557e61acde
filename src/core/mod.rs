//! Core module: Shared Buffer mmap-backed
//!
//! Prinsip desain:
//! - Zero-Copy: batch dibaca langsung dari mmap region
//! - No-Allocation: semua buffer pre-allocated saat init

mod shared_buffer;

pub use shared_buffer::SharedBuffer;
