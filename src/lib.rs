//! Aegis - GC Protection Message Channel
//!
//! Koordinasi GC protection antara runtime process dan attached debugger:
//! runtime menulis request batch ke shared buffer (mmap), lalu mengirim
//! notifikasi 16-byte lewat transport; debugger membaca batch dan
//! meng-apply tiap request.
//!
//! Arsitektur:
//! - Zero-Copy: record fixed-layout, batch dibaca langsung dari mmap
//! - No-Allocation: encoder batch dan read buffer pre-allocated
//! - Binary Protocol: layout bit-exact, stabil antar implementasi

pub mod core;
pub mod protocol;
pub mod session;
