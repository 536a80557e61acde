//! Wire Format untuk GC Protection Records
//!
//! Dua record fixed-layout (16 bytes masing-masing) yang dikirim antara
//! runtime process (producer) dan debugger process (consumer):
//!
//! ```text
//! ProtectionMessage (16 bytes, 8-byte aligned):
//!   offset 0 : command_code   (u32)
//!   offset 4 : unused         (u32, padding)
//!   offset 8 : buffer_address (u64)
//!
//! ProtectionRequest (16 bytes):
//!   offset 0 : kind           (u16)
//!   offset 2 : size           (u16)
//!   offset 4 : identifier     (u32)
//!   offset 8 : address        (u64)
//! ```
//!
//! Layout ini adalah kontrak eksternal: field order dan width tidak boleh
//! diubah karena record di-transmit sebagai raw bytes antar address space.

use std::mem;

/// Command code untuk notifikasi runtime -> debugger
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Buffer berisi request batch siap dibaca debugger
    RequestBufferReady = 2,
    /// Buffer untuk conservative GC reporting siap
    ConservativeReportingBufferReady = 3,
}

impl CommandCode {
    #[inline(always)]
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            2 => Some(Self::RequestBufferReady),
            3 => Some(Self::ConservativeReportingBufferReady),
            _ => None,
        }
    }
}

/// Jenis operasi di dalam satu protection request
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Tandai region memory untuk conservative (non-precise) GC scanning
    EnsureConservativeReporting = 1,
    /// Hapus tanda dari region yang sebelumnya ditandai
    RemoveConservativeReporting = 2,
    /// Lepaskan tracked handle
    RemoveHandle = 3,
}

impl RequestKind {
    #[inline(always)]
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::EnsureConservativeReporting),
            2 => Some(Self::RemoveConservativeReporting),
            3 => Some(Self::RemoveHandle),
            _ => None,
        }
    }
}

/// Envelope notifikasi yang dikirim lewat transport.
///
/// Dapat di-cast langsung dari/ke raw bytes (zero-copy).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProtectionMessage {
    /// Salah satu nilai `CommandCode` (raw, bisa unrecognized di wire)
    pub command_code: u32,
    /// Padding agar `buffer_address` jatuh di 8-byte boundary.
    /// Zero saat ditulis, don't-care saat dibaca.
    pub unused: u32,
    /// Offset batch di dalam shared buffer (address space producer)
    pub buffer_address: u64,
}

pub const MESSAGE_SIZE: usize = mem::size_of::<ProtectionMessage>();

impl ProtectionMessage {
    #[inline(always)]
    pub fn new(code: CommandCode, buffer_address: u64) -> Self {
        Self {
            command_code: code as u32,
            unused: 0,
            buffer_address,
        }
    }

    /// Command code yang sudah divalidasi, `None` jika unrecognized
    #[inline(always)]
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::from_u32(self.command_code)
    }

    /// Decode dari raw bytes (unaligned read, buffer boleh tidak aligned)
    #[inline(always)]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < MESSAGE_SIZE {
            return None;
        }
        // SAFETY: MESSAGE_SIZE bytes tersedia dan semua bit pattern valid
        Some(unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const Self) })
    }

    /// View sebagai raw bytes (zero-copy)
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C) tanpa interior padding, semua bytes terinisialisasi
        unsafe { std::slice::from_raw_parts(self as *const Self as *const u8, MESSAGE_SIZE) }
    }
}

/// Satu operasi GC protection di dalam request batch.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProtectionRequest {
    /// Salah satu nilai `RequestKind` (raw, bisa unrecognized di wire)
    pub kind: u16,
    /// Ukuran region/payload dalam bytes
    pub size: u16,
    /// Identifier opaque yang mengkorelasikan request ke resource
    pub identifier: u32,
    /// Alamat target yang dikenai request
    pub address: u64,
}

pub const REQUEST_SIZE: usize = mem::size_of::<ProtectionRequest>();

impl ProtectionRequest {
    #[inline(always)]
    pub fn new(kind: RequestKind, size: u16, identifier: u32, address: u64) -> Self {
        Self {
            kind: kind as u16,
            size,
            identifier,
            address,
        }
    }

    /// Request untuk menandai region `[address, address + size)` agar
    /// di-scan secara conservative.
    #[inline(always)]
    pub fn ensure_conservative_reporting(identifier: u32, address: u64, size: u16) -> Self {
        Self::new(
            RequestKind::EnsureConservativeReporting,
            size,
            identifier,
            address,
        )
    }

    /// Request untuk menghapus tanda conservative reporting.
    #[inline(always)]
    pub fn remove_conservative_reporting(identifier: u32) -> Self {
        Self::new(RequestKind::RemoveConservativeReporting, 0, identifier, 0)
    }

    /// Request untuk melepaskan tracked handle.
    #[inline(always)]
    pub fn remove_handle(identifier: u32) -> Self {
        Self::new(RequestKind::RemoveHandle, 0, identifier, 0)
    }

    /// Kind yang sudah divalidasi, `None` jika unrecognized
    #[inline(always)]
    pub fn kind(&self) -> Option<RequestKind> {
        RequestKind::from_u16(self.kind)
    }

    /// Decode dari raw bytes (unaligned read)
    #[inline(always)]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < REQUEST_SIZE {
            return None;
        }
        // SAFETY: REQUEST_SIZE bytes tersedia dan semua bit pattern valid
        Some(unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const Self) })
    }

    /// View sebagai raw bytes (zero-copy)
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C) tanpa interior padding, semua bytes terinisialisasi
        unsafe { std::slice::from_raw_parts(self as *const Self as *const u8, REQUEST_SIZE) }
    }
}
