//! Batch Encoder/Decoder untuk Protection Requests
//!
//! Satu `ProtectionMessage` menunjuk ke satu batch di shared buffer.
//! Format batch:
//!
//! ```text
//! offset 0 : count    (u32) - jumlah request dalam batch
//! offset 4 : reserved (u32) - zero, agar request pertama 8-byte aligned
//! offset 8 : count x ProtectionRequest (16 bytes masing-masing)
//! ```
//!
//! Encode dilakukan ke pre-allocated buffer, tidak ada alokasi setelah
//! inisialisasi.

use super::message::{ProtectionRequest, REQUEST_SIZE};

/// Ukuran header batch (count + reserved)
pub const BATCH_HEADER_SIZE: usize = 8;

/// Batas jumlah request per batch - menjaga batch muat di shared buffer
/// dan menolak count hasil korupsi.
pub const MAX_REQUESTS_PER_BATCH: usize = 4096;

/// Pre-allocated encoder untuk request batch.
///
/// Semua push menulis langsung ke buffer internal; `finish()` mengembalikan
/// slice siap di-publish ke shared buffer.
pub struct BatchEncoder {
    buffer: Box<[u8]>,
    count: usize,
}

impl BatchEncoder {
    /// Membuat encoder dengan kapasitas maksimum `max_requests` per batch.
    pub fn new(max_requests: usize) -> Self {
        let max_requests = max_requests.min(MAX_REQUESTS_PER_BATCH);
        Self {
            buffer: vec![0u8; BATCH_HEADER_SIZE + max_requests * REQUEST_SIZE].into_boxed_slice(),
            count: 0,
        }
    }

    /// Reset encoder untuk batch berikutnya
    #[inline(always)]
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Tambah satu request ke batch.
    ///
    /// Returns `false` jika batch sudah penuh.
    #[inline(always)]
    pub fn push(&mut self, request: &ProtectionRequest) -> bool {
        let offset = BATCH_HEADER_SIZE + self.count * REQUEST_SIZE;
        if offset + REQUEST_SIZE > self.buffer.len() {
            return false;
        }

        self.buffer[offset..offset + REQUEST_SIZE].copy_from_slice(request.as_bytes());
        self.count += 1;
        true
    }

    /// Jumlah request yang sudah di-stage
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Kapasitas efektif (request per batch) setelah clamp terhadap
    /// `MAX_REQUESTS_PER_BATCH`.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        (self.buffer.len() - BATCH_HEADER_SIZE) / REQUEST_SIZE
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finalisasi batch: tulis header lalu kembalikan slice siap publish.
    #[inline(always)]
    pub fn finish(&mut self) -> &[u8] {
        self.buffer[0..4].copy_from_slice(&(self.count as u32).to_le_bytes());
        self.buffer[4..8].copy_from_slice(&0u32.to_le_bytes());
        &self.buffer[..BATCH_HEADER_SIZE + self.count * REQUEST_SIZE]
    }
}

/// Zero-copy decoder: iterasi request keluar dari byte slice batch.
pub struct BatchDecoder<'a> {
    buffer: &'a [u8],
    count: usize,
    read_idx: usize,
}

impl<'a> BatchDecoder<'a> {
    /// Membuat decoder dari slice batch.
    ///
    /// Returns `None` jika header tidak lengkap, count melebihi batas,
    /// atau slice lebih pendek dari yang diklaim count (batch truncated).
    pub fn new(buffer: &'a [u8]) -> Option<Self> {
        if buffer.len() < BATCH_HEADER_SIZE {
            return None;
        }

        let count = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        if count > MAX_REQUESTS_PER_BATCH {
            return None;
        }
        if buffer.len() < BATCH_HEADER_SIZE + count * REQUEST_SIZE {
            return None;
        }

        Some(Self {
            buffer,
            count,
            read_idx: 0,
        })
    }

    /// Jumlah request dalam batch
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total bytes batch (header + records), untuk menentukan panjang
    /// slice yang harus dibaca dari shared buffer.
    #[inline(always)]
    pub fn batch_len(count: usize) -> usize {
        BATCH_HEADER_SIZE + count * REQUEST_SIZE
    }

    /// Sisa request yang belum di-decode
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.count - self.read_idx
    }
}

impl<'a> Iterator for BatchDecoder<'a> {
    type Item = ProtectionRequest;

    #[inline(always)]
    fn next(&mut self) -> Option<ProtectionRequest> {
        if self.read_idx >= self.count {
            return None;
        }

        let offset = BATCH_HEADER_SIZE + self.read_idx * REQUEST_SIZE;
        let request = ProtectionRequest::from_bytes(&self.buffer[offset..])?;
        self.read_idx += 1;
        Some(request)
    }
}
