//! Shared Buffer: mmap-backed region antara runtime dan debugger
//!
//! Producer menulis request batch ke region ini; offset hasil publish
//! dikirim lewat `ProtectionMessage::buffer_address`. Consumer membuka
//! file yang sama dan membaca slice pada offset tersebut.
//!
//! - Zero-copy: batch dibaca langsung dari mmap region
//! - Bump allocation: posisi publish maju monoton dengan wraparound
//! - Satu batch tidak pernah di-split melewati titik wrap

use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Header region - metadata di awal mmap
#[repr(C, align(64))]
struct BufferHeader {
    magic: u64,             // Magic number untuk validasi
    version: u32,           // Versi format
    capacity: u32,          // Kapasitas data area dalam bytes
    publish_pos: AtomicU64, // Offset publish berikutnya (di-mask terhadap capacity)
}

const MAGIC: u64 = 0x41454749535F4243; // "AEGIS_BC"
const VERSION: u32 = 1;
const HEADER_SIZE: usize = std::mem::size_of::<BufferHeader>();

/// Mmap-backed buffer untuk staging request batches.
pub struct SharedBuffer {
    mmap: MmapMut,
    capacity: usize,
}

impl SharedBuffer {
    /// Membuat atau membuka shared buffer.
    ///
    /// Kedua proses (runtime dan debugger) membuka path yang sama.
    /// `capacity` harus power of 2.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        assert!(capacity.is_power_of_two(), "capacity must be power of 2");

        let total_size = HEADER_SIZE + capacity;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.set_len(total_size as u64)?;

        // SAFETY: File dibuka dengan read/write permission
        let mut mmap = unsafe { MmapOptions::new().len(total_size).map_mut(&file)? };

        // Initialize header jika file baru
        let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut BufferHeader) };

        if header.magic != MAGIC {
            header.magic = MAGIC;
            header.version = VERSION;
            header.capacity = capacity as u32;
            header.publish_pos = AtomicU64::new(0);
        } else if header.capacity as usize != capacity {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "shared buffer capacity mismatch",
            ));
        }

        Ok(Self { mmap, capacity })
    }

    #[inline(always)]
    fn header(&self) -> &BufferHeader {
        // SAFETY: Header berada di awal mmap region dan sudah terinisialisasi
        unsafe { &*(self.mmap.as_ptr() as *const BufferHeader) }
    }

    /// Publish batch bytes ke buffer (producer side).
    ///
    /// Returns offset (untuk `buffer_address`) atau `None` jika batch
    /// lebih besar dari kapasitas. Batch tidak pernah melewati titik wrap:
    /// jika sisa ruang sampai akhir region tidak cukup, posisi dimajukan
    /// ke awal region.
    #[inline]
    pub fn publish(&mut self, batch: &[u8]) -> Option<u64> {
        if batch.len() > self.capacity {
            return None;
        }

        let header = unsafe { &*(self.mmap.as_ptr() as *const BufferHeader) };
        let pos = header.publish_pos.load(Ordering::Relaxed);
        let mut offset = (pos as usize) & (self.capacity - 1);

        // Jangan split batch melewati wrap point
        if offset + batch.len() > self.capacity {
            offset = 0;
        }

        let mmap_ptr = self.mmap.as_mut_ptr();
        // SAFETY: offset + batch.len() <= capacity, region data mulai
        // di HEADER_SIZE
        unsafe {
            std::ptr::copy_nonoverlapping(
                batch.as_ptr(),
                mmap_ptr.add(HEADER_SIZE + offset),
                batch.len(),
            );
        }

        header
            .publish_pos
            .store((offset + batch.len()) as u64, Ordering::Release);

        Some(offset as u64)
    }

    /// Reserve region zeroed di buffer (untuk conservative reporting buffer).
    ///
    /// Returns offset region atau `None` jika `len` melebihi kapasitas.
    pub fn reserve_zeroed(&mut self, len: usize) -> Option<u64> {
        if len > self.capacity {
            return None;
        }

        let zeroes = vec![0u8; len];
        self.publish(&zeroes)
    }

    /// Baca slice pada offset (consumer side, zero-copy).
    ///
    /// Returns `None` jika range keluar dari data area.
    #[inline(always)]
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let offset = offset as usize;
        if offset.checked_add(len)? > self.capacity {
            return None;
        }

        // SAFETY: range sudah divalidasi terhadap capacity
        unsafe {
            let ptr = self.mmap.as_ptr().add(HEADER_SIZE + offset);
            Some(std::slice::from_raw_parts(ptr, len))
        }
    }

    /// Kapasitas data area
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
