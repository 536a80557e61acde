//! Runtime Producer: stage requests, publish batch, kirim notifikasi
//!
//! Alur satu flush:
//! 1. Request di-stage ke `BatchEncoder` (pre-allocated)
//! 2. Batch bytes di-publish ke `SharedBuffer` -> offset
//! 3. Satu `ProtectionMessage` (16 bytes) dikirim lewat TCP stream
//!    sebagai doorbell, `buffer_address` = offset batch

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::path::Path;

use crate::core::SharedBuffer;
use crate::protocol::{BatchEncoder, CommandCode, ProtectionMessage, ProtectionRequest};
use crate::session::{ProtocolError, Result};

/// Sisi runtime dari session GC protection.
pub struct RuntimeProducer {
    stream: TcpStream,
    shared: SharedBuffer,
    encoder: BatchEncoder,
    max_requests: usize,
}

impl RuntimeProducer {
    /// Connect ke debugger endpoint dan buka shared buffer.
    ///
    /// `storage_path` harus sama dengan yang dipakai debugger.
    pub fn connect<P: AsRef<Path>>(
        addr: SocketAddr,
        storage_path: P,
        storage_capacity: usize,
        max_requests_per_batch: usize,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        // Disable Nagle - notifikasi 16 bytes harus sampai segera
        stream.set_nodelay(true)?;

        #[cfg(unix)]
        tune_socket(&stream);

        let shared = SharedBuffer::open(storage_path, storage_capacity)?;

        // Encoder meng-clamp kapasitas; simpan nilai efektifnya supaya
        // error BatchFull melaporkan batas yang benar-benar berlaku
        let encoder = BatchEncoder::new(max_requests_per_batch);
        let max_requests = encoder.capacity();

        Ok(Self {
            stream,
            shared,
            encoder,
            max_requests,
        })
    }

    /// Stage satu request ke batch yang sedang dibangun.
    pub fn stage(&mut self, request: ProtectionRequest) -> Result<()> {
        if !self.encoder.push(&request) {
            return Err(ProtocolError::BatchFull {
                capacity: self.max_requests,
            });
        }
        Ok(())
    }

    /// Stage request ensure-conservative-reporting untuk region
    /// `[address, address + size)`.
    pub fn ensure_conservative_reporting(
        &mut self,
        identifier: u32,
        address: u64,
        size: u16,
    ) -> Result<()> {
        self.stage(ProtectionRequest::ensure_conservative_reporting(
            identifier, address, size,
        ))
    }

    /// Stage request remove-conservative-reporting.
    pub fn remove_conservative_reporting(&mut self, identifier: u32) -> Result<()> {
        self.stage(ProtectionRequest::remove_conservative_reporting(identifier))
    }

    /// Stage request remove-handle.
    pub fn remove_handle(&mut self, identifier: u32) -> Result<()> {
        self.stage(ProtectionRequest::remove_handle(identifier))
    }

    /// Jumlah request yang menunggu flush
    pub fn pending(&self) -> usize {
        self.encoder.len()
    }

    /// Publish batch yang ter-stage dan kirim notifikasi RequestBufferReady.
    ///
    /// Returns offset batch di shared buffer. No-op (`Ok(None)`) jika tidak
    /// ada request ter-stage.
    pub fn flush(&mut self) -> Result<Option<u64>> {
        if self.encoder.is_empty() {
            return Ok(None);
        }

        let batch = self.encoder.finish();
        let len = batch.len();
        let offset = self
            .shared
            .publish(batch)
            .ok_or(ProtocolError::BufferFull { len })?;
        self.encoder.reset();

        self.notify(CommandCode::RequestBufferReady, offset)?;
        log::debug!("flushed request batch at offset {:#x}", offset);

        Ok(Some(offset))
    }

    /// Reserve region zeroed untuk conservative reporting dan umumkan
    /// ke debugger dengan ConservativeReportingBufferReady.
    ///
    /// Returns offset region.
    pub fn announce_reporting_buffer(&mut self, len: usize) -> Result<u64> {
        let offset = self
            .shared
            .reserve_zeroed(len)
            .ok_or(ProtocolError::BufferFull { len })?;

        self.notify(CommandCode::ConservativeReportingBufferReady, offset)?;
        log::debug!(
            "announced conservative reporting buffer at offset {:#x} ({} bytes)",
            offset,
            len
        );

        Ok(offset)
    }

    fn notify(&mut self, code: CommandCode, buffer_address: u64) -> Result<()> {
        let message = ProtectionMessage::new(code, buffer_address);
        self.stream.write_all(message.as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }
}

/// SO_SNDBUF besar agar burst notifikasi tidak memblokir runtime
#[cfg(unix)]
fn tune_socket(stream: &TcpStream) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        let optval: libc::c_int = 256 * 1024;
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}
