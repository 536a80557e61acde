//! Debugger Endpoint: event-driven consumer dengan mio
//!
//! Poll loop menerima koneksi runtime, merakit frame 16-byte menjadi
//! `ProtectionMessage`, mengantrekannya sampai fase read selesai, lalu
//! dispatch per command code:
//!
//! - `RequestBufferReady`: baca batch dari shared buffer, apply tiap
//!   request ke `ProtectionTracker`
//! - `ConservativeReportingBufferReady`: catat region reporting
//! - command code unrecognized: drop message (non-fatal, logged)

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use crate::core::SharedBuffer;
use crate::protocol::{
    BatchDecoder, CommandCode, ProtectionMessage, ProtectionRequest, RequestKind,
    BATCH_HEADER_SIZE, MESSAGE_SIZE,
};
use crate::session::{ProtocolError, Result, SessionStats};

const LISTENER_TOKEN: Token = Token(0);
const RUNTIME_TOKEN: Token = Token(1);
const EVENTS_CAPACITY: usize = 64;
const READ_BUFFER_SIZE: usize = 16 * 1024;
const PENDING_CAPACITY: usize = 64;
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Region yang ditandai untuk conservative reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRegion {
    pub address: u64,
    pub size: u16,
}

/// Bookkeeping sisi debugger: region yang dilindungi dan handle yang
/// masih hidup. Bukan handle table milik runtime - hanya catatan
/// consumer atas request yang sudah diterima.
#[derive(Default)]
pub struct ProtectionTracker {
    regions: HashMap<u32, ProtectedRegion>,
    handles: HashSet<u32>,
    reporting_buffer: Option<u64>,
}

impl ProtectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daftarkan handle yang dibuat debugger (out-of-band dari protokol).
    pub fn register_handle(&mut self, identifier: u32) {
        self.handles.insert(identifier);
    }

    pub fn is_handle_live(&self, identifier: u32) -> bool {
        self.handles.contains(&identifier)
    }

    pub fn region(&self, identifier: u32) -> Option<&ProtectedRegion> {
        self.regions.get(&identifier)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn reporting_buffer(&self) -> Option<u64> {
        self.reporting_buffer
    }

    pub fn set_reporting_buffer(&mut self, offset: u64) {
        self.reporting_buffer = Some(offset);
    }

    /// Apply satu request. Kind unrecognized menghasilkan error
    /// `UnrecognizedRequest` - caller yang memutuskan skip (non-fatal).
    pub fn apply(&mut self, request: &ProtectionRequest) -> Result<()> {
        match request.kind() {
            Some(RequestKind::EnsureConservativeReporting) => {
                // Insert ulang dengan identifier sama mengganti region lama
                self.regions.insert(
                    request.identifier,
                    ProtectedRegion {
                        address: request.address,
                        size: request.size,
                    },
                );
            }
            Some(RequestKind::RemoveConservativeReporting) => {
                if self.regions.remove(&request.identifier).is_none() {
                    log::debug!(
                        "remove for untracked region {} ignored",
                        request.identifier
                    );
                }
            }
            Some(RequestKind::RemoveHandle) => {
                if !self.handles.remove(&request.identifier) {
                    log::debug!(
                        "remove for untracked handle {} ignored",
                        request.identifier
                    );
                }
            }
            None => return Err(ProtocolError::UnrecognizedRequest(request.kind)),
        }
        Ok(())
    }
}

/// Sisi debugger dari session GC protection.
pub struct DebuggerEndpoint {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    runtime_conn: Option<TcpStream>,
    read_buffer: Box<[u8]>,
    // Sisa frame parsial antar read (< MESSAGE_SIZE bytes)
    partial: [u8; MESSAGE_SIZE],
    partial_len: usize,
    // Message yang sudah di-decode, menunggu dispatch setelah fase read
    pending: VecDeque<ProtectionMessage>,
    shared: SharedBuffer,
    pub tracker: ProtectionTracker,
    pub stats: SessionStats,
}

impl DebuggerEndpoint {
    /// Bind endpoint dan buka shared buffer.
    pub fn bind<P: AsRef<Path>>(
        addr: SocketAddr,
        storage_path: P,
        storage_capacity: usize,
    ) -> Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;

        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let shared = SharedBuffer::open(storage_path, storage_capacity)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            runtime_conn: None,
            read_buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            partial: [0u8; MESSAGE_SIZE],
            partial_len: 0,
            pending: VecDeque::with_capacity(PENDING_CAPACITY),
            shared,
            tracker: ProtectionTracker::new(),
            stats: SessionStats::new(),
        })
    }

    /// Alamat listen aktual (berguna saat bind ke port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run event loop sampai `shutdown` di-set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut last_stats = Instant::now();

        log::info!("debugger endpoint listening on {}", self.local_addr()?);

        while !shutdown.load(Ordering::Relaxed) {
            self.poll_once(Some(Duration::from_millis(1)))?;

            if last_stats.elapsed() > STATS_INTERVAL {
                self.stats.log_summary();
                last_stats = Instant::now();
            }
        }

        Ok(())
    }

    /// Satu iterasi poll: terima koneksi, baca frame, dispatch pending.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Result<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            // Poll bisa diinterupsi signal - bukan error
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let mut accept_ready = false;
        let mut runtime_ready = false;
        for event in self.events.iter() {
            match event.token() {
                LISTENER_TOKEN => accept_ready = true,
                RUNTIME_TOKEN => {
                    if event.is_readable() {
                        runtime_ready = true;
                    }
                }
                _ => {}
            }
        }

        if accept_ready {
            self.accept_runtime()?;
        }
        if runtime_ready {
            self.read_frames()?;
        }

        self.dispatch_pending();

        Ok(())
    }

    fn accept_runtime(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if self.runtime_conn.is_some() {
                        // Satu runtime per session
                        log::warn!("rejecting extra runtime connection from {}", addr);
                        continue;
                    }

                    self.poll.registry().register(
                        &mut stream,
                        RUNTIME_TOKEN,
                        Interest::READABLE,
                    )?;
                    self.runtime_conn = Some(stream);
                    self.partial_len = 0;
                    log::info!("runtime connected from {}", addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Baca bytes dari koneksi runtime dan rakit frame 16-byte.
    fn read_frames(&mut self) -> Result<()> {
        loop {
            let read_result = match self.runtime_conn.as_mut() {
                Some(stream) => stream.read(&mut self.read_buffer),
                None => return Ok(()),
            };

            match read_result {
                Ok(0) => {
                    self.drop_runtime_conn("runtime disconnected");
                    return Ok(());
                }
                Ok(n) => self.ingest_bytes(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    self.drop_runtime_conn("runtime connection reset");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn drop_runtime_conn(&mut self, reason: &str) {
        log::info!("{}", reason);
        if let Some(mut conn) = self.runtime_conn.take() {
            self.poll.registry().deregister(&mut conn).ok();
        }
        self.partial_len = 0;
    }

    /// Potong `n` bytes pertama read buffer menjadi frame 16-byte.
    fn ingest_bytes(&mut self, n: usize) {
        let mut pos = 0;

        // Lengkapi frame parsial dari read sebelumnya
        if self.partial_len > 0 {
            let need = MESSAGE_SIZE - self.partial_len;
            let take = need.min(n);
            self.partial[self.partial_len..self.partial_len + take]
                .copy_from_slice(&self.read_buffer[..take]);
            self.partial_len += take;
            pos = take;

            if self.partial_len == MESSAGE_SIZE {
                self.enqueue_frame_from_partial();
            }
        }

        // Frame lengkap langsung dari read buffer
        while pos + MESSAGE_SIZE <= n {
            if let Some(msg) =
                ProtectionMessage::from_bytes(&self.read_buffer[pos..pos + MESSAGE_SIZE])
            {
                self.pending.push_back(msg);
            }
            pos += MESSAGE_SIZE;
        }

        // Simpan sisa (< 16 bytes) untuk read berikutnya
        if pos < n {
            let rest = n - pos;
            self.partial[..rest].copy_from_slice(&self.read_buffer[pos..n]);
            self.partial_len = rest;
        }
    }

    fn enqueue_frame_from_partial(&mut self) {
        if let Some(msg) = ProtectionMessage::from_bytes(&self.partial) {
            self.pending.push_back(msg);
        }
        self.partial_len = 0;
    }

    /// Drain pending queue dan dispatch tiap message per command code.
    fn dispatch_pending(&mut self) {
        while let Some(message) = self.pending.pop_front() {
            self.stats.messages_received.fetch_add(1, Ordering::Relaxed);

            match message.command_code() {
                Some(CommandCode::RequestBufferReady) => {
                    self.handle_request_batch(message.buffer_address);
                }
                Some(CommandCode::ConservativeReportingBufferReady) => {
                    log::debug!(
                        "conservative reporting buffer at offset {:#x}",
                        message.buffer_address
                    );
                    self.tracker.set_reporting_buffer(message.buffer_address);
                }
                None => {
                    // Non-fatal: message di-drop, session lanjut
                    log::warn!("{}", ProtocolError::UnrecognizedMessage(message.command_code));
                    self.stats
                        .unrecognized_messages
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Baca dan apply satu request batch dari shared buffer.
    fn handle_request_batch(&mut self, offset: u64) {
        // Baca count dari header dulu untuk menentukan panjang batch
        let count = match self.shared.slice(offset, BATCH_HEADER_SIZE) {
            Some(header) => {
                u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize
            }
            None => {
                log::warn!("{}", ProtocolError::TruncatedBatch { offset });
                self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let batch = match self.shared.slice(offset, BatchDecoder::batch_len(count)) {
            Some(b) => b,
            None => {
                log::warn!("{}", ProtocolError::TruncatedBatch { offset });
                self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let decoder = match BatchDecoder::new(batch) {
            Some(d) => d,
            None => {
                log::warn!("{}", ProtocolError::TruncatedBatch { offset });
                self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        for request in decoder {
            match self.tracker.apply(&request) {
                Ok(()) => {
                    self.stats.requests_applied.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // Non-fatal: request di-skip, sisa batch tetap diproses
                    log::warn!("{}", e);
                    self.stats
                        .unrecognized_requests
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
