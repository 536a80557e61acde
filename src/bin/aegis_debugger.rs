//! Aegis Debugger Endpoint Binary
//!
//! Sisi consumer dari session GC protection: listen untuk koneksi
//! runtime, baca notifikasi 16-byte, apply request batch dari shared
//! buffer ke protection tracker.
//!
//! Usage:
//!   cargo run --release --bin aegis_debugger [OPTIONS]

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;

use aegis::session::DebuggerEndpoint;
use log::LevelFilter;

/// Konfigurasi endpoint
struct DebuggerConfig {
    bind_addr: String,
    storage_path: String,
    storage_size_mb: usize,
    verbose: bool,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9595".to_string(),
            storage_path: "aegis_shared.dat".to_string(),
            storage_size_mb: 16,
            verbose: false,
        }
    }
}

fn parse_args() -> DebuggerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DebuggerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--storage" | "-s" => {
                if i + 1 < args.len() {
                    config.storage_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--size" => {
                if i + 1 < args.len() {
                    config.storage_size_mb = args[i + 1].parse().unwrap_or(16);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Aegis Debugger Endpoint - GC Protection Consumer\n");
                println!("Usage: aegis_debugger [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>     Bind address (default: 127.0.0.1:9595)");
                println!("  -s, --storage <PATH>  Shared buffer path (default: aegis_shared.dat)");
                println!("      --size <MB>       Shared buffer size in MB (default: 16)");
                println!("  -v, --verbose         Verbose output");
                println!("  -h, --help            Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    let config = parse_args();

    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new().with_level(level).init().ok();

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            log::error!("invalid bind address {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    let capacity = (config.storage_size_mb * 1024 * 1024).next_power_of_two();

    let mut endpoint = match DebuggerEndpoint::bind(addr, &config.storage_path, capacity) {
        Ok(e) => e,
        Err(e) => {
            log::error!("failed to bind endpoint: {}", e);
            std::process::exit(1);
        }
    };

    // Endpoint berjalan sampai proses di-kill
    let shutdown = AtomicBool::new(false);
    if let Err(e) = endpoint.run(&shutdown) {
        log::error!("endpoint error: {}", e);
        std::process::exit(1);
    }
}
