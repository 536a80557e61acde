//! Aegis Runtime Simulator Binary
//!
//! Sisi producer dari session GC protection: generate workload
//! ensure/remove conservative reporting dan remove handle, lalu ukur
//! latency flush. Berguna untuk menguji endpoint tanpa runtime asli.
//!
//! Usage:
//!   cargo run --release --bin aegis_runtime -- --connect 127.0.0.1:9595

use std::net::SocketAddr;
use std::time::Instant;

use aegis::session::RuntimeProducer;
use log::LevelFilter;

/// Konfigurasi workload
struct RuntimeConfig {
    connect_addr: String,
    storage_path: String,
    storage_size_mb: usize,
    regions: u32,
    batch_size: usize,
    verbose: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            connect_addr: "127.0.0.1:9595".to_string(),
            storage_path: "aegis_shared.dat".to_string(),
            storage_size_mb: 16,
            regions: 1024,
            batch_size: 32,
            verbose: false,
        }
    }
}

fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--connect" | "-c" => {
                if i + 1 < args.len() {
                    config.connect_addr = args[i + 1].clone();
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
            "--regions" => {
                if i + 1 < args.len() {
                    config.regions = args[i + 1].parse().unwrap_or(1024);
                    i += 1;
                }
            }
            "--batch" => {
                if i + 1 < args.len() {
                    config.batch_size = args[i + 1].parse().unwrap_or(32);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Aegis Runtime Simulator - GC Protection Producer\n");
                println!("Usage: aegis_runtime [OPTIONS]\n");
                println!("Options:");
                println!("  -c, --connect <ADDR>  Debugger endpoint (default: 127.0.0.1:9595)");
                println!("  -s, --storage <PATH>  Shared buffer path (default: aegis_shared.dat)");
                println!("      --size <MB>       Shared buffer size in MB (default: 16)");
                println!("      --regions <N>     Regions to protect (default: 1024)");
                println!("      --batch <N>       Requests per batch (default: 32)");
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

fn run_workload(config: RuntimeConfig) -> aegis::session::Result<()> {
    let addr: SocketAddr = config
        .connect_addr
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad address"))?;

    let capacity = (config.storage_size_mb * 1024 * 1024).next_power_of_two();

    let mut producer = RuntimeProducer::connect(
        addr,
        &config.storage_path,
        capacity,
        config.batch_size,
    )?;
    log::info!("connected to debugger endpoint at {}", addr);

    let base_address: u64 = 0x7F00_0000_0000;
    let mut batches = 0u64;
    let mut requests = 0u64;

    // Phase 1: protect semua region
    let start = Instant::now();
    for id in 0..config.regions {
        producer.ensure_conservative_reporting(id, base_address + (id as u64) * 0x100, 64)?;
        requests += 1;

        if producer.pending() >= config.batch_size {
            producer.flush()?;
            batches += 1;
        }
    }
    if producer.flush()?.is_some() {
        batches += 1;
    }
    let protect_duration = start.elapsed();

    // Phase 2: umumkan conservative reporting buffer
    let offset = producer.announce_reporting_buffer(4096)?;
    log::info!("reporting buffer announced at offset {:#x}", offset);

    // Phase 3: lepas separuh region + beberapa handle
    let start = Instant::now();
    for id in 0..config.regions / 2 {
        producer.remove_conservative_reporting(id)?;
        requests += 1;

        if producer.pending() >= config.batch_size {
            producer.flush()?;
            batches += 1;
        }
    }
    for id in 9000..9008u32 {
        producer.remove_handle(id)?;
        requests += 1;
    }
    if producer.flush()?.is_some() {
        batches += 1;
    }
    let release_duration = start.elapsed();

    println!("\n📊 Runtime workload complete");
    println!("   Requests sent:  {}", requests);
    println!("   Batches:        {}", batches);
    println!(
        "   Protect phase:  {:.2} ms ({:.2} µs/request)",
        protect_duration.as_secs_f64() * 1000.0,
        protect_duration.as_micros() as f64 / config.regions.max(1) as f64
    );
    println!(
        "   Release phase:  {:.2} ms",
        release_duration.as_secs_f64() * 1000.0
    );

    Ok(())
}

fn main() {
    let config = parse_args();

    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new().with_level(level).init().ok();

    if let Err(e) = run_workload(config) {
        log::error!("runtime workload error: {}", e);
        std::process::exit(1);
    }
}
