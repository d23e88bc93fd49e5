//! lut-transfer: validate a lookup-table CSV and download it to a simulated
//! controller, reporting progress and transfer metrics.

mod config;
mod input_gen;

use anyhow::{Context, Result};
use config::Config;
use lut_transfer_core::device::SimulatedDevice;
use lut_transfer_core::frame::encode_table_set;
use lut_transfer_core::ingest::{ingest_table, read_table_file};
use lut_transfer_core::transfer::{run_transfer, TransferOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        println!("✗ Download failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args)?;

    if config.print_config {
        config.print();
    }

    let tables = match &config.input_file {
        Some(path) => read_table_file(path)
            .with_context(|| format!("table file {} rejected", path.display()))?,
        None => {
            let text = input_gen::generate_sample_table(
                config.device.seed,
                config.sample_count,
                config.shape,
            );
            info!(
                "generated {} sample table with {} samples",
                config.shape, config.sample_count
            );
            if let Some(path) = &config.sample_out {
                input_gen::write_sample_file(path, &text)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("sample table written to {}", path.display());
            }
            ingest_table(&text).context("generated table rejected")?
        }
    };

    let frames = encode_table_set(tables);
    for (instance, frame) in frames.iter() {
        info!(
            "table instance {}: {} samples, {} bytes, crc {:#010x}",
            instance,
            frame.sample_count(),
            frame.len(),
            frame.crc()
        );
    }

    let mut device = SimulatedDevice::new(config.device);
    let options = TransferOptions {
        busy_delay: config.busy_delay,
        max_busy_retries: config.max_busy_retries,
    };

    let metrics = run_transfer(frames, &mut device, &options, |progress| {
        info!("download progress {}%", progress)
    })
    .context("download failed")?;

    if config.print_metrics {
        metrics.print_summary();
        let stats = device.stats();
        println!(
            "Device: {} requests, {} busy injected, {} rejected",
            stats.requests, stats.busy_injected, stats.rejected
        );
        println!();
    }

    println!("✓ Download verified");
    println!(
        "  {} table(s), {} bytes in {} ms",
        metrics.tables_sent,
        metrics.bytes_sent,
        metrics.duration().as_millis()
    );
    Ok(())
}
