//! Configuration for the lut-transfer application.
//!
//! Handles parsing command-line arguments and generating sensible defaults
//! (including randomized device behavior that is reproducible with a seed).
//!
//! The tool works with ZERO arguments: it generates a sample table and
//! downloads it to a simulated device. All defaults are printed with
//! `--print-config` so runs are reproducible.

use crate::input_gen::PulseShape;
use lut_transfer_core::device::DeviceConfig;
use lut_transfer_core::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for a download run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Files ===
    /// Table-definition CSV (None = generate sample)
    pub input_file: Option<PathBuf>,

    /// Where to save the generated sample table, if anywhere
    pub sample_out: Option<PathBuf>,

    /// Samples in the generated table
    pub sample_count: usize,

    /// Pulse shape of the generated table
    pub shape: PulseShape,

    // === Device ===
    /// Simulated device behavior
    pub device: DeviceConfig,

    // === Retry policy ===
    /// Pause before re-sending after a busy reply
    pub busy_delay: Duration,

    /// Consecutive busy replies tolerated per request (None = unlimited)
    pub max_busy_retries: Option<u32>,

    // === Behavior ===
    /// Whether to print detailed config
    pub print_config: bool,

    /// Whether to print detailed metrics summary
    pub print_metrics: bool,
}

/// Parse the value following a flag.
fn value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str, what: &str) -> Result<T> {
    let raw = args
        .get(i)
        .ok_or_else(|| Error::Config(format!("{} requires {}", flag, what)))?;
    raw.parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {}", flag, raw)))
}

impl Config {
    /// Parse configuration from command-line arguments.
    ///
    /// If --seed is provided, uses that seed for all randomness (fully deterministic).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut input_file: Option<PathBuf> = None;
        let mut sample_out: Option<PathBuf> = None;
        let mut seed: Option<u64> = None;
        let mut sample_count: Option<usize> = None;
        let mut shape = PulseShape::default();
        let mut busy_rate: Option<f64> = None;
        let mut timeout_rate: Option<f64> = None;
        let mut verify_polls: Option<u32> = None;
        let mut busy_delay_ms: Option<u64> = None;
        let mut max_busy_retries: Option<u32> = None;
        let mut print_config = false;
        let mut print_metrics = true;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--in" => {
                    i += 1;
                    input_file = Some(value::<PathBuf>(args, i, "--in", "a path")?);
                }
                "--write-sample" => {
                    i += 1;
                    sample_out = Some(value::<PathBuf>(args, i, "--write-sample", "a path")?);
                }
                "--seed" => {
                    i += 1;
                    seed = Some(value(args, i, "--seed", "a number")?);
                }
                "--samples" => {
                    i += 1;
                    sample_count = Some(value(args, i, "--samples", "a number")?);
                }
                "--shape" => {
                    i += 1;
                    shape = value(args, i, "--shape", "plateau or offset")?;
                }
                "--busy-rate" => {
                    i += 1;
                    busy_rate = Some(value(args, i, "--busy-rate", "a number")?);
                }
                "--timeout-rate" => {
                    i += 1;
                    timeout_rate = Some(value(args, i, "--timeout-rate", "a number")?);
                }
                "--verify-polls" => {
                    i += 1;
                    verify_polls = Some(value(args, i, "--verify-polls", "a number")?);
                }
                "--busy-delay-ms" => {
                    i += 1;
                    busy_delay_ms = Some(value(args, i, "--busy-delay-ms", "a number")?);
                }
                "--max-busy-retries" => {
                    i += 1;
                    max_busy_retries = Some(value(args, i, "--max-busy-retries", "a number")?);
                }
                "--print-config" => {
                    print_config = true;
                }
                "--no-metrics" => {
                    print_metrics = false;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    return Err(Error::Config(format!("unknown argument: {}", args[i])));
                }
            }
            i += 1;
        }

        for (name, rate) in [("busy-rate", busy_rate), ("timeout-rate", timeout_rate)] {
            if let Some(rate) = rate {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(Error::Config(format!(
                        "--{} must be between 0 and 1, got {}",
                        name, rate
                    )));
                }
            }
        }

        // Determine seed (explicit or time-based)
        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });

        // Generate defaults using seed
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let config = Config {
            input_file,
            sample_out,
            sample_count: sample_count.unwrap_or_else(|| rng.gen_range(200..=2000)),
            shape,
            device: DeviceConfig {
                busy_rate: busy_rate.unwrap_or_else(|| {
                    // Bias toward a mostly idle device
                    let r: f64 = rng.gen();
                    (r * r * 0.2).min(0.2)
                }),
                timeout_rate: timeout_rate.unwrap_or(0.0),
                verify_polls: verify_polls.unwrap_or_else(|| rng.gen_range(0..=5)),
                seed,
            },
            busy_delay: Duration::from_millis(busy_delay_ms.unwrap_or(0)),
            max_busy_retries,
            print_config,
            print_metrics,
        };

        Ok(config)
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        match &self.input_file {
            Some(path) => println!("Input file: {}", path.display()),
            None => println!(
                "Input file: (generate {} samples, {} pulse)",
                self.sample_count, self.shape
            ),
        }
        if let Some(path) = &self.sample_out {
            println!("Sample output: {}", path.display());
        }
        println!();
        println!("=== Simulated Device ===");
        println!("Seed: {}", self.device.seed);
        println!("Busy rate: {:.2}%", self.device.busy_rate * 100.0);
        println!("Timeout rate: {:.2}%", self.device.timeout_rate * 100.0);
        println!("Verify polls: {}", self.device.verify_polls);
        println!();
        println!("=== Retry Policy ===");
        println!("Busy delay: {} ms", self.busy_delay.as_millis());
        match self.max_busy_retries {
            Some(max) => println!("Max busy retries: {}", max),
            None => println!("Max busy retries: unlimited"),
        }
        println!();
    }
}

fn print_help() {
    println!("lut-transfer: validate a lookup-table CSV and download it to a simulated controller");
    println!();
    println!("USAGE:");
    println!("    lut-transfer [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --in <PATH>              Table-definition CSV (default: generate sample)");
    println!("    --write-sample <PATH>    Save the generated sample table");
    println!("    --samples <N>            Generated table length (default: random 200-2000)");
    println!("    --shape <SHAPE>          Generated pulse: plateau or offset (default: plateau)");
    println!("    --seed <N>               Random seed for determinism");
    println!();
    println!("    --busy-rate <RATE>       Device busy probability 0.0-1.0 (default: random 0-0.2)");
    println!("    --timeout-rate <RATE>    Device timeout probability 0.0-1.0 (default: 0)");
    println!("    --verify-polls <N>       Polls before verification completes (default: random 0-5)");
    println!();
    println!("    --busy-delay-ms <MS>     Pause before re-sending a busy request (default: 0)");
    println!("    --max-busy-retries <N>   Give up after N busy replies in a row (default: unlimited)");
    println!();
    println!("    --print-config           Print resolved configuration");
    println!("    --no-metrics             Don't print metrics summary");
    println!("    --help, -h               Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    lut-transfer                                  # Sample table, random device");
    println!("    lut-transfer --seed 42                        # Deterministic run");
    println!("    lut-transfer --in pulse.csv --busy-rate 0     # Download a specific table");
    println!("    lut-transfer --timeout-rate 0.01              # Flaky link");
    println!();
}
