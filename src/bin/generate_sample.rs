use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde_json::json;

const DEVICE_KEY: &str = "00:07:80:65:E0:11";

/// Write a synthetic raw respiration dump.
#[derive(Parser)]
#[command(name = "generate_sample", version)]
struct Args {
    /// Output file
    #[arg(default_value = "sample_recording.txt")]
    out: PathBuf,
    /// Samples per second written to the header
    #[arg(long, default_value_t = 100)]
    rate: u32,
    /// Length of the recording in seconds
    #[arg(long, default_value_t = 300)]
    duration: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Breathing at ~15 per minute on a 10-bit baseline, with slow drift.
fn thorax(t: f64, rng: &mut SimpleRng) -> i64 {
    use std::f64::consts::TAU;
    let breath = 180.0 * (TAU * 0.25 * t).sin() + 25.0 * (TAU * 0.5 * t).sin();
    let drift = 40.0 * (TAU * 0.01 * t).sin();
    (512.0 + breath + drift + rng.gauss(0.0, 4.0)).round() as i64
}

fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(args.rate > 0, "--rate must be positive");

    let file = File::create(&args.out).with_context(|| format!("creating {}", args.out.display()))?;
    let mut out = BufWriter::new(file);
    let n = write_sample(&mut out, &args)?;
    out.flush()?;

    println!(
        "Wrote {n} samples ({} s at {} Hz) to {}",
        args.duration,
        args.rate,
        args.out.display()
    );
    Ok(())
}

/// Write the three header lines and `rate * duration` payload lines.
fn write_sample(out: &mut impl Write, args: &Args) -> Result<u64> {
    let mut rng = SimpleRng::new(args.seed);

    let header = json!({
        (DEVICE_KEY): {
            "sensor": ["RESPBIT", "ACC", "ACC"],
            "device name": DEVICE_KEY,
            "column": ["nSeq", "DI", "A1", "A2", "A3"],
            "sync interval": 2,
            "time": "09:30:00.000",
            "comments": "",
            "device connection": "BTH00:07:80:65:E0:11",
            "channels": [1, 2, 3],
            "date": "2024-01-01",
            "mode": 0,
            "digital IO": [0],
            "firmware version": 52,
            "device": "bitalino_rev",
            "position": 0,
            "sampling rate": args.rate,
            "label": ["A1", "A2", "A3"],
            "resolution": [4, 10, 10, 10],
            "special": [{}, {}, {}]
        }
    });

    writeln!(out, "# OpenSignals Text File Format")?;
    writeln!(out, "# {header}")?;
    writeln!(out, "# EndOfHeader")?;

    let n = u64::from(args.rate) * u64::from(args.duration);
    for i in 0..n {
        let t = i as f64 / args.rate as f64;
        let x = (500.0 + rng.gauss(0.0, 6.0)).round() as i64;
        let y = (520.0 + 30.0 * (std::f64::consts::TAU * 0.02 * t).sin() + rng.gauss(0.0, 6.0)).round() as i64;
        writeln!(out, "{}\t0\t{}\t{x}\t{y}", i % 16, thorax(t, &mut rng))?;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn arguments_default_to_five_minutes_at_100_hz() {
        Args::command().debug_assert();
        let args = Args::try_parse_from(["generate_sample"]).unwrap();
        assert_eq!(args.out, PathBuf::from("sample_recording.txt"));
        assert_eq!((args.rate, args.duration, args.seed), (100, 300, 42));

        let args = Args::try_parse_from(["generate_sample", "short.txt", "--rate", "50", "--duration", "2"]).unwrap();
        assert_eq!(args.out, PathBuf::from("short.txt"));
        assert_eq!((args.rate, args.duration), (50, 2));
    }

    #[test]
    fn output_has_header_and_one_line_per_sample() {
        let args = Args::try_parse_from(["generate_sample", "--rate", "10", "--duration", "3"]).unwrap();
        let mut buf = Vec::new();
        assert_eq!(write_sample(&mut buf, &args).unwrap(), 30);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 33);

        let header: serde_json::Value = serde_json::from_str(&lines[1][2..]).unwrap();
        assert_eq!(header[DEVICE_KEY]["sampling rate"], 10);
        assert_eq!(lines[3].split('\t').count(), 5);
        for line in &lines[3..] {
            for token in line.split('\t') {
                token.parse::<i64>().unwrap();
            }
        }
    }
}
