mod app;
mod color;
mod data;
mod dsp;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use app::ThoraxViewerApp;
use clap::{Parser, Subcommand};
use data::export::{export, ExportFormat};
use data::layout::{RecordLayout, DEFAULT_DEVICE_KEY};
use data::loader::load_file;
use data::model::{RateSource, Recording, SampleTable};
use dsp::bandpass::BandpassFilter;
use dsp::spectrum::{thorax_spectrum, DISPLAY_MAX_HZ};
use dsp::{run_stages, TableStage};
use eframe::egui;
use state::AppState;

#[derive(Parser)]
#[command(name = "thorax-viewer", version, about = "Decode and inspect raw respiration sensor dumps")]
pub struct Cli {
    /// Header entry to read, the sensor's MAC address
    #[arg(long, env = "THORAX_DEVICE", default_value = DEFAULT_DEVICE_KEY, global = true)]
    pub device: String,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    ///
    /// Plot THORAX, X and Y in a window (default)
    ///
    View {
        /// Raw .txt dump to open on start
        file: Option<PathBuf>,
        #[arg(long)]
        bandpass: bool,
    },
    ///
    /// Pretty-print the JSON header
    ///
    Header { file: PathBuf },
    ///
    /// Print the THORAX magnitude spectrum
    ///
    Spectrum {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = RateSource::Derived)]
        rate: RateSource,
        #[arg(long)]
        bandpass: bool,
        /// Highest frequency listed
        #[arg(long, default_value_t = DISPLAY_MAX_HZ)]
        max_hz: f64,
    },
    ///
    /// Write the decoded table to csv, parquet or a json request body
    ///
    Export {
        file: PathBuf,
        #[arg(long, short)]
        out: PathBuf,
        /// Defaults to the extension of --out
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        #[arg(long, value_enum, default_value_t = RateSource::Derived)]
        rate: RateSource,
        #[arg(long)]
        bandpass: bool,
    },
}

fn main() -> Result<()> {
    let dotenv_result = dotenv::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(error) = dotenv_result {
        log::debug!("No .env loaded: {error}");
    }

    let cli = Cli::parse();
    let layout = RecordLayout::for_device(cli.device);

    match cli.command.unwrap_or(Command::View {
        file: None,
        bandpass: false,
    }) {
        Command::View { file, bandpass } => run_viewer(layout, file, bandpass),
        Command::Header { file } => {
            let recording = load_file(&file, &layout)?;
            println!("{}", recording.header.to_pretty_json()?);
            Ok(())
        }
        Command::Spectrum {
            file,
            rate,
            bandpass,
            max_hz,
        } => {
            let recording = load_file(&file, &layout)?;
            let table = processed_table(&recording, bandpass, rate)?;
            let spectrum = thorax_spectrum(&table, rate)?;

            println!("# THORAX spectrum at {:.4} Hz ({rate:?} rate)", spectrum.sampling_rate);
            println!("{:>12} {:>16}", "frequency_hz", "magnitude");
            for (freq, magnitude) in spectrum.band(max_hz) {
                println!("{freq:>12.5} {magnitude:>16.3}");
            }
            if let Some((freq, _)) = spectrum.dominant(max_hz) {
                println!("# dominant {freq:.4} Hz ({:.1} per minute)", freq * 60.0);
            }
            Ok(())
        }
        Command::Export {
            file,
            out,
            format,
            rate,
            bandpass,
        } => {
            let format = match format {
                Some(format) => format,
                None => ExportFormat::from_path(&out)
                    .with_context(|| format!("cannot tell the format of {}, pass --format", out.display()))?,
            };
            let recording = load_file(&file, &layout)?;
            let table = processed_table(&recording, bandpass, rate)?;
            export(&recording, &table, &out, format)
        }
    }
}

/// The recording's table, band-passed when asked.
fn processed_table(recording: &Recording, bandpass: bool, rate: RateSource) -> Result<SampleTable> {
    let filter = BandpassFilter {
        rate_source: rate,
        ..Default::default()
    };
    let mut stages: Vec<&dyn TableStage> = Vec::new();
    if bandpass {
        stages.push(&filter);
    }
    run_stages(&recording.table, &stages).context("applying band-pass")
}

fn run_viewer(layout: RecordLayout, file: Option<PathBuf>, bandpass: bool) -> Result<()> {
    let mut state = AppState::new(layout);

    // Bad paths and malformed dumps stop here, before any window opens.
    if let Some(path) = file {
        let recording = load_file(&path, &state.layout)?;
        state.set_recording(recording, Some(path));
        if bandpass {
            state.set_bandpass(true);
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Thorax Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(ThoraxViewerApp::new(state)))),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_arguments_parse() {
        let cli = Cli::try_parse_from([
            "thorax-viewer",
            "--device",
            "AA:BB",
            "export",
            "in.txt",
            "--out",
            "out.parquet",
            "--rate",
            "declared",
            "--bandpass",
        ])
        .unwrap();
        assert_eq!(cli.device, "AA:BB");
        match cli.command {
            Some(Command::Export {
                file,
                out,
                format,
                rate,
                bandpass,
            }) => {
                assert_eq!(file, PathBuf::from("in.txt"));
                assert_eq!(out, PathBuf::from("out.parquet"));
                assert_eq!(format, None);
                assert_eq!(rate, RateSource::Declared);
                assert!(bandpass);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn processed_table_without_bandpass_is_the_raw_table() {
        let recording = data::testutil::scenario_recording();
        let table = processed_table(&recording, false, RateSource::Derived).unwrap();
        assert_eq!(table, recording.table);
        assert!(processed_table(&recording, true, RateSource::Derived).is_err());
    }
}
