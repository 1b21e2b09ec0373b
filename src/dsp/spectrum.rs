use rustfft::{num_complex::Complex, FftPlanner};

use super::{resolve_rate, DspError};
use crate::data::model::{Channel, RateSource, SampleTable};

/// Upper edge of the band shown to users; breathing lives well below 1 Hz.
pub const DISPLAY_MAX_HZ: f64 = 1.0;

/// One-sided magnitude spectrum of the THORAX channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Bin centres in Hz, `k * rate / n` for `k = 0..=n/2`.
    pub frequencies: Vec<f64>,
    /// `|X[k]|` for each bin.
    pub magnitudes: Vec<f64>,
    /// Rate the bins were computed with.
    pub sampling_rate: f64,
}

impl Spectrum {
    /// Bins whose frequency lies in `[0, max_hz]`, as `(frequency, magnitude)`.
    pub fn band(&self, max_hz: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .zip(&self.magnitudes)
            .map(|(&f, &m)| (f, m))
            .filter(move |&(f, _)| (0.0..=max_hz).contains(&f))
    }

    /// The `[0, 1]` Hz band used for display.
    pub fn display_band(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.band(DISPLAY_MAX_HZ)
    }

    /// Strongest non-DC bin at or below `max_hz`.
    pub fn dominant(&self, max_hz: f64) -> Option<(f64, f64)> {
        self.band(max_hz)
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// FFT of THORAX at the rate chosen by `source`.
pub fn thorax_spectrum(table: &SampleTable, source: RateSource) -> Result<Spectrum, DspError> {
    let n = table.len();
    if n == 0 {
        return Err(DspError::InsufficientSamples {
            rate: source,
            needed: 1,
            got: 0,
        });
    }
    let sampling_rate = resolve_rate(table, source)?;

    let mut buffer: Vec<Complex<f64>> = table
        .column_f64(Channel::Thorax)
        .into_iter()
        .map(|v| Complex::new(v, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let bins = n / 2 + 1;
    let frequencies = (0..bins).map(|k| k as f64 * sampling_rate / n as f64).collect();
    let magnitudes = buffer.iter().take(bins).map(|c| c.norm()).collect();

    log::debug!("THORAX spectrum: {bins} bins at {sampling_rate:.4} Hz ({source:?})");

    Ok(Spectrum {
        frequencies,
        magnitudes,
        sampling_rate,
    })
}
