//! Zero-phase Butterworth band-pass on the THORAX channel.
//!
//! The filter is designed as cascaded second-order sections from the analog
//! prototype (band transform, then bilinear transform with pre-warping) and run
//! forward then backward with odd-extension padding and steady-state initial
//! conditions, so it adds no phase shift.

use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use super::{resolve_rate, DspError, TableStage};
use crate::data::model::{Channel, RateSource, SampleTable};

pub const DEFAULT_LOW_HZ: f64 = 0.05;
pub const DEFAULT_HIGH_HZ: f64 = 0.8;
pub const DEFAULT_ORDER: usize = 4;

/// Bilinear transform constant for frequencies normalised to Nyquist.
const FS2: f64 = 4.0;
/// Poles with a smaller imaginary part are treated as real.
const IMAG_EPS: f64 = 1e-12;

/// Band-pass stage: THORAX is replaced, X, Y and timestamps are kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandpassFilter {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
    pub rate_source: RateSource,
}

impl Default for BandpassFilter {
    fn default() -> Self {
        Self {
            low_hz: DEFAULT_LOW_HZ,
            high_hz: DEFAULT_HIGH_HZ,
            order: DEFAULT_ORDER,
            rate_source: RateSource::Derived,
        }
    }
}

impl BandpassFilter {
    /// Filtered copy of the THORAX column.
    pub fn filter_thorax(&self, table: &SampleTable) -> Result<Vec<f64>, DspError> {
        let rate = resolve_rate(table, self.rate_source)?;
        let sections = design_sections(self.order, self.low_hz, self.high_hz, rate)?;
        log::debug!(
            "Band-pass {}..{} Hz, order {}, {} sections at {rate:.4} Hz",
            self.low_hz,
            self.high_hz,
            self.order,
            sections.len()
        );
        filtfilt(&sections, &table.column_f64(Channel::Thorax))
    }
}

impl TableStage for BandpassFilter {
    fn name(&self) -> &str {
        "bandpass"
    }

    fn apply(&self, table: &SampleTable) -> Result<SampleTable, DspError> {
        Ok(table.with_thorax(self.filter_thorax(table)?))
    }
}

// ---------------------------------------------------------------------------
// Second-order sections
// ---------------------------------------------------------------------------

/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 3],
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// State reached after a long unit-step input (transposed direct form II).
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let z1 = (b1 - a1 * b0 + b2 - a2 * b0) / (1.0 + a1 + a2);
        let z2 = b2 - a2 * b0 - a2 * z1;
        [z1, z2]
    }
}

/// Butterworth band-pass of `order` as `order` biquads.
///
/// Each section gets one zero at `z = 1` and one at `z = -1`; the overall gain
/// sits on the first section.
fn design_sections(order: usize, low_hz: f64, high_hz: f64, rate: f64) -> Result<Vec<Biquad>, DspError> {
    let nyquist = rate / 2.0;
    if order == 0 {
        return Err(DspError::InvalidOrder);
    }
    if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
        return Err(DspError::InvalidBand {
            low_hz,
            high_hz,
            nyquist_hz: nyquist,
        });
    }

    let warp = |hz: f64| FS2 * (PI * hz / nyquist / 2.0).tan();
    let (wl, wh) = (warp(low_hz), warp(high_hz));
    let bandwidth = wh - wl;
    let centre_sq = wl * wh;

    // Analog prototype poles, shifted onto the band.
    let n = order as f64;
    let mut analog = Vec::with_capacity(2 * order);
    for k in 0..order {
        let m = (2 * k) as f64 - (n - 1.0);
        let proto = -Complex::from_polar(1.0, PI * m / (2.0 * n));
        let shifted = proto * (bandwidth / 2.0);
        let root = (shifted * shifted - centre_sq).sqrt();
        analog.push(shifted + root);
        analog.push(shifted - root);
    }

    let fs2 = Complex::new(FS2, 0.0);
    let denominator: Complex<f64> = analog.iter().map(|p| fs2 - p).product();
    let gain = (Complex::new((bandwidth * FS2).powi(order as i32), 0.0) / denominator).re;

    let mut sections = Vec::with_capacity(order);
    let mut real_poles = Vec::new();
    for p in analog.iter().map(|p| (fs2 + p) / (fs2 - p)) {
        if p.im > IMAG_EPS {
            sections.push([-2.0 * p.re, p.norm_sqr()]);
        } else if p.im.abs() <= IMAG_EPS {
            real_poles.push(p.re);
        }
    }
    real_poles.sort_by(f64::total_cmp);
    for pair in real_poles.chunks(2) {
        match *pair {
            [p1, p2] => sections.push([-(p1 + p2), p1 * p2]),
            [p] => sections.push([-p, 0.0]),
            _ => {}
        }
    }

    Ok(sections
        .into_iter()
        .enumerate()
        .map(|(i, [a1, a2])| {
            let g = if i == 0 { gain } else { 1.0 };
            Biquad {
                b: [g, 0.0, -g],
                a: [1.0, a1, a2],
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Forward-backward filtering
// ---------------------------------------------------------------------------

/// Zero-phase filtering of `signal` through `sections`.
fn filtfilt(sections: &[Biquad], signal: &[f64]) -> Result<Vec<f64>, DspError> {
    let padlen = 3 * (2 * sections.len() + 1);
    if signal.len() <= padlen {
        return Err(DspError::SignalTooShort {
            len: signal.len(),
            padlen,
        });
    }

    let extended = odd_extend(signal, padlen);
    let zi = initial_states(sections);

    let forward = run_sections(sections, &extended, scaled(&zi, extended[0]));
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = run_sections(sections, &reversed, scaled(&zi, reversed[0]));

    let mut out: Vec<f64> = backward.into_iter().rev().collect();
    out.truncate(padlen + signal.len());
    Ok(out.split_off(padlen))
}

/// Point-reflect `n` samples about each end of `x`.
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let first = x[0];
    let last = x[x.len() - 1];
    let mut ext = Vec::with_capacity(x.len() + 2 * n);
    ext.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=n).map(|i| 2.0 * last - x[x.len() - 1 - i]));
    ext
}

/// Per-section steady state for a unit step through the whole cascade.
fn initial_states(sections: &[Biquad]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sections
        .iter()
        .map(|s| {
            let [z1, z2] = s.step_state();
            let state = [z1 * scale, z2 * scale];
            scale *= s.dc_gain();
            state
        })
        .collect()
}

fn scaled(states: &[[f64; 2]], by: f64) -> Vec<[f64; 2]> {
    states.iter().map(|[z1, z2]| [z1 * by, z2 * by]).collect()
}

fn run_sections(sections: &[Biquad], signal: &[f64], mut states: Vec<[f64; 2]>) -> Vec<f64> {
    let mut out = signal.to_vec();
    for (s, z) in sections.iter().zip(states.iter_mut()) {
        for v in out.iter_mut() {
            let x = *v;
            let y = s.b[0] * x + z[0];
            z[0] = s.b[1] * x - s.a[1] * y + z[1];
            z[1] = s.b[2] * x - s.a[2] * y;
            *v = y;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testutil::sine_table;

    fn peak(values: &[f64]) -> f64 {
        values.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    fn response(sections: &[Biquad], hz: f64, rate: f64) -> f64 {
        let z = Complex::from_polar(1.0, -2.0 * PI * hz / rate);
        sections
            .iter()
            .map(|s| {
                let num = s.b[0] + s.b[1] * z + s.b[2] * z * z;
                let den = s.a[0] + s.a[1] * z + s.a[2] * z * z;
                (num / den).norm()
            })
            .product()
    }

    #[test]
    fn unit_gain_at_band_centre() {
        let rate = 10.0;
        let sections = design_sections(4, 0.05, 0.8, rate).unwrap();
        assert_eq!(sections.len(), 4);

        // Centre of the warped band, mapped back to Hz.
        let warp = |hz: f64| FS2 * (PI * hz / rate).tan();
        let centre = (warp(0.05) * warp(0.8)).sqrt();
        let centre_hz = (centre / FS2).atan() * rate / PI;
        assert!((response(&sections, centre_hz, rate) - 1.0).abs() < 1e-9);

        assert!(response(&sections, 3.0, rate) < 1e-2);
        assert!(response(&sections, 0.005, rate) < 1e-2);
    }

    #[test]
    fn odd_orders_are_supported() {
        let sections = design_sections(3, 0.05, 0.8, 10.0).unwrap();
        assert_eq!(sections.len(), 3);
    }

    #[test]
    fn passband_sine_survives() {
        let table = sine_table(0.3, 10.0, 2000, 1000.0);
        let filter = BandpassFilter {
            rate_source: RateSource::Declared,
            ..Default::default()
        };
        let filtered = filter.apply(&table).unwrap();

        let thorax = filtered.column_f64(Channel::Thorax);
        let amplitude = peak(&thorax[800..1200]);
        assert!((900.0..1100.0).contains(&amplitude), "amplitude {amplitude}");
    }

    #[test]
    fn stopband_sine_is_removed() {
        let table = sine_table(3.0, 10.0, 2000, 1000.0);
        let filtered = BandpassFilter::default().apply(&table).unwrap();

        let thorax = filtered.column_f64(Channel::Thorax);
        let residual = peak(&thorax[800..1200]);
        assert!(residual < 10.0, "residual {residual}");
    }

    #[test]
    fn only_thorax_changes() {
        let table = sine_table(3.0, 10.0, 500, 1000.0);
        let filtered = BandpassFilter::default().apply(&table).unwrap();

        assert_eq!(filtered.len(), table.len());
        assert_eq!(filtered.timestamps(), table.timestamps());
        assert_eq!(filtered.raw_column(Channel::X), table.raw_column(Channel::X));
        assert_eq!(filtered.raw_column(Channel::Y), table.raw_column(Channel::Y));
        assert_eq!(filtered.raw_column(Channel::Thorax), table.raw_column(Channel::Thorax));
        assert_ne!(filtered.column_f64(Channel::Thorax), table.column_f64(Channel::Thorax));
        assert!(filtered.filtered_thorax().is_some());
    }

    #[test]
    fn band_above_nyquist_is_rejected() {
        let table = sine_table(0.1, 1.0, 500, 1000.0);
        let filter = BandpassFilter {
            rate_source: RateSource::Declared,
            ..Default::default()
        };
        assert!(matches!(filter.apply(&table), Err(DspError::InvalidBand { .. })));
    }

    #[test]
    fn inverted_band_and_zero_order_are_rejected() {
        assert!(matches!(design_sections(4, 0.8, 0.05, 10.0), Err(DspError::InvalidBand { .. })));
        assert!(matches!(design_sections(0, 0.05, 0.8, 10.0), Err(DspError::InvalidOrder)));
    }

    #[test]
    fn short_signals_are_rejected() {
        let table = sine_table(0.3, 10.0, 27, 1000.0);
        assert!(matches!(
            BandpassFilter::default().apply(&table),
            Err(DspError::SignalTooShort { len: 27, padlen: 27 })
        ));
    }

    #[test]
    fn odd_extension_reflects_about_end_points() {
        let ext = odd_extend(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }
}
