//! Signal processing on decoded tables: THORAX spectrum and band-pass stage.

use thiserror::Error;

use crate::data::model::{RateSource, SampleTable};

pub mod bandpass;
pub mod spectrum;

#[derive(Debug, Error)]
pub enum DspError {
    #[error("need at least {needed} samples for a {rate:?} sampling rate, got {got}")]
    InsufficientSamples {
        rate: RateSource,
        needed: usize,
        got: usize,
    },

    #[error("band {low_hz}..{high_hz} Hz must satisfy 0 < low < high < {nyquist_hz} Hz")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        nyquist_hz: f64,
    },

    #[error("filter order must be at least 1")]
    InvalidOrder,

    #[error("signal of {len} samples is too short, the filter pads {padlen} samples on each side")]
    SignalTooShort { len: usize, padlen: usize },
}

/// Resolve the sampling rate a consumer should use.
pub fn resolve_rate(table: &SampleTable, source: RateSource) -> Result<f64, DspError> {
    table
        .sampling_rate(source)
        .ok_or(DspError::InsufficientSamples {
            rate: source,
            needed: 2,
            got: table.len(),
        })
}

/// A post-processing step that maps one table to a new one.
pub trait TableStage {
    fn name(&self) -> &str;
    fn apply(&self, table: &SampleTable) -> Result<SampleTable, DspError>;
}

/// Run `stages` in order, each on the output of the previous one.
pub fn run_stages(table: &SampleTable, stages: &[&dyn TableStage]) -> Result<SampleTable, DspError> {
    let mut current = table.clone();
    for stage in stages {
        log::debug!("Applying stage {}", stage.name());
        current = stage.apply(&current)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Channel;
    use crate::data::testutil::{scenario_recording, sine_table};

    struct Negate;

    impl TableStage for Negate {
        fn name(&self) -> &str {
            "negate"
        }

        fn apply(&self, table: &SampleTable) -> Result<SampleTable, DspError> {
            let thorax = table.column_f64(Channel::Thorax).iter().map(|v| -v).collect();
            Ok(table.with_thorax(thorax))
        }
    }

    #[test]
    fn no_stages_returns_an_equal_table() {
        let table = sine_table(0.2, 10.0, 50, 100.0);
        assert_eq!(run_stages(&table, &[]).unwrap(), table);
    }

    #[test]
    fn stages_compose_in_order() {
        let table = scenario_recording().table;
        let twice = run_stages(&table, &[&Negate, &Negate]).unwrap();
        assert_eq!(twice.column_f64(Channel::Thorax), vec![10.0, 11.0]);
        assert_eq!(twice.raw_column(Channel::Thorax), table.raw_column(Channel::Thorax));
        let once = run_stages(&table, &[&Negate]).unwrap();
        assert_eq!(once.column_f64(Channel::Thorax), vec![-10.0, -11.0]);
    }

    #[test]
    fn derived_rate_of_a_single_row_is_an_error() {
        let table = sine_table(0.2, 10.0, 1, 100.0);
        assert!(matches!(
            resolve_rate(&table, RateSource::Derived),
            Err(DspError::InsufficientSamples { got: 1, .. })
        ));
        assert_eq!(resolve_rate(&table, RateSource::Declared).unwrap(), 10.0);
    }
}
