use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::parser::ParseError;

// ---------------------------------------------------------------------------
// Channel – the three decoded columns
// ---------------------------------------------------------------------------

/// One of the decoded channels, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Respiratory effort amplitude.
    Thorax,
    X,
    Y,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Thorax, Channel::X, Channel::Y];

    /// Column name as it appears in exports and plot titles.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Thorax => "THORAX",
            Channel::X => "X",
            Channel::Y => "Y",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// RateSource – which sampling rate downstream consumers trust
// ---------------------------------------------------------------------------

/// Where a consumer takes its sampling rate from.
///
/// `Derived` recomputes the rate as `row_count / span_seconds` from the
/// timestamps, which is what the spectrum and band-pass historically used.
/// `Declared` trusts the header value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RateSource {
    #[default]
    Derived,
    Declared,
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Typed view of the configured device's header entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Key of the entry in the header object (a MAC address).
    pub key: String,
    /// Samples per second.
    pub sampling_rate: f64,
    /// Date string as written in the header.
    pub date: String,
    /// Clock time string as written in the header.
    pub time: String,
    /// `date` + `time`, the instant of the first sample.
    pub start: NaiveDateTime,
}

/// The parsed header line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHeader {
    /// Every device entry exactly as it appeared, keyed by device id.
    pub entries: Map<String, JsonValue>,
    pub device: DeviceInfo,
}

impl RawHeader {
    /// Pretty-printed JSON of the whole header object.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

// ---------------------------------------------------------------------------
// SampleRecord – one payload line
// ---------------------------------------------------------------------------

/// Integer channel values decoded from one payload line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    pub thorax: i64,
    pub x: i64,
    pub y: i64,
}

/// One cell of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    /// Integer exactly as read from the dump.
    Raw(i64),
    /// Output of a processing stage.
    Filtered(f64),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Raw(v) => write!(f, "{v}"),
            Reading::Filtered(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SampleTable – time-indexed columns
// ---------------------------------------------------------------------------

/// Immutable, time-indexed table with columns `[THORAX, X, Y]`.
///
/// Row `i` is stamped `start + i * period`, so the index is unique and sorted
/// by construction. The raw integer columns are never altered; a filtering
/// stage stores its THORAX output next to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    period: TimeDelta,
    declared_rate: f64,
    timestamps: Vec<NaiveDateTime>,
    thorax: Vec<i64>,
    x: Vec<i64>,
    y: Vec<i64>,
    filtered_thorax: Option<Vec<f64>>,
}

/// Spacing between two rows at `sampling_rate`, rounded to the nanosecond.
///
/// `None` when the rate is not finite, not positive, or yields a step that
/// does not fit in `(0, i64::MAX]` nanoseconds.
pub fn sample_period(sampling_rate: f64) -> Option<TimeDelta> {
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return None;
    }
    let nanos = (1e9 / sampling_rate).round();
    if nanos < 1.0 || nanos >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::nanoseconds(nanos as i64))
}

impl SampleTable {
    /// Stamp `records` starting at `start`, one row every `1000 / sampling_rate` ms.
    pub fn from_records(
        start: NaiveDateTime,
        sampling_rate: f64,
        records: &[SampleRecord],
    ) -> Result<Self, ParseError> {
        let period = sample_period(sampling_rate)
            .ok_or_else(|| ParseError::InvalidSamplingRate(format!("{sampling_rate} Hz")))?;
        let step = period.num_nanoseconds().unwrap_or(i64::MAX);

        let timestamps = (0..records.len())
            .map(|i| {
                (i as i64)
                    .checked_mul(step)
                    .and_then(|offset| start.checked_add_signed(TimeDelta::nanoseconds(offset)))
                    .ok_or_else(|| {
                        ParseError::InvalidSamplingRate(format!(
                            "{sampling_rate} Hz overflows the timestamp range at row {i}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SampleTable {
            period,
            declared_rate: sampling_rate,
            timestamps,
            thorax: records.iter().map(|r| r.thorax).collect(),
            x: records.iter().map(|r| r.x).collect(),
            y: records.iter().map(|r| r.y).collect(),
            filtered_thorax: None,
        })
    }

    /// Copy of this table whose THORAX readings are `thorax`.
    ///
    /// `thorax` must have one value per row. The raw column is kept.
    pub fn with_thorax(&self, thorax: Vec<f64>) -> Self {
        debug_assert_eq!(thorax.len(), self.len());
        SampleTable {
            filtered_thorax: Some(thorax),
            ..self.clone()
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Integers read from the dump, unaffected by any filtering.
    pub fn raw_column(&self, channel: Channel) -> &[i64] {
        match channel {
            Channel::Thorax => &self.thorax,
            Channel::X => &self.x,
            Channel::Y => &self.y,
        }
    }

    /// THORAX as left by the last filtering stage, if any.
    pub fn filtered_thorax(&self) -> Option<&[f64]> {
        self.filtered_thorax.as_deref()
    }

    /// Floating-point view for plotting and signal processing.
    ///
    /// THORAX is the filtered column when there is one.
    pub fn column_f64(&self, channel: Channel) -> Vec<f64> {
        match (channel, self.filtered_thorax()) {
            (Channel::Thorax, Some(filtered)) => filtered.to_vec(),
            _ => self.raw_column(channel).iter().map(|&v| v as f64).collect(),
        }
    }

    /// Timestamp of the first row.
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    /// Spacing between consecutive rows.
    pub fn period(&self) -> TimeDelta {
        self.period
    }

    /// Rate written in the header.
    pub fn declared_rate(&self) -> f64 {
        self.declared_rate
    }

    /// Time between the first and last rows.
    pub fn span(&self) -> TimeDelta {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => *last - *first,
            _ => TimeDelta::zero(),
        }
    }

    /// `row_count / span_seconds`. Needs at least two rows.
    pub fn derived_rate(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let seconds = self.span().num_nanoseconds()? as f64 / 1e9;
        Some(self.len() as f64 / seconds)
    }

    /// Sampling rate according to `source`.
    pub fn sampling_rate(&self, source: RateSource) -> Option<f64> {
        match source {
            RateSource::Declared => Some(self.declared_rate),
            RateSource::Derived => self.derived_rate(),
        }
    }

    /// Seconds elapsed since the first row, one value per row.
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        let Some(start) = self.start() else {
            return Vec::new();
        };
        self.timestamps
            .iter()
            .map(|ts| (*ts - start).num_nanoseconds().unwrap_or(i64::MAX) as f64 / 1e9)
            .collect()
    }

    /// Iterate rows as `(timestamp, [THORAX, X, Y])`.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDateTime, [Reading; 3])> + '_ {
        self.timestamps.iter().enumerate().map(|(i, ts)| {
            let thorax = match &self.filtered_thorax {
                Some(filtered) => Reading::Filtered(filtered[i]),
                None => Reading::Raw(self.thorax[i]),
            };
            (*ts, [thorax, Reading::Raw(self.x[i]), Reading::Raw(self.y[i])])
        })
    }
}

// ---------------------------------------------------------------------------
// Recording – header + table of one file
// ---------------------------------------------------------------------------

/// Everything decoded from one raw dump.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub header: RawHeader,
    pub table: SampleTable,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn records(n: usize) -> Vec<SampleRecord> {
        (0..n as i64)
            .map(|i| SampleRecord {
                thorax: i,
                x: -i,
                y: 2 * i,
            })
            .collect()
    }

    #[test]
    fn period_rounds_to_nanoseconds() {
        assert_eq!(sample_period(100.0), Some(TimeDelta::milliseconds(10)));
        assert_eq!(sample_period(3.0), Some(TimeDelta::nanoseconds(333_333_333)));
        assert_eq!(sample_period(0.0), None);
        assert_eq!(sample_period(-5.0), None);
        assert_eq!(sample_period(f64::NAN), None);
        assert_eq!(sample_period(f64::INFINITY), None);
        assert_eq!(sample_period(1e12), None);
    }

    #[test]
    fn timestamps_are_evenly_spaced() {
        let table = SampleTable::from_records(start(), 250.0, &records(50)).unwrap();
        assert_eq!(table.len(), 50);
        for pair in table.timestamps().windows(2) {
            assert_eq!(pair[1] - pair[0], TimeDelta::milliseconds(4));
        }
        assert_eq!(table.span(), TimeDelta::milliseconds(4 * 49));
    }

    #[test]
    fn derived_rate_approaches_declared_rate() {
        let table = SampleTable::from_records(start(), 100.0, &records(1001)).unwrap();
        let derived = table.derived_rate().unwrap();
        // n / ((n - 1) / fs) overshoots by a factor n / (n - 1).
        assert!((derived - 100.0 * 1001.0 / 1000.0).abs() < 1e-9);
        assert!((derived - 100.0).abs() / 100.0 < 2e-3);
        assert_eq!(table.sampling_rate(RateSource::Declared), Some(100.0));
    }

    #[test]
    fn derived_rate_needs_two_rows() {
        let table = SampleTable::from_records(start(), 100.0, &records(1)).unwrap();
        assert_eq!(table.derived_rate(), None);
        assert_eq!(table.span(), TimeDelta::zero());
    }

    #[test]
    fn with_thorax_keeps_other_columns() {
        let table = SampleTable::from_records(start(), 10.0, &records(3)).unwrap();
        let replaced = table.with_thorax(vec![0.5, 1.5, 2.5]);
        assert_eq!(replaced.column_f64(Channel::Thorax), vec![0.5, 1.5, 2.5]);
        assert_eq!(replaced.raw_column(Channel::Thorax), &[0, 1, 2]);
        assert_eq!(replaced.column_f64(Channel::X), table.column_f64(Channel::X));
        assert_eq!(replaced.raw_column(Channel::Y), table.raw_column(Channel::Y));
        assert_eq!(replaced.timestamps(), table.timestamps());
        assert_eq!(table.filtered_thorax(), None);
    }

    #[test]
    fn raw_columns_keep_integers_beyond_f64_precision() {
        let big = (1i64 << 53) + 1;
        let record = SampleRecord {
            thorax: big,
            x: i64::MAX,
            y: i64::MIN,
        };
        let table = SampleTable::from_records(start(), 10.0, &[record]).unwrap();
        assert_eq!(table.raw_column(Channel::Thorax), &[big]);
        assert_eq!(table.raw_column(Channel::X), &[i64::MAX]);
        assert_eq!(table.raw_column(Channel::Y), &[i64::MIN]);

        let (_, row) = table.rows().next().unwrap();
        assert_eq!(row[0], Reading::Raw(big));
        assert_eq!(row[0].to_string(), "9007199254740993");
    }

    #[test]
    fn rows_switch_thorax_to_filtered_readings() {
        let table = SampleTable::from_records(start(), 10.0, &records(2)).unwrap();
        let rows: Vec<_> = table.with_thorax(vec![0.25, -0.5]).rows().map(|(_, r)| r).collect();
        assert_eq!(rows[1], [Reading::Filtered(-0.5), Reading::Raw(-1), Reading::Raw(2)]);
        assert_eq!(rows[1][0].to_string(), "-0.5");
    }

    #[test]
    fn elapsed_seconds_start_at_zero() {
        let table = SampleTable::from_records(start(), 4.0, &records(3)).unwrap();
        assert_eq!(table.elapsed_seconds(), vec![0.0, 0.25, 0.5]);
    }
}
