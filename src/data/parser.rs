use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::layout::RecordLayout;
use super::model::{sample_period, DeviceInfo, RawHeader, SampleRecord, SampleTable};

/// Header key holding the sampling rate in Hz.
const SAMPLING_RATE_KEY: &str = "sampling rate";
const DATE_KEY: &str = "date";
const TIME_KEY: &str = "time";

/// Accepted forms of the header `date`, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
/// Accepted form of the header `time`; fractional seconds are optional.
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Failures while decoding the lines of a raw dump.
///
/// Line numbers are 1-based, as an editor shows them.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed header on line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("invalid sampling rate: {0}")]
    InvalidSamplingRate(String),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Decode a raw dump into its header and time-indexed table.
///
/// Expected layout (offsets come from `layout`):
///
/// ```text
/// line 0   free-form title, ignored
/// line 1   "# " + {"<device>": {"sampling rate": 100, "date": "...", "time": "..."}}
/// line 2   separator, ignored
/// line 3+  <index> <zero> <THORAX> <X> <Y> [extra tokens ignored]
/// ```
///
/// `date` is year-month-day separated by `-`, `/` or `.` (`2024-01-01`,
/// `2024/01/01`); `time` is `HH:MM:SS` with optional fractional seconds.
/// Other forms are a `MalformedHeader`.
///
/// Any malformed line aborts the whole parse.
pub fn parse<S: AsRef<str>>(
    lines: &[S],
    layout: &RecordLayout,
) -> Result<(RawHeader, SampleTable), ParseError> {
    let header = parse_header(lines, layout)?;

    if lines.len() <= layout.payload_start {
        return Err(ParseError::MalformedRecord {
            line: layout.payload_start + 1,
            reason: "no payload records".to_string(),
        });
    }

    let records = lines[layout.payload_start..]
        .iter()
        .enumerate()
        .map(|(offset, line)| {
            parse_record(line.as_ref(), layout.payload_start + offset, layout)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let table = SampleTable::from_records(header.device.start, header.device.sampling_rate, &records)?;

    log::debug!(
        "Decoded {} records for {} at {} Hz starting {}",
        table.len(),
        header.device.key,
        header.device.sampling_rate,
        header.device.start
    );

    Ok((header, table))
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn parse_header<S: AsRef<str>>(lines: &[S], layout: &RecordLayout) -> Result<RawHeader, ParseError> {
    let line_no = layout.header_line + 1;
    let malformed = |reason: String| ParseError::MalformedHeader {
        line: line_no,
        reason,
    };

    let line: &str = lines
        .get(layout.header_line)
        .map(|l| l.as_ref())
        .ok_or_else(|| malformed("file ends before the header line".to_string()))?;

    // The prefix is counted in characters, not bytes.
    let body = line
        .char_indices()
        .nth(layout.header_prefix_chars)
        .map(|(i, _)| &line[i..])
        .ok_or_else(|| malformed("line is too short to hold a header".to_string()))?;

    let root: JsonValue = serde_json::from_str(body.trim_end())
        .map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    let entries: Map<String, JsonValue> = match root {
        JsonValue::Object(map) => map,
        other => return Err(malformed(format!("expected a JSON object, got {other}"))),
    };

    let entry = entries
        .get(&layout.device_key)
        .ok_or_else(|| malformed(format!("no entry for device {}", layout.device_key)))?
        .as_object()
        .ok_or_else(|| malformed(format!("entry for device {} is not an object", layout.device_key)))?;

    let sampling_rate = entry
        .get(SAMPLING_RATE_KEY)
        .ok_or_else(|| ParseError::InvalidSamplingRate(format!("'{SAMPLING_RATE_KEY}' is missing")))?;
    let sampling_rate = sampling_rate.as_f64().ok_or_else(|| {
        ParseError::InvalidSamplingRate(format!("'{SAMPLING_RATE_KEY}' is not a number: {sampling_rate}"))
    })?;
    if sample_period(sampling_rate).is_none() {
        return Err(ParseError::InvalidSamplingRate(format!(
            "{sampling_rate} Hz, expected a positive rate"
        )));
    }

    let date = json_str(entry, DATE_KEY).ok_or_else(|| malformed(format!("missing '{DATE_KEY}' string")))?;
    let time = json_str(entry, TIME_KEY).ok_or_else(|| malformed(format!("missing '{TIME_KEY}' string")))?;
    let start = parse_start(date, time).map_err(malformed)?;

    Ok(RawHeader {
        device: DeviceInfo {
            key: layout.device_key.clone(),
            sampling_rate,
            date: date.to_string(),
            time: time.to_string(),
            start,
        },
        entries,
    })
}

fn json_str<'a>(entry: &'a Map<String, JsonValue>, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(JsonValue::as_str)
}

/// Combine the header's `date` and `time` into the instant of the first sample.
fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime, String> {
    let day = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date.trim(), fmt).ok())
        .ok_or_else(|| format!("date '{date}' is not year-month-day"))?;
    let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
        .map_err(|e| format!("time '{time}': {e}"))?;
    Ok(day.and_time(time))
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

fn parse_record(line: &str, index: usize, layout: &RecordLayout) -> Result<SampleRecord, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let min = layout.min_tokens();
    if tokens.len() < min {
        return Err(ParseError::MalformedRecord {
            line: index + 1,
            reason: format!("expected at least {min} tokens, found {}", tokens.len()),
        });
    }

    let field = |pos: usize, name: &str| -> Result<i64, ParseError> {
        tokens[pos].parse::<i64>().map_err(|_| ParseError::MalformedRecord {
            line: index + 1,
            reason: format!("{name} token '{}' is not an integer", tokens[pos]),
        })
    };

    let cols = layout.columns;
    Ok(SampleRecord {
        thorax: field(cols.thorax, "THORAX")?,
        x: field(cols.x, "X")?,
        y: field(cols.y, "Y")?,
    })
}
