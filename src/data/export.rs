use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::model::{Channel, Reading, Recording, SampleTable};

/// Lossless text form of a row timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Output formats for a decoded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Parquet,
    /// Request body: header plus one object per sample.
    Json,
}

impl ExportFormat {
    /// Guess the format from the output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(ExportFormat::Csv),
            "parquet" | "pq" => Some(ExportFormat::Parquet),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write `table` (with the header of `recording`) to `path`.
///
/// `table` is passed separately so a filtered copy can be exported.
pub fn export(recording: &Recording, table: &SampleTable, path: &Path, format: ExportFormat) -> Result<()> {
    let written = match format {
        ExportFormat::Csv => write_csv(table, path),
        ExportFormat::Parquet => write_parquet(table, path),
        ExportFormat::Json => write_json(recording, table, path),
    };
    written.with_context(|| format!("exporting to {}", path.display()))?;

    log::info!("Wrote {} rows to {} as {format:?}", table.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Columns: `timestamp,THORAX,X,Y`.
fn write_csv(table: &SampleTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;

    let mut header = vec!["timestamp"];
    header.extend(Channel::ALL.iter().map(|c| c.label()));
    writer.write_record(&header).context("writing CSV header")?;

    for (ts, values) in table.rows() {
        let mut record = vec![ts.format(TIMESTAMP_FORMAT).to_string()];
        record.extend(values.iter().map(|v| v.to_string()));
        writer.write_record(&record).context("writing CSV row")?;
    }

    writer.flush().context("flushing CSV file")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Schema: `timestamp` (ns, no zone) followed by one Int64 column per channel.
/// A filtered THORAX is written as Float64.
fn write_parquet(table: &SampleTable, path: &Path) -> Result<()> {
    let nanos = table
        .timestamps()
        .iter()
        .map(|ts| ts.and_utc().timestamp_nanos_opt())
        .collect::<Option<Vec<i64>>>();
    let Some(nanos) = nanos else {
        bail!("timestamps fall outside the nanosecond range");
    };

    let mut fields = vec![Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Nanosecond, None),
        false,
    )];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(TimestampNanosecondArray::from(nanos))];
    for channel in Channel::ALL {
        let column: ArrayRef = match (channel, table.filtered_thorax()) {
            (Channel::Thorax, Some(filtered)) => Arc::new(Float64Array::from(filtered.to_vec())),
            _ => Arc::new(Int64Array::from(table.raw_column(channel).to_vec())),
        };
        fields.push(Field::new(channel.label(), column.data_type().clone(), false));
        columns.push(column);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON request body
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonBody<'a> {
    device: &'a str,
    sampling_rate: f64,
    header: &'a Map<String, JsonValue>,
    samples: Vec<JsonSample>,
}

#[derive(Serialize)]
struct JsonSample {
    timestamp: String,
    #[serde(rename = "THORAX")]
    thorax: Reading,
    #[serde(rename = "X")]
    x: Reading,
    #[serde(rename = "Y")]
    y: Reading,
}

fn write_json(recording: &Recording, table: &SampleTable, path: &Path) -> Result<()> {
    let body = JsonBody {
        device: &recording.header.device.key,
        sampling_rate: recording.header.device.sampling_rate,
        header: &recording.header.entries,
        samples: table
            .rows()
            .map(|(ts, [thorax, x, y])| JsonSample {
                timestamp: ts.format(TIMESTAMP_FORMAT).to_string(),
                thorax,
                x,
                y,
            })
            .collect(),
    };

    let mut out = BufWriter::new(File::create(path).context("creating JSON file")?);
    serde_json::to_writer(&mut out, &body).context("serializing JSON body")?;
    out.flush().context("flushing JSON file")?;
    Ok(())
}
