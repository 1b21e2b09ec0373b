/// Data layer: layout, parsing, core types and export.
///
/// Architecture:
/// ```text
///  recording.txt
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  path checks, whole-file read
///   └──────────┘
///        │ lines
///        ▼
///   ┌──────────┐
///   │  parser   │  header JSON + fixed columns (per RecordLayout)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────┐
///   │ RawHeader/SampleTable │  timestamps synthesized from the rate
///   └──────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  csv / parquet / json body
///   └──────────┘
/// ```

pub mod export;
pub mod layout;
pub mod loader;
pub mod model;
pub mod parser;
