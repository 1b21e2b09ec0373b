use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::layout::RecordLayout;
use super::model::Recording;
use super::parser::{parse, ParseError};

/// Only plain-text dumps are accepted.
pub const RAW_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("the path {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("the file {} is not a .txt file", .0.display())]
    InvalidExtension(PathBuf),

    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Check the path, read the whole file and decode it.
pub fn load_file(path: &Path, layout: &RecordLayout) -> Result<Recording, LoadError> {
    validate_path(path)?;

    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let lines: Vec<&str> = text.lines().collect();

    let (header, table) = parse(&lines, layout)?;
    log::info!(
        "Loaded {} samples from {} ({} Hz declared)",
        table.len(),
        path.display(),
        header.device.sampling_rate
    );

    Ok(Recording { header, table })
}

/// The path must name an existing file with the `.txt` extension.
///
/// Existence is checked first, so a missing `.csv` reports `FileNotFound`.
pub fn validate_path(path: &Path) -> Result<(), LoadError> {
    if !path.is_file() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }
    if path.extension().and_then(|e| e.to_str()) != Some(RAW_EXTENSION) {
        return Err(LoadError::InvalidExtension(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::Channel;

    const SAMPLE: &str = "# OpenSignals Text File Format\n\
        # {\"00:07:80:65:E0:11\": {\"sampling rate\": 100, \"date\": \"2024-01-01\", \"time\": \"00:00:00\"}}\n\
        # EndOfHeader\n\
        0 0 10 20 30\n\
        1 0 11 21 31\n";

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_a_valid_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "recording.txt", SAMPLE);

        let recording = load_file(&path, &RecordLayout::default()).unwrap();
        assert_eq!(recording.table.len(), 2);
        assert_eq!(recording.table.raw_column(Channel::Y), &[30, 31]);
    }

    #[test]
    fn missing_file_is_reported_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        let err = load_file(&path, &RecordLayout::default()).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(p) if p == path));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_path(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn csv_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // Contents are valid, so only the extension can fail.
        let path = write_file(&dir, "recording.csv", SAMPLE);

        let err = load_file(&path, &RecordLayout::default()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidExtension(_)));
    }

    #[test]
    fn parse_errors_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.txt", &SAMPLE.replace("1 0 11 21 31", "1 0 11 21"));

        let err = load_file(&path, &RecordLayout::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parse(ParseError::MalformedRecord { .. })));
    }
}
