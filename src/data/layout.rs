// ---------------------------------------------------------------------------
// RecordLayout – where things live inside a raw dump
// ---------------------------------------------------------------------------

/// Key of the sensor this tool was first written for.
pub const DEFAULT_DEVICE_KEY: &str = "00:07:80:65:E0:11";

/// Token positions of the three channels inside one payload line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelColumns {
    pub thorax: usize,
    pub x: usize,
    pub y: usize,
}

impl Default for ChannelColumns {
    fn default() -> Self {
        // 0 is the sample counter, 1 is a column of zeros.
        Self {
            thorax: 2,
            x: 3,
            y: 4,
        }
    }
}

/// Positional description of a raw dump: which line holds the header, how many
/// characters precede its JSON object, where the payload begins and which
/// tokens carry each channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Device entry to read from the header object.
    pub device_key: String,
    /// Zero-based index of the header line.
    pub header_line: usize,
    /// Characters stripped from the start of the header line (the `# ` marker).
    pub header_prefix_chars: usize,
    /// Zero-based index of the first payload line.
    pub payload_start: usize,
    pub columns: ChannelColumns,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::for_device(DEFAULT_DEVICE_KEY)
    }
}

impl RecordLayout {
    /// The single-device layout: title, header, separator, then records.
    pub fn for_device(device_key: impl Into<String>) -> Self {
        Self {
            device_key: device_key.into(),
            header_line: 1,
            header_prefix_chars: 2,
            payload_start: 3,
            columns: ChannelColumns::default(),
        }
    }

    /// Smallest number of whitespace tokens a payload line may carry.
    pub fn min_tokens(&self) -> usize {
        let c = self.columns;
        c.thorax.max(c.x).max(c.y) + 1
    }
}
