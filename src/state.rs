use std::path::{Path, PathBuf};

use crate::color::ChannelPalette;
use crate::data::layout::RecordLayout;
use crate::data::loader::load_file;
use crate::data::model::{RateSource, Recording, SampleTable};
use crate::dsp::bandpass::BandpassFilter;
use crate::dsp::spectrum::{thorax_spectrum, Spectrum};
use crate::dsp::{run_stages, TableStage};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// What the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Channels,
    Spectrum,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Layout used when opening files.
    pub layout: RecordLayout,

    /// Loaded recording (None until user loads a file).
    pub recording: Option<Recording>,

    /// File the recording came from.
    pub source_path: Option<PathBuf>,

    /// Table actually plotted: the raw table or its filtered copy (cached).
    pub display: Option<SampleTable>,

    /// THORAX spectrum of `display` (cached).
    pub spectrum: Option<Spectrum>,

    pub view: View,

    /// Band-pass settings and whether the stage is applied.
    pub bandpass: BandpassFilter,
    pub bandpass_enabled: bool,

    /// Rate used by the spectrum and the band-pass.
    pub rate_source: RateSource,

    pub palette: ChannelPalette,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RecordLayout::default())
    }
}

impl AppState {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            recording: None,
            source_path: None,
            display: None,
            spectrum: None,
            view: View::default(),
            bandpass: BandpassFilter::default(),
            bandpass_enabled: false,
            rate_source: RateSource::default(),
            palette: ChannelPalette::default(),
            status_message: None,
        }
    }

    /// Load `path` with the current layout; failures end up in `status_message`.
    pub fn open(&mut self, path: &Path) {
        match load_file(path, &self.layout) {
            Ok(recording) => {
                self.set_recording(recording, Some(path.to_path_buf()));
            }
            Err(e) => {
                log::error!("Failed to load file: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Ingest a newly loaded recording and rebuild the derived views.
    pub fn set_recording(&mut self, recording: Recording, path: Option<PathBuf>) {
        self.recording = Some(recording);
        self.source_path = path;
        self.status_message = None;
        self.refresh();
    }

    /// Toggle the band-pass stage.
    pub fn set_bandpass(&mut self, enabled: bool) {
        self.bandpass_enabled = enabled;
        self.status_message = None;
        self.refresh();
    }

    pub fn set_rate_source(&mut self, source: RateSource) {
        self.rate_source = source;
        self.bandpass.rate_source = source;
        self.status_message = None;
        self.refresh();
    }

    /// Recompute `display` and `spectrum` from the recording.
    ///
    /// A failing band-pass is switched off and the raw table is shown instead.
    pub fn refresh(&mut self) {
        let Some(recording) = &self.recording else {
            self.display = None;
            self.spectrum = None;
            return;
        };

        let mut stages: Vec<&dyn TableStage> = Vec::new();
        if self.bandpass_enabled {
            stages.push(&self.bandpass);
        }

        let display = match run_stages(&recording.table, &stages) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Band-pass disabled: {e}");
                self.status_message = Some(format!("Band-pass disabled: {e}"));
                self.bandpass_enabled = false;
                recording.table.clone()
            }
        };

        self.spectrum = match thorax_spectrum(&display, self.rate_source) {
            Ok(spectrum) => Some(spectrum),
            Err(e) => {
                log::warn!("No spectrum: {e}");
                None
            }
        };
        self.display = Some(display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Channel;
    use crate::data::testutil::{scenario_recording, sine_table};

    #[test]
    fn new_recording_fills_display_and_spectrum() {
        let mut state = AppState::default();
        state.set_recording(scenario_recording(), None);

        let display = state.display.as_ref().unwrap();
        assert_eq!(display.raw_column(Channel::Thorax), &[10, 11]);
        assert_eq!(display.filtered_thorax(), None);
        // Two rows 10 ms apart derive to 200 Hz.
        assert_eq!(state.spectrum.as_ref().unwrap().sampling_rate, 200.0);

        state.set_rate_source(RateSource::Declared);
        assert_eq!(state.spectrum.as_ref().unwrap().sampling_rate, 100.0);
    }

    #[test]
    fn failing_bandpass_falls_back_to_raw_table() {
        let mut state = AppState::default();
        state.set_recording(scenario_recording(), None);
        state.set_bandpass(true);

        assert!(!state.bandpass_enabled);
        assert!(state.status_message.as_deref().unwrap().contains("Band-pass disabled"));
        assert_eq!(state.display.as_ref().unwrap(), &state.recording.as_ref().unwrap().table);
    }

    #[test]
    fn bandpass_replaces_displayed_thorax() {
        let mut state = AppState::default();
        let mut recording = scenario_recording();
        recording.table = sine_table(3.0, 10.0, 500, 1000.0);
        state.set_recording(recording, None);
        state.set_bandpass(true);

        assert!(state.bandpass_enabled);
        let raw = &state.recording.as_ref().unwrap().table;
        let shown = state.display.as_ref().unwrap();
        assert_ne!(shown.column_f64(Channel::Thorax), raw.column_f64(Channel::Thorax));
        assert_eq!(shown.raw_column(Channel::X), raw.raw_column(Channel::X));
    }

    #[test]
    fn open_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::default();
        state.open(&dir.path().join("missing.txt"));

        assert!(state.recording.is_none());
        assert!(state.display.is_none());
        assert!(state.status_message.as_deref().unwrap().contains("does not exist"));
    }
}
