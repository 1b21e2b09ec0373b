use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::{RateSource, Recording};
use crate::state::{AppState, View};

// ---------------------------------------------------------------------------
// Left side panel – header summary
// ---------------------------------------------------------------------------

/// Render the left panel with the recording's header fields.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Recording");
    ui.separator();

    let Some(recording) = &state.recording else {
        ui.label("No recording loaded.");
        return;
    };

    if let Some(path) = &state.source_path {
        ui.label(RichText::new(path.display().to_string()).weak());
        ui.add_space(4.0);
    }

    let rows = summary_rows(recording);

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .column(Column::auto())
                .column(Column::remainder())
                .header(20.0, |mut header| {
                    header.col(|ui| {
                        ui.strong("Field");
                    });
                    header.col(|ui| {
                        ui.strong("Value");
                    });
                })
                .body(|mut body| {
                    for (key, value) in &rows {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(key);
                            });
                            row.col(|ui| {
                                ui.label(value);
                            });
                        });
                    }
                });
        });
}

/// Field/value pairs shown in the side panel: typed fields first, then the
/// remaining entries of the device's header record.
fn summary_rows(recording: &Recording) -> Vec<(String, String)> {
    let device = &recording.header.device;
    let table = &recording.table;

    let mut rows = vec![
        ("device".to_string(), device.key.clone()),
        ("sampling rate".to_string(), format!("{} Hz", device.sampling_rate)),
        ("date".to_string(), device.date.clone()),
        ("time".to_string(), device.time.clone()),
        (
            "period".to_string(),
            format!("{:.3} ms", table.period().num_nanoseconds().unwrap_or(0) as f64 / 1e6),
        ),
        ("samples".to_string(), table.len().to_string()),
        (
            "duration".to_string(),
            format!("{:.3} s", table.span().num_milliseconds() as f64 / 1000.0),
        ),
    ];
    if let Some(rate) = table.derived_rate() {
        rows.push(("derived rate".to_string(), format!("{rate:.4} Hz")));
    }

    if let Some(entry) = recording.header.entries.get(&device.key).and_then(|v| v.as_object()) {
        for (key, value) in entry {
            if matches!(key.as_str(), "sampling rate" | "date" | "time") {
                continue;
            }
            rows.push((key.clone(), value.to_string()));
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if ui
            .selectable_label(state.view == View::Channels, "Channels")
            .clicked()
        {
            state.view = View::Channels;
        }
        if ui
            .selectable_label(state.view == View::Spectrum, "Spectrum")
            .clicked()
        {
            state.view = View::Spectrum;
        }

        ui.separator();

        if ui
            .selectable_label(state.bandpass_enabled, "Band-pass")
            .on_hover_text(format!(
                "{}–{} Hz, order {}",
                state.bandpass.low_hz, state.bandpass.high_hz, state.bandpass.order
            ))
            .clicked()
        {
            let enabled = !state.bandpass_enabled;
            state.set_bandpass(enabled);
        }

        let current = state.rate_source;
        egui::ComboBox::from_id_salt("rate_source")
            .selected_text(format!("{current:?} rate"))
            .show_ui(ui, |ui: &mut Ui| {
                for source in [RateSource::Derived, RateSource::Declared] {
                    if ui
                        .selectable_label(current == source, format!("{source:?}"))
                        .clicked()
                    {
                        state.set_rate_source(source);
                    }
                }
            });

        ui.separator();

        if let Some(table) = &state.display {
            ui.label(format!("{} samples", table.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open raw recording")
        .add_filter("Raw recording", &["txt"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testutil::scenario_recording;

    #[test]
    fn summary_lists_typed_fields_first() {
        let rows = summary_rows(&scenario_recording());
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["device", "sampling rate", "date", "time", "period", "samples", "duration", "derived rate"]
        );
        assert_eq!(rows[1].1, "100 Hz");
        assert_eq!(rows[4].1, "10.000 ms");
        assert_eq!(rows[6].1, "0.010 s");
    }
}
