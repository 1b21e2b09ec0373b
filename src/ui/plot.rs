use chrono::{NaiveDateTime, TimeDelta};
use eframe::egui::{self, Ui};
use egui_plot::{Line, Plot, PlotPoints};

use crate::data::model::Channel;
use crate::dsp::spectrum::DISPLAY_MAX_HZ;
use crate::state::{AppState, View};

/// Plots in the channel view share this id so panning one pans all three.
const CHANNEL_GROUP: &str = "channel_axes";

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the central panel for the active view.
pub fn central_plot(ui: &mut Ui, state: &AppState) {
    if state.display.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a recording to view it  (File → Open…)");
        });
        return;
    }

    match state.view {
        View::Channels => channel_plots(ui, state),
        View::Spectrum => spectrum_plot(ui, state),
    }
}

// ---------------------------------------------------------------------------
// Stacked channel plots
// ---------------------------------------------------------------------------

/// Three stacked rows (THORAX, X, Y) on one linked time axis, no legend.
fn channel_plots(ui: &mut Ui, state: &AppState) {
    let Some(table) = &state.display else {
        return;
    };
    let Some(start) = table.start() else {
        return;
    };

    let elapsed = table.elapsed_seconds();
    let row_height = (ui.available_height() / Channel::ALL.len() as f32 - 24.0).max(80.0);

    for (row, channel) in Channel::ALL.into_iter().enumerate() {
        ui.strong(channel.label());

        let points: PlotPoints = elapsed
            .iter()
            .zip(table.column_f64(channel))
            .map(|(&t, v)| [t, v])
            .collect();

        let is_last = row + 1 == Channel::ALL.len();
        Plot::new(("channel_plot", channel.label()))
            .height(row_height)
            .link_axis(CHANNEL_GROUP, [true, false])
            .link_cursor(CHANNEL_GROUP, [true, false])
            .show_axes([is_last, true])
            .x_axis_formatter(move |mark, _range| clock_label(start, mark.value))
            .allow_boxed_zoom(true)
            .allow_drag(true)
            .allow_scroll(true)
            .allow_zoom(true)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(points)
                        .color(state.palette.color_for(channel))
                        .width(1.5),
                );
            });
    }
}

/// Wall-clock label for an offset of `seconds` from `start`.
fn clock_label(start: NaiveDateTime, seconds: f64) -> String {
    let offset = TimeDelta::nanoseconds((seconds * 1e9).round() as i64);
    match start.checked_add_signed(offset) {
        Some(ts) => ts.format("%H:%M:%S%.3f").to_string(),
        None => format!("{seconds:.3} s"),
    }
}

// ---------------------------------------------------------------------------
// Spectrum plot
// ---------------------------------------------------------------------------

fn spectrum_plot(ui: &mut Ui, state: &AppState) {
    let Some(spectrum) = &state.spectrum else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Not enough samples for a spectrum");
        });
        return;
    };

    ui.strong(format!(
        "Fourier transform of THORAX  ({:.4} Hz, {:?} rate)",
        spectrum.sampling_rate, state.rate_source
    ));

    let points: PlotPoints = spectrum.display_band().map(|(f, m)| [f, m]).collect();

    Plot::new("spectrum_plot")
        .x_axis_label("Frequency (Hz)")
        .y_axis_label("Amplitude")
        .include_x(0.0)
        .include_x(DISPLAY_MAX_HZ)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(points)
                    .color(state.palette.spectrum())
                    .width(1.5),
            );
        });

    ui.add_space(2.0);
    if let Some((freq, _)) = spectrum.dominant(DISPLAY_MAX_HZ) {
        ui.label(
            egui::RichText::new(format!(
                "Dominant: {freq:.3} Hz  ({:.1} per minute)",
                freq * 60.0
            ))
            .weak(),
        );
    }
}
