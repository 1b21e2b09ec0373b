use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Channel;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Channel colours
// ---------------------------------------------------------------------------

/// One fixed colour per channel, plus one for the spectrum trace.
#[derive(Debug, Clone)]
pub struct ChannelPalette {
    channels: [Color32; 3],
    spectrum: Color32,
}

impl Default for ChannelPalette {
    fn default() -> Self {
        let colors = generate_palette(Channel::ALL.len() + 1);
        Self {
            channels: [colors[0], colors[1], colors[2]],
            spectrum: colors[3],
        }
    }
}

impl ChannelPalette {
    pub fn color_for(&self, channel: Channel) -> Color32 {
        match channel {
            Channel::Thorax => self.channels[0],
            Channel::X => self.channels[1],
            Channel::Y => self.channels[2],
        }
    }

    pub fn spectrum(&self) -> Color32 {
        self.spectrum
    }
}
