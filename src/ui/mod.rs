//! egui rendering: toolbar and header panel, channel and spectrum plots.

pub mod panels;
pub mod plot;
