use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use rusty_forecast::pipeline::RunStatus;

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
            let hue = 210.0 + (i as f32 / n as f32) * 360.0;
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
// Chart colours
// ---------------------------------------------------------------------------

/// Colours for the price, forecast and component charts.
#[derive(Debug, Clone)]
pub struct SeriesColors {
    pub history: Color32,
    pub forecast: Color32,
    pub band: Color32,
    /// One colour per component: trend first, then each seasonality.
    components: Vec<Color32>,
}

impl SeriesColors {
    /// Build a scheme with room for `n_components` component lines.
    pub fn new(n_components: usize) -> Self {
        let base = generate_palette(2);
        let forecast = base.first().copied().unwrap_or(Color32::LIGHT_BLUE);
        let [r, g, b, _] = forecast.to_array();
        Self {
            history: base.get(1).copied().unwrap_or(Color32::GRAY),
            forecast,
            band: Color32::from_rgba_unmultiplied(r, g, b, 50),
            components: generate_palette(n_components.max(1)),
        }
    }

    pub fn component(&self, idx: usize) -> Color32 {
        self.components
            .get(idx % self.components.len().max(1))
            .copied()
            .unwrap_or(self.forecast)
    }
}

impl Default for SeriesColors {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Colour of the status line for a run outcome.
pub fn status_color(status: RunStatus) -> Color32 {
    if status.is_error() {
        Color32::RED
    } else if status.is_warning() {
        Color32::from_rgb(230, 160, 30)
    } else {
        Color32::from_rgb(80, 180, 90)
    }
}
