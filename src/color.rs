use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

/// Hue step between consecutive colours, in degrees (the golden angle).
const HUE_STEP: f32 = 137.507_77;

/// Lightness bands cycled through so neighbours on the hue wheel still differ.
const LIGHTNESS: [f32; 3] = [0.55, 0.42, 0.68];

/// `n` distinct colours. Hues advance by the golden angle, so a few dozen
/// sensors stay distinguishable and the first colours never change as `n`
/// grows.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 * HUE_STEP) % 360.0;
            let lightness = LIGHTNESS[i % LIGHTNESS.len()];
            let rgb: Srgb = Hsl::new(hue, 0.7, lightness).into_color();
            let [r, g, b] = [rgb.red, rgb.green, rgb.blue].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            Color32::from_rgb(r, g, b)
        })
        .collect()
}

/// Stable colour per sensor name, built from the root dataset so a sensor
/// keeps its colour while filters change.
#[derive(Debug, Clone)]
pub struct ColorMap {
    by_sensor: BTreeMap<String, Color32>,
}

impl ColorMap {
    pub fn new<S: AsRef<str>>(sensors: &[S]) -> Self {
        let by_sensor = sensors
            .iter()
            .map(|s| s.as_ref().to_string())
            .zip(generate_palette(sensors.len()))
            .collect();
        ColorMap { by_sensor }
    }

    /// Unknown sensors (and unsplit series) are drawn light blue.
    pub fn color_for(&self, sensor: &str) -> Color32 {
        self.by_sensor
            .get(sensor)
            .copied()
            .unwrap_or(Color32::LIGHT_BLUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct_and_prefix_stable() {
        let colors = generate_palette(12);
        assert_eq!(colors.len(), 12);
        for (i, a) in colors.iter().enumerate() {
            assert!(colors[i + 1..].iter().all(|b| a != b));
        }
        assert_eq!(generate_palette(3), colors[..3]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_unknown_sensor_uses_default() {
        let map = ColorMap::new(&["Bourke St", "Town Hall (West)"]);
        assert_ne!(map.color_for("Bourke St"), map.color_for("Town Hall (West)"));
        assert_eq!(map.color_for("Nowhere"), Color32::LIGHT_BLUE);
    }
}
