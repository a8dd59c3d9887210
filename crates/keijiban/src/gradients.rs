use serde::{Deserialize, Serialize};

use crate::model::HexColor;

/// A saved primary/accent color pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradientPreset {
    pub primary: HexColor,
    pub accent: HexColor,
}

impl GradientPreset {
    pub fn new(primary: HexColor, accent: HexColor) -> Self {
        Self { primary, accent }
    }

    /// CSS background used for the preset swatch.
    pub fn css_background(&self) -> String {
        format!(
            "linear-gradient(135deg, {} 0%, {} 100%)",
            self.primary, self.accent
        )
    }
}

/// Saved gradient presets, kept in insertion order with no duplicate pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradientPresets {
    presets: Vec<GradientPreset>,
}

impl GradientPresets {
    pub fn builtin() -> Self {
        let pairs = [
            ("#D32F2F", "#FF5252"),
            ("#1976D2", "#42A5F5"),
            ("#388E3C", "#66BB6A"),
            ("#7B1FA2", "#AB47BC"),
            ("#FBC02D", "#FFF176"),
        ];
        let presets = pairs
            .iter()
            .filter_map(|(p, a)| Some(GradientPreset::new(HexColor::parse(p)?, HexColor::parse(a)?)))
            .collect();
        Self { presets }
    }

    pub fn from_presets(presets: impl IntoIterator<Item = GradientPreset>) -> Self {
        let mut set = Self { presets: Vec::new() };
        for preset in presets {
            set.save(preset);
        }
        set
    }

    pub fn presets(&self) -> &[GradientPreset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn contains(&self, preset: &GradientPreset) -> bool {
        self.presets.contains(preset)
    }

    /// Saving a pair that is already present does nothing.
    pub fn save(&mut self, preset: GradientPreset) -> bool {
        if self.contains(&preset) {
            return false;
        }
        self.presets.push(preset);
        true
    }

    /// Removes every preset with exactly this pair.
    pub fn remove(&mut self, preset: &GradientPreset) -> usize {
        let before = self.presets.len();
        self.presets.retain(|p| p != preset);
        before - self.presets.len()
    }

    /// Whether the swatch for `preset` is highlighted for the given colors.
    pub fn is_active(preset: &GradientPreset, primary: &HexColor, accent: &HexColor) -> bool {
        preset.primary.eq_ignore_case(primary.as_str()) && preset.accent.eq_ignore_case(accent.as_str())
    }
}

impl Default for GradientPresets {
    fn default() -> Self {
        Self::builtin()
    }
}
