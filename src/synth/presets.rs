use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{param, Color, EffectKind, EffectParams};

/// A named default effect applied to fixtures the name rules leave on the
/// steady-on default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub effect: EffectKind,
    #[serde(default)]
    pub params: EffectParams,
    /// Fixed bar count for bar-style effects. Fixtures with a known string
    /// count still use their own.
    #[serde(default)]
    pub bar_count: Option<u32>,
}

impl Preset {
    pub fn new(effect: EffectKind, params: EffectParams) -> Self {
        Self {
            effect,
            params,
            bar_count: None,
        }
    }
}

/// Name heuristic: a fixture whose lower-cased name contains any of the
/// listed fragments gets `effect` with `params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRule {
    pub contains: Vec<String>,
    pub effect: EffectKind,
    #[serde(default)]
    pub params: EffectParams,
}

impl NameRule {
    fn new(contains: &[&str], effect: EffectKind, params: EffectParams) -> Self {
        Self {
            contains: contains.iter().map(|s| (*s).to_string()).collect(),
            effect,
            params,
        }
    }

    pub fn matches(&self, lowered_name: &str) -> bool {
        self.contains
            .iter()
            .any(|c| lowered_name.contains(&c.to_lowercase()))
    }
}

pub const DEFAULT_PRESET: &str = "solid_pulse";

/// Style catalogue and synthesis tunables. Injected into the synthesizer;
/// every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleSettings {
    pub presets: IndexMap<String, Preset>,
    /// Used when a request names a preset that is not in the catalogue.
    pub default_preset: String,
    /// Built-in rotation when a request brings no usable palette.
    pub palette: Vec<Color>,
    pub accent_color: Color,
    /// Effect forced at the start of a new section.
    pub impact_effect: EffectKind,
    pub heavy_effects: Vec<EffectKind>,
    /// Fixtures with fewer nodes than this never get a heavy effect.
    pub small_model_nodes: u32,
    /// Downbeat cadence in beats when no downbeats were detected.
    pub downbeat_every: usize,
    /// Number of beats after a section boundary that use `impact_effect`.
    pub section_impact_beats: usize,
    /// Extension of accented spans; capped at `MAX_ACCENT_PAD_MS`.
    pub accent_pad_ms: u64,
    pub coincidence_epsilon_ms: u64,
    pub default_bar_count: u32,
    /// Checked in order; first match wins. No match means steady-on.
    pub name_rules: Vec<NameRule>,
}

impl Default for StyleSettings {
    fn default() -> Self {
        let mut presets = IndexMap::new();
        presets.insert(
            DEFAULT_PRESET.to_string(),
            Preset::new(EffectKind::On, EffectParams::new().set(param::COLOR, "#FFFFFF")),
        );
        presets.insert(
            "bars".to_string(),
            Preset::new(
                EffectKind::Bars,
                EffectParams::new().set(param::DIRECTION, "LeftRight"),
            ),
        );
        presets.insert(
            "meteor".to_string(),
            Preset::new(
                EffectKind::Meteor,
                EffectParams::new()
                    .set(param::COUNT, "10")
                    .set(param::SPEED, "25")
                    .set(param::COLOR, "#00FFFF"),
            ),
        );

        Self {
            presets,
            default_preset: DEFAULT_PRESET.to_string(),
            palette: vec![
                Color::rgb(0xFF, 0x00, 0x00),
                Color::rgb(0x00, 0xFF, 0x00),
                Color::rgb(0x00, 0x00, 0xFF),
                Color::rgb(0xFF, 0xA5, 0x00),
                Color::rgb(0x80, 0x00, 0x80),
                Color::rgb(0x00, 0xFF, 0xFF),
            ],
            accent_color: Color::WHITE,
            impact_effect: EffectKind::Shockwave,
            heavy_effects: vec![EffectKind::Meteor, EffectKind::Spirals, EffectKind::Shockwave],
            small_model_nodes: 10,
            downbeat_every: 4,
            section_impact_beats: 4,
            accent_pad_ms: 40,
            coincidence_epsilon_ms: 20,
            default_bar_count: 6,
            name_rules: vec![
                NameRule::new(&["tree"], EffectKind::Spirals, EffectParams::new().set(param::ARMS, "3")),
                NameRule::new(
                    &["matrix", "panel"],
                    EffectKind::Bars,
                    EffectParams::new().set(param::DIRECTION, "LeftRight"),
                ),
                NameRule::new(&["arch"], EffectKind::Waves, EffectParams::new()),
            ],
        }
    }
}

impl StyleSettings {
    /// Look up a preset, falling back to the default preset for unknown ids.
    /// The returned id is the one actually used.
    pub fn preset(&self, id: &str) -> Option<(&str, &Preset)> {
        self.presets
            .get_key_value(id)
            .or_else(|| self.presets.get_key_value(self.default_preset.as_str()))
            .map(|(k, p)| (k.as_str(), p))
    }

    pub fn is_heavy(&self, effect: &EffectKind) -> bool {
        self.heavy_effects.contains(effect)
    }
}
