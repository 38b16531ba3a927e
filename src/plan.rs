//! House-style plans: declarative targets + recipes turned into a flat list
//! of time-bounded intents for the synthesizer's intent mode.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::read_json;
use crate::error::SynthError;
use crate::layout::NameMatcher;
use crate::model::{param, Color, EffectKind, EffectParams, LayoutTree, Timeline};
use crate::synth::Palette;

/// A declarative instruction binding an effect to a layout group over a time
/// window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// Style-group label from the plan
    pub target_group_label: String,
    /// Layout group (or fixture) the label resolved to
    pub resolved_group_name: String,
    #[serde(rename = "effectType")]
    pub effect: EffectKind,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(default)]
    pub parameters: EffectParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipe {
    /// Short hit on every beat.
    Metronome,
    /// Spirals from every bar start.
    BarSpiral,
    /// Shockwave on every downbeat.
    DownbeatShockwave,
    /// One wash per section, cycling the palette.
    SectionWash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTarget {
    pub label: String,
    pub recipe: Recipe,
    /// Replaces the recipe's effect type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanMeta {
    pub palette: Vec<String>,
}

impl Default for PlanMeta {
    fn default() -> Self {
        Self {
            palette: vec![Color::WHITE.to_hex()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanGlobal {
    #[serde(alias = "fade_default")]
    pub fade_default: f64,
}

impl Default for PlanGlobal {
    fn default() -> Self {
        Self { fade_default: 0.18 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousePlan {
    pub meta: PlanMeta,
    pub global: PlanGlobal,
    pub targets: Vec<PlanTarget>,
}

impl HousePlan {
    /// Outline metronome, focal tree spirals and spinner shockwaves.
    pub fn starter() -> Self {
        let target = |label: &str, recipe| PlanTarget {
            label: label.to_string(),
            recipe,
            effect: None,
        };
        Self {
            targets: vec![
                target("Metronome_Outlines", Recipe::Metronome),
                target("Focal_Tree", Recipe::BarSpiral),
                target("Focal_Spinners", Recipe::DownbeatShockwave),
            ],
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, SynthError> {
        read_json(path)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.label.as_str()).collect()
    }
}

const METRONOME_MAX_HIT: f64 = 0.25;
const SPIRAL_MIN_LENGTH: f64 = 1.5;
const SHOCKWAVE_LENGTH: f64 = 0.35;
const BEATS_PER_BAR: usize = 4;

#[derive(Default)]
pub struct IntentPlanner {
    matcher: NameMatcher,
}

impl IntentPlanner {
    pub fn new(matcher: NameMatcher) -> Self {
        Self { matcher }
    }

    /// Resolve plan labels against the tree's group names.
    pub fn map_targets(&self, plan: &HousePlan, tree: &LayoutTree) -> IndexMap<String, String> {
        let mapping = self.matcher.map_style_groups(&plan.labels(), &tree.group_names());
        for label in plan.labels() {
            if !mapping.contains_key(label) {
                warn!(label, "plan target has no matching layout group");
            }
        }
        mapping
    }

    /// Expand every mapped target into intents, in plan order. Labels absent
    /// from `mapping` produce nothing.
    pub fn build_intents(
        &self,
        plan: &HousePlan,
        timeline: &Timeline,
        mapping: &IndexMap<String, String>,
    ) -> Vec<Intent> {
        let palette = Palette::resolve(Some(plan.meta.palette.as_slice()), &[Color::WHITE]);
        let duration = timeline.duration_seconds();
        let period = timeline.beat_period();
        let mut intents = Vec::new();

        for target in &plan.targets {
            let Some(group) = mapping.get(&target.label) else {
                continue;
            };
            let mut push = |effect: EffectKind, start: f64, end: f64, parameters: EffectParams| {
                let end = end.min(duration);
                if end > start {
                    intents.push(Intent {
                        target_group_label: target.label.clone(),
                        resolved_group_name: group.clone(),
                        effect: target.effect.clone().unwrap_or(effect),
                        start_seconds: start,
                        end_seconds: end,
                        parameters,
                    });
                }
            };

            match target.recipe {
                Recipe::Metronome => {
                    let hit = METRONOME_MAX_HIT.min(period);
                    let params = EffectParams::new()
                        .set(param::COLOR, palette.first().to_hex())
                        .set(param::FADE, format!("{:.2}", plan.global.fade_default));
                    for &beat in timeline.beat_times() {
                        push(EffectKind::SingleStrand, beat, beat + hit, params.clone());
                    }
                }
                Recipe::BarSpiral => {
                    let length = SPIRAL_MIN_LENGTH.max(period * 4.0);
                    for (i, bar) in timeline.bar_starts(BEATS_PER_BAR).into_iter().enumerate() {
                        #[allow(clippy::cast_precision_loss)]
                        let rotation = 0.4 + 0.05 * (i % 4) as f64;
                        let params = EffectParams::new()
                            .set(param::ROTATION, format!("{rotation:.2}"))
                            .set(param::ARMS, "3");
                        push(EffectKind::Spirals, bar, bar + length, params);
                    }
                }
                Recipe::DownbeatShockwave => {
                    for &down in timeline.downbeat_times() {
                        let params = EffectParams::new().set(param::BRIGHTNESS, "0.90");
                        push(EffectKind::Shockwave, down, down + SHOCKWAVE_LENGTH, params);
                    }
                }
                Recipe::SectionWash => {
                    let sections = match timeline.section_times() {
                        [] => vec![0.0],
                        s => s.to_vec(),
                    };
                    for (i, &start) in sections.iter().enumerate() {
                        let end = sections.get(i + 1).copied().unwrap_or(duration);
                        let mut params = EffectParams::new();
                        params.set_color(palette.at(i));
                        push(EffectKind::ColorWash, start, end, params);
                    }
                }
            }
        }
        debug!(intents = intents.len(), "intents planned");
        intents
    }

    /// Map targets against `tree` and expand them.
    pub fn plan_for_tree(&self, plan: &HousePlan, timeline: &Timeline, tree: &LayoutTree) -> Vec<Intent> {
        let mapping = self.map_targets(plan, tree);
        self.build_intents(plan, timeline, &mapping)
    }
}
