//! Effect timeline synthesis.
//!
//! Maps a resolved layout tree and a normalized timeline onto one gap-free
//! span sequence per fixture. Two modes:
//!
//! - preset mode: every fixture gets one span per beat interval, chosen by
//!   name rules, the active preset, downbeat accents and section impacts
//! - intent mode: only fixtures under an intent's group get spans, clipped
//!   to the intent's window
//!
//! Both are pure functions of their inputs.

pub mod palette;
pub mod presets;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SynthError;
use crate::model::timeline::{TRACK_BEATS, TRACK_DOWNBEATS, TRACK_SECTIONS};
use crate::model::{
    param, seconds_to_ms, EffectKind, EffectParams, EffectSpan, Fixture, FixtureTimeline,
    LayoutTree, SynthesizedSequence, Timeline, TimingTrack,
};
use crate::plan::Intent;
use crate::timing::TimingOptions;

pub use palette::Palette;
pub use presets::{NameRule, Preset, StyleSettings, DEFAULT_PRESET};

/// Per-request generation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Active style preset. None leaves default fixtures on steady-on.
    pub preset_id: Option<String>,
    /// `#RRGGBB` entries; malformed ones are dropped.
    pub palette: Option<Vec<String>>,
    #[serde(flatten)]
    pub timing: TimingOptions,
    /// Fixture or group names whose default fixtures get the bar-style effect.
    pub preferred: Vec<String>,
    /// When non-empty, switches to intent mode.
    pub intents: Option<Vec<Intent>>,
}

/// Upper bound on the accent pad, whatever the config says.
pub const MAX_ACCENT_PAD_MS: u64 = 50;

/// One beat interval of the timeline, before any accent padding.
#[derive(Debug, Clone)]
struct Interval {
    start_s: f64,
    end_s: f64,
    end_ms: u64,
    downbeat: bool,
    impact: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EffectTimelineSynthesizer {
    style: StyleSettings,
}

impl EffectTimelineSynthesizer {
    pub fn new(style: StyleSettings) -> Self {
        Self { style }
    }

    pub fn synthesize(
        &self,
        tree: &LayoutTree,
        timeline: &Timeline,
        options: &GenerationOptions,
    ) -> Result<SynthesizedSequence, SynthError> {
        let fixtures = tree.fixtures();
        if fixtures.is_empty() {
            return Err(SynthError::EmptyLayout);
        }
        let palette = Palette::resolve(options.palette.as_deref(), &self.style.palette);
        let intervals = self.intervals(timeline);

        let timelines = match options.intents.as_deref().filter(|i| !i.is_empty()) {
            Some(intents) => self.render_intents(tree, &fixtures, &intervals, intents, &palette),
            None => self.render_preset(tree, &fixtures, &intervals, options, &palette, timeline.duration_ms()),
        };

        let sequence = SynthesizedSequence {
            duration_ms: timeline.duration_ms(),
            timing_tracks: timing_tracks(timeline),
            fixtures: timelines,
        };
        info!(
            fixtures = sequence.fixtures.len(),
            spans = sequence.span_count(),
            "sequence synthesized"
        );
        Ok(sequence)
    }

    // ── Interval grid ──────────────────────────────────────────────

    fn intervals(&self, timeline: &Timeline) -> Vec<Interval> {
        let duration = timeline.duration_seconds();
        let beats: &[f64] = match timeline.beat_times() {
            [] => &[0.0],
            b => b,
        };
        let eps = self.style.coincidence_epsilon_ms;
        let every = self.style.downbeat_every.max(1);
        let downbeats: Vec<u64> = timeline.downbeat_times().iter().map(|t| seconds_to_ms(*t)).collect();
        let impact = self.impact_indices(timeline, beats);

        beats
            .iter()
            .enumerate()
            .map(|(i, &beat)| {
                let start_s = if i == 0 { 0.0 } else { beat };
                let end_s = beats.get(i + 1).copied().unwrap_or(duration);
                let beat_ms = seconds_to_ms(beat);
                let downbeat = if downbeats.is_empty() {
                    i % every == 0
                } else {
                    downbeats.iter().any(|d| d.abs_diff(beat_ms) <= eps)
                };
                Interval {
                    start_s,
                    end_s,
                    end_ms: seconds_to_ms(end_s),
                    downbeat,
                    impact: impact.contains(&i),
                }
            })
            .collect()
    }

    /// Beat indices that fall within the first `section_impact_beats` beats
    /// of a section. The opening section at t=0 is not a change.
    fn impact_indices(&self, timeline: &Timeline, beats: &[f64]) -> HashSet<usize> {
        let eps = self.style.coincidence_epsilon_ms;
        let beat_ms: Vec<u64> = beats.iter().map(|b| seconds_to_ms(*b)).collect();
        let mut out = HashSet::new();
        for section in timeline.section_times() {
            let section_ms = seconds_to_ms(*section);
            if section_ms <= eps {
                continue;
            }
            let first = beat_ms.partition_point(|b| b + eps < section_ms);
            out.extend(first..(first + self.style.section_impact_beats).min(beat_ms.len()));
        }
        out
    }

    // ── Preset mode ────────────────────────────────────────────────

    fn render_preset(
        &self,
        tree: &LayoutTree,
        fixtures: &[&Fixture],
        intervals: &[Interval],
        options: &GenerationOptions,
        palette: &Palette,
        duration_ms: u64,
    ) -> Vec<FixtureTimeline> {
        let preset = options.preset_id.as_deref().and_then(|id| {
            let found = self.style.preset(id);
            match found {
                Some((used, _)) if used != id => {
                    warn!(preset = id, fallback = used, "unknown preset, using default");
                }
                None => warn!(preset = id, "no presets configured"),
                Some(_) => {}
            }
            found.map(|(_, p)| p)
        });
        let preferred = preferred_fixtures(tree, &options.preferred);

        fixtures
            .iter()
            .map(|fixture| {
                let (effect, params) =
                    self.base_effect(fixture, preferred.contains(fixture.name.as_str()), preset);
                FixtureTimeline {
                    fixture_name: fixture.name.clone(),
                    spans: self.fixture_spans(fixture, &effect, &params, intervals, palette, duration_ms),
                }
            })
            .collect()
    }

    /// Steps 1–2 of the per-interval decision: name rules, then the
    /// featured-fixture switch, then the preset for anything still default.
    fn base_effect(
        &self,
        fixture: &Fixture,
        preferred: bool,
        preset: Option<&Preset>,
    ) -> (EffectKind, EffectParams) {
        let lowered = fixture.name.to_lowercase();
        let rule = self.style.name_rules.iter().find(|r| r.matches(&lowered));
        let (effect, mut params) = match (rule, preset) {
            (Some(rule), _) => (rule.effect.clone(), rule.params.clone()),
            (None, _) if preferred => (
                EffectKind::Bars,
                EffectParams::new().set(param::DIRECTION, "LeftRight"),
            ),
            (None, Some(p)) => (p.effect.clone(), p.params.clone()),
            (None, None) => (EffectKind::On, EffectParams::new()),
        };
        // The active preset's bar count applies to every bar-style span,
        // whichever step chose the effect.
        if effect == EffectKind::Bars {
            let preset_bars = preset.and_then(|p| p.bar_count);
            let bars = bar_count(fixture, preset_bars, self.style.default_bar_count);
            params.set_mut(param::BARS, bars.to_string());
        }
        (effect, params)
    }

    fn fixture_spans(
        &self,
        fixture: &Fixture,
        base_effect: &EffectKind,
        base_params: &EffectParams,
        intervals: &[Interval],
        palette: &Palette,
        duration_ms: u64,
    ) -> Vec<EffectSpan> {
        let mut spans = Vec::with_capacity(intervals.len());
        let pad = self.style.accent_pad_ms.min(MAX_ACCENT_PAD_MS);
        let mut cursor = 0;
        for (i, iv) in intervals.iter().enumerate() {
            let next_end = intervals.get(i + 1).map(|n| n.end_ms);
            let end_ms = match next_end {
                None => duration_ms,
                Some(next_end) if iv.downbeat => (iv.end_ms + pad).min(next_end).min(duration_ms),
                Some(_) => iv.end_ms,
            }
            .max(cursor);

            let color = if iv.downbeat {
                self.style.accent_color
            } else {
                palette.at(i)
            };
            let mut effect = base_effect.clone();
            let mut params = base_params.clone();
            params.set_color(color);
            if iv.downbeat {
                params.set_mut(param::INTENSITY_BOOST, "1");
            }
            if iv.impact {
                effect = self.style.impact_effect.clone();
                params = EffectParams::new();
                params.set_color(color);
            }
            let (effect, parameters) = self.gate(fixture, effect, params);

            spans.push(EffectSpan {
                start_ms: cursor,
                end_ms,
                effect,
                parameters,
            });
            cursor = end_ms;
        }
        spans
    }

    /// Heavy effects on small models become steady-on, keeping the color.
    fn gate(&self, fixture: &Fixture, effect: EffectKind, params: EffectParams) -> (EffectKind, EffectParams) {
        let small = fixture
            .node_count
            .is_some_and(|n| n < self.style.small_model_nodes);
        if !(small && self.style.is_heavy(&effect)) {
            return (effect, params);
        }
        debug!(fixture = %fixture.name, %effect, "downgrading heavy effect on small model");
        let mut downgraded = EffectParams::new();
        if let Some(color) = params.color() {
            downgraded.set_color(color);
        }
        (EffectKind::On, downgraded)
    }

    // ── Intent mode ────────────────────────────────────────────────

    fn render_intents(
        &self,
        tree: &LayoutTree,
        fixtures: &[&Fixture],
        intervals: &[Interval],
        intents: &[Intent],
        palette: &Palette,
    ) -> Vec<FixtureTimeline> {
        let mut assigned: BTreeMap<&str, BTreeMap<usize, EffectSpan>> = BTreeMap::new();
        for intent in intents {
            let Some(node) = tree.lookup(&intent.resolved_group_name) else {
                warn!(
                    group = %intent.resolved_group_name,
                    label = %intent.target_group_label,
                    "intent targets a group that is not in the layout"
                );
                continue;
            };
            let first = intervals.partition_point(|iv| iv.end_s <= intent.start_seconds);
            for fixture in tree.fixtures_under(node.id) {
                let slots = assigned.entry(fixture.name.as_str()).or_default();
                for (i, iv) in intervals.iter().enumerate().skip(first) {
                    if iv.start_s >= intent.end_seconds {
                        break;
                    }
                    let start_ms = seconds_to_ms(iv.start_s.max(intent.start_seconds));
                    let end_ms = seconds_to_ms(iv.end_s.min(intent.end_seconds));
                    if end_ms <= start_ms {
                        continue;
                    }
                    let mut params = intent.parameters.clone();
                    if !params.contains(param::COLOR) {
                        params.set_color(palette.at(i));
                    }
                    let (effect, parameters) = self.gate(fixture, intent.effect.clone(), params);
                    // Later intents replace earlier ones for the same interval.
                    slots.insert(
                        i,
                        EffectSpan {
                            start_ms,
                            end_ms,
                            effect,
                            parameters,
                        },
                    );
                }
            }
        }

        fixtures
            .iter()
            .map(|fixture| FixtureTimeline {
                fixture_name: fixture.name.clone(),
                spans: assigned
                    .remove(fixture.name.as_str())
                    .map(|slots| slots.into_values().collect())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Bar count for a bar-style effect: the fixture's string count, else a
/// preset-level count, else one bar per 50 nodes, else `default`.
pub fn bar_count(fixture: &Fixture, preset_bars: Option<u32>, default: u32) -> u32 {
    fixture
        .string_count
        .or(preset_bars)
        .or_else(|| fixture.node_count.map(|n| (n / 50).max(1)))
        .unwrap_or(default)
}

fn preferred_fixtures<'t>(tree: &'t LayoutTree, names: &[String]) -> HashSet<&'t str> {
    let mut out = HashSet::new();
    for name in names {
        match tree.lookup(name.trim()) {
            Some(node) => out.extend(tree.fixtures_under(node.id).into_iter().map(|f| f.name.as_str())),
            None => warn!(name = %name, "preferred name not found in layout"),
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn marks(times: &[f64]) -> Vec<u64> {
    times.iter().map(|t| (t * 1000.0).round().max(0.0) as u64).collect()
}

fn timing_tracks(timeline: &Timeline) -> Vec<TimingTrack> {
    [
        (TRACK_BEATS, timeline.beat_times()),
        (TRACK_DOWNBEATS, timeline.downbeat_times()),
        (TRACK_SECTIONS, timeline.section_times()),
    ]
    .into_iter()
    .map(|(name, times)| TimingTrack {
        name: name.to_string(),
        marks_ms: marks(times),
    })
    .collect()
}
