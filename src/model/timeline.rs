use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::analysis::TimingOrigin;
use super::color::Color;

/// Well-known effect parameter names, as the sequencer expects them.
pub mod param {
    pub const COLOR: &str = "Color1";
    pub const BARS: &str = "Bars";
    pub const DIRECTION: &str = "Direction";
    pub const COUNT: &str = "Count";
    pub const SPEED: &str = "Speed";
    pub const INTENSITY_BOOST: &str = "IntensityBoost";
    pub const FADE: &str = "Fade";
    pub const ROTATION: &str = "Rotation";
    pub const ARMS: &str = "Arms";
    pub const BRIGHTNESS: &str = "Brightness";
}

/// Effect type of a span. The named variants are the ones the synthesizer
/// reasons about; anything else (e.g. from a house-style plan) is carried
/// through verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectKind {
    On,
    Bars,
    Meteor,
    Spirals,
    Waves,
    SingleStrand,
    Shockwave,
    ColorWash,
    Other(String),
}

impl EffectKind {
    pub fn as_str(&self) -> &str {
        match self {
            EffectKind::On => "On",
            EffectKind::Bars => "Bars",
            EffectKind::Meteor => "Meteor",
            EffectKind::Spirals => "Spirals",
            EffectKind::Waves => "Waves",
            EffectKind::SingleStrand => "SingleStrand",
            EffectKind::Shockwave => "Shockwave",
            EffectKind::ColorWash => "ColorWash",
            EffectKind::Other(name) => name,
        }
    }
}

impl From<&str> for EffectKind {
    fn from(s: &str) -> Self {
        match s {
            "On" => EffectKind::On,
            "Bars" => EffectKind::Bars,
            "Meteor" => EffectKind::Meteor,
            "Spirals" => EffectKind::Spirals,
            "Waves" => EffectKind::Waves,
            "SingleStrand" => EffectKind::SingleStrand,
            "Shockwave" => EffectKind::Shockwave,
            "ColorWash" => EffectKind::ColorWash,
            other => EffectKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EffectKind {
    fn from(s: String) -> Self {
        EffectKind::from(s.as_str())
    }
}

impl From<EffectKind> for String {
    fn from(k: EffectKind) -> String {
        k.as_str().to_string()
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named string parameters for one span. Ordered, so serialized output is
/// byte-stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectParams(BTreeMap<String, String>);

impl EffectParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn set_mut(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set_color(&mut self, color: Color) {
        self.set_mut(param::COLOR, color.to_hex());
    }

    pub fn color(&self) -> Option<Color> {
        self.get(param::COLOR).and_then(Color::from_hex)
    }
}

/// One fixture's effect assignment for one beat interval, in integer ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpan {
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(rename = "effectType")]
    pub effect: EffectKind,
    pub parameters: EffectParams,
}

/// All spans for one fixture, in time order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureTimeline {
    pub fixture_name: String,
    pub spans: Vec<EffectSpan>,
}

/// A named marker track (beats, downbeats, sections) in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingTrack {
    pub name: String,
    pub marks_ms: Vec<u64>,
}

/// Complete synthesizer output: one timeline per fixture, in tree order,
/// plus the marker tracks the spans were keyed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedSequence {
    pub duration_ms: u64,
    pub timing_tracks: Vec<TimingTrack>,
    pub fixtures: Vec<FixtureTimeline>,
}

impl SynthesizedSequence {
    pub fn fixture(&self, name: &str) -> Option<&FixtureTimeline> {
        self.fixtures.iter().find(|f| f.fixture_name == name)
    }

    pub fn span_count(&self) -> usize {
        self.fixtures.iter().map(|f| f.spans.len()).sum()
    }

    fn track_len(&self, name: &str) -> usize {
        self.timing_tracks
            .iter()
            .find(|t| t.name == name)
            .map_or(0, |t| t.marks_ms.len())
    }

    pub fn summary(&self, origin: TimingOrigin) -> SequenceSummary {
        SequenceSummary {
            version: env!("CARGO_PKG_VERSION").to_string(),
            duration_ms: self.duration_ms,
            beat_count: self.track_len(TRACK_BEATS),
            downbeat_count: self.track_len(TRACK_DOWNBEATS),
            section_count: self.track_len(TRACK_SECTIONS),
            fixture_count: self.fixtures.len(),
            span_count: self.span_count(),
            timing_origin: origin,
        }
    }
}

pub const TRACK_BEATS: &str = "Beats";
pub const TRACK_DOWNBEATS: &str = "Downbeats";
pub const TRACK_SECTIONS: &str = "Sections";

/// Counts reported back to callers after a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSummary {
    pub version: String,
    pub duration_ms: u64,
    pub beat_count: usize,
    pub downbeat_count: usize,
    pub section_count: usize,
    pub fixture_count: usize,
    pub span_count: usize,
    pub timing_origin: TimingOrigin,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn effect_kind_keeps_unknown_names() {
        assert_eq!(EffectKind::from("Meteor"), EffectKind::Meteor);
        let custom = EffectKind::from("Butterfly");
        assert_eq!(custom, EffectKind::Other("Butterfly".into()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"Butterfly\"");
    }

    #[test]
    fn span_serializes_with_wire_names() {
        let span = EffectSpan {
            start_ms: 0,
            end_ms: 500,
            effect: EffectKind::On,
            parameters: EffectParams::new().set(param::COLOR, "#FFFFFF"),
        };
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["startMs"], 0);
        assert_eq!(json["endMs"], 500);
        assert_eq!(json["effectType"], "On");
        assert_eq!(json["parameters"]["Color1"], "#FFFFFF");
    }

    #[test]
    fn params_iterate_in_key_order() {
        let p = EffectParams::new().set("Speed", "25").set("Count", "10");
        let keys: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["Count", "Speed"]);
    }
}
