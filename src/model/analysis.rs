use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SynthError;

// ── Detected timing (external analyzer output) ───────────────────

/// Raw timing as returned by the external beat analyzer. Nothing here is
/// trusted: arrays may be unsorted, contain NaN, or run past the duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingResult {
    /// Estimated tempo in BPM
    #[serde(default, alias = "bpm", alias = "tempo_bpm")]
    pub tempo_bpm: Option<f64>,
    /// Beat times in seconds
    #[serde(default, alias = "beat_times")]
    pub beat_times: Vec<f64>,
    /// Downbeat times in seconds (first beat of each measure)
    #[serde(default, alias = "downbeat_times")]
    pub downbeat_times: Vec<f64>,
    /// Section boundaries in seconds. Accepts bare numbers or
    /// `{ "time": .., "label": .. }` objects.
    #[serde(
        default,
        alias = "section_times",
        alias = "sections",
        deserialize_with = "section_marks"
    )]
    pub section_times: Vec<f64>,
    /// Duration of the audio in seconds
    #[serde(default, alias = "duration_s", alias = "duration_seconds")]
    pub duration_seconds: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SectionMark {
    Time(f64),
    Labeled {
        time: f64,
        #[allow(dead_code)]
        #[serde(default)]
        label: Option<String>,
    },
}

fn section_marks<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    let marks = Vec::<SectionMark>::deserialize(d)?;
    Ok(marks
        .into_iter()
        .map(|m| match m {
            SectionMark::Time(t) | SectionMark::Labeled { time: t, .. } => t,
        })
        .collect())
}

// ── Canonical timeline ───────────────────────────────────────────

/// How the beat grid of a `Timeline` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingOrigin {
    Detected,
    ManualTempo,
    Fallback,
}

/// The normalized, immutable timeline one generation request works against.
///
/// Invariants (enforced by `Timeline::new`): every array is finite, sorted,
/// free of duplicates and clamped to `[0, duration_seconds]`; beat times are
/// strictly increasing; the duration is positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    beat_times: Vec<f64>,
    downbeat_times: Vec<f64>,
    section_times: Vec<f64>,
    duration_seconds: f64,
    tempo_bpm: f64,
    origin: TimingOrigin,
}

impl Timeline {
    /// Build a timeline, sanitising the arrays against `duration_seconds`.
    pub fn new(
        beat_times: Vec<f64>,
        downbeat_times: Vec<f64>,
        section_times: Vec<f64>,
        duration_seconds: f64,
        tempo_bpm: f64,
        origin: TimingOrigin,
    ) -> Result<Self, SynthError> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(SynthError::ZeroDuration);
        }
        Ok(Self {
            beat_times: sanitize(beat_times, duration_seconds),
            downbeat_times: sanitize(downbeat_times, duration_seconds),
            section_times: sanitize(section_times, duration_seconds),
            duration_seconds,
            tempo_bpm,
            origin,
        })
    }

    pub fn beat_times(&self) -> &[f64] {
        &self.beat_times
    }

    pub fn downbeat_times(&self) -> &[f64] {
        &self.downbeat_times
    }

    pub fn section_times(&self) -> &[f64] {
        &self.section_times
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Duration truncated to whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        seconds_to_ms(self.duration_seconds)
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn origin(&self) -> TimingOrigin {
        self.origin
    }

    /// Spacing of the first two beats, or the tempo period for shorter grids.
    pub fn beat_period(&self) -> f64 {
        match self.beat_times.as_slice() {
            [first, second, ..] => second - first,
            _ if self.tempo_bpm > 0.0 => 60.0 / self.tempo_bpm,
            _ => 0.5,
        }
    }

    /// Start of each bar: the downbeats when known, else every `beats_per_bar`-th beat.
    pub fn bar_starts(&self, beats_per_bar: usize) -> Vec<f64> {
        if !self.downbeat_times.is_empty() {
            return self.downbeat_times.clone();
        }
        self.beat_times
            .iter()
            .step_by(beats_per_bar.max(1))
            .copied()
            .collect()
    }
}

/// Seconds → integer milliseconds by truncation. All span boundaries go
/// through here exactly once, straight from the source seconds value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0) as u64
    } else {
        0
    }
}

fn sanitize(mut times: Vec<f64>, duration: f64) -> Vec<f64> {
    times.retain(|t| t.is_finite());
    for t in &mut times {
        *t = t.clamp(0.0, duration);
    }
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}
