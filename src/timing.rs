//! Reconciles detected or manually specified timing into one `Timeline`.
//!
//! Detection failure is never fatal here: an unavailable source produces a
//! fixed-tempo grid over the known duration. Only a missing or non-positive
//! duration aborts.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SynthError;
use crate::model::{Timeline, TimingOrigin, TimingResult};

pub const DEFAULT_FALLBACK_BPM: f64 = 120.0;
/// Tempos above this are treated as bad input, not music.
pub const MAX_TEMPO_BPM: f64 = 1000.0;
/// Upper bound on the length of a generated beat grid.
pub const MAX_GRID_BEATS: u64 = 100_000;

/// What the beat analyzer produced for this request.
#[derive(Debug, Clone)]
pub enum TimingSource {
    Detected(TimingResult),
    /// Detection failed or timed out. `probed_duration` is whatever length
    /// could still be determined for the audio (seconds).
    Unavailable {
        reason: String,
        probed_duration: Option<f64>,
    },
}

impl TimingSource {
    /// Collapse a detection result into a source, keeping the error text.
    pub fn from_result(result: Result<TimingResult, SynthError>, probed_duration: Option<f64>) -> Self {
        match result {
            Ok(timing) => TimingSource::Detected(timing),
            Err(e) => TimingSource::Unavailable {
                reason: e.to_string(),
                probed_duration,
            },
        }
    }
}

/// Per-request overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingOptions {
    pub manual_tempo_bpm: Option<f64>,
    /// Added to every timeline array; may be negative.
    pub start_offset_ms: i64,
    /// Replaces the detected/probed duration when set.
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TimingNormalizer {
    fallback_bpm: f64,
}

impl Default for TimingNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_BPM)
    }
}

impl TimingNormalizer {
    pub fn new(fallback_bpm: f64) -> Self {
        let fallback_bpm = if valid_tempo(fallback_bpm) {
            fallback_bpm
        } else {
            warn!(fallback_bpm, "invalid fallback tempo, using {DEFAULT_FALLBACK_BPM}");
            DEFAULT_FALLBACK_BPM
        };
        Self { fallback_bpm }
    }

    pub fn normalize(&self, source: &TimingSource, options: &TimingOptions) -> Result<Timeline, SynthError> {
        let (detected, source_duration) = match source {
            TimingSource::Detected(t) => (Some(t), Some(t.duration_seconds)),
            TimingSource::Unavailable {
                reason,
                probed_duration,
            } => {
                warn!(%reason, "beat detection unavailable, using fixed {} BPM grid", self.fallback_bpm);
                (None, *probed_duration)
            }
        };
        let duration = options
            .duration_seconds
            .or(source_duration)
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or(SynthError::ZeroDuration)?;

        let manual = options.manual_tempo_bpm.filter(|bpm| {
            let ok = valid_tempo(*bpm);
            if !ok {
                warn!(bpm, "ignoring invalid manual tempo");
            }
            ok
        });

        let (beats, downbeats, sections, tempo, origin) = match (manual, detected) {
            (Some(bpm), detected) => (
                beat_grid(bpm, duration),
                detected.map(|t| t.downbeat_times.clone()).unwrap_or_default(),
                detected.map(|t| t.section_times.clone()).unwrap_or_default(),
                bpm,
                TimingOrigin::ManualTempo,
            ),
            (None, Some(t)) if t.beat_times.iter().any(|b| b.is_finite()) => (
                t.beat_times.clone(),
                t.downbeat_times.clone(),
                t.section_times.clone(),
                t.tempo_bpm
                    .filter(|bpm| valid_tempo(*bpm))
                    .or_else(|| tempo_from_beats(&t.beat_times))
                    .unwrap_or(self.fallback_bpm),
                TimingOrigin::Detected,
            ),
            (None, detected) => {
                if detected.is_some() {
                    warn!("detection returned no beats, using fixed {} BPM grid", self.fallback_bpm);
                }
                (
                    beat_grid(self.fallback_bpm, duration),
                    Vec::new(),
                    Vec::new(),
                    self.fallback_bpm,
                    TimingOrigin::Fallback,
                )
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let offset = options.start_offset_ms as f64 / 1000.0;
        let shift = |times: Vec<f64>| -> Vec<f64> { times.into_iter().map(|t| t + offset).collect() };
        if options.start_offset_ms != 0 {
            debug!(offset_ms = options.start_offset_ms, "shifting timeline");
        }

        let timeline = Timeline::new(
            shift(beats),
            shift(downbeats),
            shift(sections),
            duration,
            tempo,
            origin,
        )?;
        info!(
            beats = timeline.beat_times().len(),
            downbeats = timeline.downbeat_times().len(),
            sections = timeline.section_times().len(),
            duration,
            ?origin,
            "timeline normalized"
        );
        Ok(timeline)
    }
}

fn valid_tempo(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0 && bpm <= MAX_TEMPO_BPM
}

/// `i * 60/bpm` for `i = 0 ..= ceil(duration / period)`, at most
/// `MAX_GRID_BEATS + 1` beats.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn beat_grid(bpm: f64, duration: f64) -> Vec<f64> {
    let period = 60.0 / bpm;
    let wanted = (duration / period).ceil();
    let steps = if wanted.is_finite() && wanted <= MAX_GRID_BEATS as f64 {
        wanted.max(0.0) as u64
    } else {
        warn!(bpm, duration, "beat grid truncated to {MAX_GRID_BEATS} beats");
        MAX_GRID_BEATS
    };
    (0..=steps).map(|i| i as f64 * period).collect()
}

fn tempo_from_beats(beats: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = beats.iter().copied().filter(|b| b.is_finite()).collect();
    let (first, last) = (finite.first()?, finite.last()?);
    let intervals = finite.len().checked_sub(1).filter(|n| *n > 0)?;
    #[allow(clippy::cast_precision_loss)]
    let period = (last - first) / intervals as f64;
    (period > 0.0).then(|| 60.0 / period)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn detected(beats: &[f64], downbeats: &[f64], sections: &[f64], duration: f64) -> TimingSource {
        TimingSource::Detected(TimingResult {
            tempo_bpm: Some(100.0),
            beat_times: beats.to_vec(),
            downbeat_times: downbeats.to_vec(),
            section_times: sections.to_vec(),
            duration_seconds: duration,
        })
    }

    #[test]
    fn detected_timing_passes_through() {
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[0.0, 0.6, 1.2], &[0.0], &[0.0, 1.0], 2.0), &TimingOptions::default())
            .unwrap();
        assert_eq!(tl.beat_times(), &[0.0, 0.6, 1.2]);
        assert_eq!(tl.downbeat_times(), &[0.0]);
        assert_eq!(tl.origin(), TimingOrigin::Detected);
        assert!((tl.tempo_bpm() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn manual_tempo_replaces_beats_but_keeps_downbeats() {
        let opts = TimingOptions {
            manual_tempo_bpm: Some(60.0),
            ..TimingOptions::default()
        };
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[0.1, 0.7], &[0.5], &[1.5], 2.5), &opts)
            .unwrap();
        // ceil(2.5 / 1.0) = 3 → 0,1,2 and 3 clamped to 2.5
        assert_eq!(tl.beat_times(), &[0.0, 1.0, 2.0, 2.5]);
        assert_eq!(tl.downbeat_times(), &[0.5]);
        assert_eq!(tl.section_times(), &[1.5]);
        assert_eq!(tl.origin(), TimingOrigin::ManualTempo);
    }

    #[test]
    fn offset_shifts_and_clamps() {
        let opts = TimingOptions {
            start_offset_ms: -500,
            ..TimingOptions::default()
        };
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[0.0, 1.0, 2.0], &[], &[0.25], 2.0), &opts)
            .unwrap();
        assert_eq!(tl.beat_times(), &[0.0, 0.5, 1.5]);
        assert_eq!(tl.section_times(), &[0.0]);

        let opts = TimingOptions {
            start_offset_ms: 1500,
            ..TimingOptions::default()
        };
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[0.0, 1.0], &[], &[], 2.0), &opts)
            .unwrap();
        assert_eq!(tl.beat_times(), &[1.5, 2.0]);
    }

    #[test]
    fn unavailable_falls_back_to_fixed_grid() {
        let source = TimingSource::Unavailable {
            reason: "timed out".into(),
            probed_duration: Some(2.0),
        };
        let tl = TimingNormalizer::default()
            .normalize(&source, &TimingOptions::default())
            .unwrap();
        assert_eq!(tl.beat_times(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
        assert!(tl.downbeat_times().is_empty());
        assert!(tl.section_times().is_empty());
        assert_eq!(tl.origin(), TimingOrigin::Fallback);
    }

    #[test]
    fn empty_detection_also_falls_back() {
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[], &[0.0], &[0.0], 1.0), &TimingOptions::default())
            .unwrap();
        assert_eq!(tl.origin(), TimingOrigin::Fallback);
        assert_eq!(tl.beat_times(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn missing_duration_is_fatal() {
        let source = TimingSource::Unavailable {
            reason: "no audio".into(),
            probed_duration: None,
        };
        let err = TimingNormalizer::default().normalize(&source, &TimingOptions::default());
        assert!(matches!(err, Err(SynthError::ZeroDuration)));

        let opts = TimingOptions {
            duration_seconds: Some(3.0),
            ..TimingOptions::default()
        };
        let tl = TimingNormalizer::default().normalize(&source, &opts).unwrap();
        assert_eq!(tl.duration_ms(), 3000);
    }

    #[test]
    fn from_result_keeps_reason() {
        let source = TimingSource::from_result(
            Err(SynthError::TimingUnavailable {
                message: "analyzer crashed".into(),
            }),
            Some(1.0),
        );
        match source {
            TimingSource::Unavailable { reason, probed_duration } => {
                assert!(reason.contains("analyzer crashed"));
                assert_eq!(probed_duration, Some(1.0));
            }
            TimingSource::Detected(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn absurd_manual_tempo_is_ignored() {
        let opts = TimingOptions {
            manual_tempo_bpm: Some(1e300),
            ..TimingOptions::default()
        };
        let tl = TimingNormalizer::default()
            .normalize(&detected(&[0.0, 0.6, 1.2], &[], &[], 180.0), &opts)
            .unwrap();
        assert_eq!(tl.origin(), TimingOrigin::Detected);
        assert_eq!(tl.beat_times(), &[0.0, 0.6, 1.2]);
    }

    #[test]
    fn absurd_fallback_tempo_uses_default() {
        let source = TimingSource::Unavailable {
            reason: "timed out".into(),
            probed_duration: Some(1.0),
        };
        let tl = TimingNormalizer::new(1e300)
            .normalize(&source, &TimingOptions::default())
            .unwrap();
        assert!((tl.tempo_bpm() - DEFAULT_FALLBACK_BPM).abs() < f64::EPSILON);
        assert_eq!(tl.beat_times(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn grid_length_is_bounded() {
        let opts = TimingOptions {
            manual_tempo_bpm: Some(MAX_TEMPO_BPM),
            duration_seconds: Some(1e12),
            ..TimingOptions::default()
        };
        let source = TimingSource::Unavailable {
            reason: "no analyzer".into(),
            probed_duration: None,
        };
        let tl = TimingNormalizer::default().normalize(&source, &opts).unwrap();
        assert_eq!(tl.beat_times().len(), usize::try_from(MAX_GRID_BEATS + 1).unwrap());
    }

    #[test]
    fn manual_tempo_without_detection() {
        let opts = TimingOptions {
            manual_tempo_bpm: Some(60.0),
            ..TimingOptions::default()
        };
        let source = TimingSource::Unavailable {
            reason: "analyzer missing".into(),
            probed_duration: Some(2.0),
        };
        let tl = TimingNormalizer::default().normalize(&source, &opts).unwrap();
        assert_eq!(tl.origin(), TimingOrigin::ManualTempo);
        assert_eq!(tl.beat_times(), &[0.0, 1.0, 2.0]);
        assert!(tl.downbeat_times().is_empty());
        assert!(tl.section_times().is_empty());
        assert!((tl.tempo_bpm() - 60.0).abs() < f64::EPSILON);
    }
}
