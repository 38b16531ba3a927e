use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::read_json;
use crate::error::SynthError;
use crate::model::TimingResult;
use crate::timing::TimingSource;

// ── Disk I/O ──────────────────────────────────────────────────────

/// Load a timing analysis saved as JSON. Both camelCase and the analyzer's
/// snake_case field names are accepted.
pub fn load_timing(path: &Path) -> Result<TimingResult, SynthError> {
    read_json(path).map_err(|e| match e {
        SynthError::Json(e) => SynthError::InputParse {
            message: format!("{}: {e}", path.display()),
        },
        other => other,
    })
}

// ── External analyzer ─────────────────────────────────────────────

/// Run an external beat analyzer and parse the timing JSON it prints.
///
/// `command` is split on whitespace; the audio path is appended as the last
/// argument. The child is killed if this future is dropped, so callers bound
/// it with [`detect_with_timeout`].
pub async fn run_analyzer(command: &str, audio: &Path) -> Result<TimingResult, SynthError> {
    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or_else(|| SynthError::TimingUnavailable {
        message: "empty analyzer command".into(),
    })?;

    debug!(program, audio = %audio.display(), "spawning beat analyzer");
    let output = tokio::process::Command::new(program)
        .args(parts)
        .arg(audio)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| SynthError::TimingUnavailable {
            message: format!("failed to run analyzer '{program}': {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SynthError::TimingUnavailable {
            message: format!("analyzer exited with {}: {}", output.status, stderr.trim()),
        });
    }
    serde_json::from_slice(&output.stdout).map_err(|e| SynthError::TimingUnavailable {
        message: format!("analyzer output is not timing JSON: {e}"),
    })
}

/// Await a detection future for at most `timeout`. Failure and timeout both
/// become `TimingSource::Unavailable`, which the normalizer turns into the
/// fixed-tempo fallback.
pub async fn detect_with_timeout<F>(
    detection: F,
    timeout: Duration,
    probed_duration: Option<f64>,
) -> TimingSource
where
    F: Future<Output = Result<TimingResult, SynthError>>,
{
    match tokio::time::timeout(timeout, detection).await {
        Ok(Ok(timing)) => {
            info!(
                beats = timing.beat_times.len(),
                bpm = ?timing.tempo_bpm,
                "beat detection finished"
            );
            TimingSource::Detected(timing)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "beat detection failed");
            TimingSource::from_result(Err(e), probed_duration)
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "beat detection timed out");
            TimingSource::Unavailable {
                reason: format!("detection timed out after {:.1}s", timeout.as_secs_f64()),
                probed_duration,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const TIMING: &str = r#"{"bpm": 120.0, "beat_times": [0.0, 0.5, 1.0], "duration_s": 1.5}"#;

    #[test]
    fn load_timing_reads_snake_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing.json");
        std::fs::write(&path, TIMING).unwrap();
        let timing = load_timing(&path).unwrap();
        assert_eq!(timing.beat_times.len(), 3);
        assert!((timing.duration_seconds - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn load_timing_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_timing(&path), Err(SynthError::InputParse { .. })));
    }

    #[tokio::test]
    async fn slow_detection_times_out_into_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, SynthError>(TimingResult::default())
        };
        let source = detect_with_timeout(slow, Duration::from_millis(20), Some(30.0)).await;
        match source {
            TimingSource::Unavailable { reason, probed_duration } => {
                assert!(reason.contains("timed out"));
                assert_eq!(probed_duration, Some(30.0));
            }
            TimingSource::Detected(_) => panic!("expected a timeout"),
        }
    }

    #[tokio::test]
    async fn failed_detection_is_unavailable() {
        let failing = async {
            Err::<TimingResult, _>(SynthError::TimingUnavailable {
                message: "no beats".into(),
            })
        };
        let source = detect_with_timeout(failing, Duration::from_secs(1), None).await;
        assert!(matches!(source, TimingSource::Unavailable { .. }));
    }

    #[tokio::test]
    async fn missing_analyzer_binary_is_unavailable() {
        let err = run_analyzer("definitely-not-a-beat-analyzer-binary", Path::new("song.mp3")).await;
        assert!(matches!(err, Err(SynthError::TimingUnavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn analyzer_stdout_is_parsed() {
        // `cat <file>` stands in for an analyzer printing timing JSON.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        std::fs::write(&path, TIMING).unwrap();
        let source = detect_with_timeout(run_analyzer("cat", &path), Duration::from_secs(10), None).await;
        match source {
            TimingSource::Detected(t) => assert_eq!(t.beat_times, vec![0.0, 0.5, 1.0]),
            TimingSource::Unavailable { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }
}
