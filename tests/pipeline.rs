#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use beatseq::import::{parse_layout_str, ParsedLayout};
use beatseq::model::{param, EffectKind, EffectSpan, TimingOrigin, TimingResult};
use beatseq::plan::{HousePlan, PlanTarget, Recipe};
use beatseq::{GenerationOptions, SequenceGenerator, SynthError, TimingOptions, TimingSource};

const LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrgb>
  <models>
    <model name="MegaTree" StringCount="16" Nodes="800"/>
    <model name="Spinner-1" Nodes="300"/>
    <model name="Spinner-2" Nodes="300"/>
    <model name="Roofline" Nodes="150"/>
    <model name="Star" Nodes="6"/>
  </models>
  <modelGroups>
    <modelGroup name="Focal_Tree" models="MegaTree"/>
  </modelGroups>
</xrgb>"#;

fn layout() -> ParsedLayout {
    parse_layout_str(LAYOUT).unwrap()
}

/// 16 beats at 120 BPM over 8 seconds, one section change at 4s.
fn analysis() -> TimingResult {
    TimingResult {
        tempo_bpm: Some(120.0),
        beat_times: (0..16).map(|i| f64::from(i) * 0.5).collect(),
        downbeat_times: Vec::new(),
        section_times: vec![0.0, 4.0],
        duration_seconds: 8.0,
    }
}

fn detected() -> TimingSource {
    TimingSource::Detected(analysis())
}

fn assert_covers(spans: &[EffectSpan], duration_ms: u64) {
    assert_eq!(spans.first().unwrap().start_ms, 0);
    assert_eq!(spans.last().unwrap().end_ms, duration_ms);
    for pair in spans.windows(2) {
        assert_eq!(pair[0].end_ms, pair[1].start_ms, "gap or overlap between spans");
    }
}

#[test]
fn detected_timing_produces_full_coverage_for_every_fixture() {
    let output = SequenceGenerator::default()
        .generate(&layout(), &detected(), &GenerationOptions::default(), None)
        .unwrap();

    assert_eq!(output.summary.timing_origin, TimingOrigin::Detected);
    assert_eq!(output.summary.beat_count, 16);
    assert_eq!(output.summary.fixture_count, 5);
    assert_eq!(output.sequence.duration_ms, 8000);
    for fixture in &output.sequence.fixtures {
        assert_eq!(fixture.spans.len(), 16, "{}", fixture.fixture_name);
        assert_covers(&fixture.spans, 8000);
    }
}

#[test]
fn section_change_and_small_model_gate_apply_end_to_end() {
    let output = SequenceGenerator::default()
        .generate(&layout(), &detected(), &GenerationOptions::default(), None)
        .unwrap();

    let tree = output.sequence.fixture("MegaTree").unwrap();
    assert_eq!(tree.spans[0].effect, EffectKind::Spirals);
    // beat 8 is the first beat of the 4s section
    assert_eq!(tree.spans[8].effect, EffectKind::Shockwave);

    let star = output.sequence.fixture("Star").unwrap();
    assert!(star.spans.iter().all(|s| s.effect == EffectKind::On));
    assert!(star.spans[8].parameters.contains(param::COLOR));
}

#[test]
fn unavailable_timing_falls_back_to_fixed_grid() {
    let timing = TimingSource::Unavailable {
        reason: "analyzer timed out".into(),
        probed_duration: Some(10.0),
    };
    let output = SequenceGenerator::default()
        .generate(&layout(), &timing, &GenerationOptions::default(), None)
        .unwrap();

    assert_eq!(output.summary.timing_origin, TimingOrigin::Fallback);
    assert_eq!(output.sequence.duration_ms, 10_000);
    for fixture in &output.sequence.fixtures {
        assert_covers(&fixture.spans, 10_000);
    }
}

#[test]
fn unavailable_timing_without_duration_is_fatal() {
    let timing = TimingSource::Unavailable {
        reason: "no audio".into(),
        probed_duration: None,
    };
    let err = SequenceGenerator::default()
        .generate(&layout(), &timing, &GenerationOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, SynthError::ZeroDuration));
    assert!(err.is_fatal());
}

#[test]
fn empty_layout_is_rejected_before_timing() {
    let empty = parse_layout_str("<xrgb><models/></xrgb>").unwrap();
    let timing = TimingSource::Unavailable {
        reason: "unused".into(),
        probed_duration: None,
    };
    let err = SequenceGenerator::default()
        .generate(&empty, &timing, &GenerationOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, SynthError::EmptyLayout));
}

#[test]
fn manual_tempo_overrides_detected_beats() {
    let options = GenerationOptions {
        timing: TimingOptions {
            manual_tempo_bpm: Some(60.0),
            ..TimingOptions::default()
        },
        ..GenerationOptions::default()
    };
    let output = SequenceGenerator::default()
        .generate(&layout(), &detected(), &options, None)
        .unwrap();

    assert_eq!(output.summary.timing_origin, TimingOrigin::ManualTempo);
    let roofline = output.sequence.fixture("Roofline").unwrap();
    assert_covers(&roofline.spans, 8000);
    // beat 1 is off the bar, so it ends exactly on beat 2
    assert_eq!(roofline.spans[2].start_ms, 2000);
}

#[test]
fn plan_targets_only_mapped_groups() {
    let plan = HousePlan {
        targets: vec![PlanTarget {
            label: "Focal_Tree".into(),
            recipe: Recipe::DownbeatShockwave,
            effect: None,
        }],
        ..HousePlan::default()
    };
    let timing = TimingSource::Detected(TimingResult {
        downbeat_times: vec![0.0, 2.0, 4.0, 6.0],
        ..analysis()
    });
    let output = SequenceGenerator::default()
        .generate(&layout(), &timing, &GenerationOptions::default(), Some(&plan))
        .unwrap();

    let tree = output.sequence.fixture("MegaTree").unwrap();
    assert_eq!(tree.spans.len(), 4);
    assert_eq!((tree.spans[0].start_ms, tree.spans[0].end_ms), (0, 350));
    assert_eq!(tree.spans[1].start_ms, 2000);
    assert!(tree.spans.iter().all(|s| s.effect == EffectKind::Shockwave));
    assert_eq!(tree.spans[0].parameters.get(param::BRIGHTNESS), Some("0.90"));
    assert!(tree.spans[0].parameters.contains(param::COLOR));

    // untargeted fixtures are still listed, just empty
    assert_eq!(output.sequence.fixtures.len(), 5);
    assert!(output.sequence.fixture("Star").unwrap().spans.is_empty());
}

#[test]
fn output_serializes_with_camel_case_keys() {
    let output = SequenceGenerator::default()
        .generate(&layout(), &detected(), &GenerationOptions::default(), None)
        .unwrap();
    let json = serde_json::to_value(&output).unwrap();

    assert_eq!(json["summary"]["timingOrigin"], "detected");
    let span = &json["sequence"]["fixtures"][0]["spans"][0];
    assert_eq!(span["startMs"], 0);
    assert!(span["effectType"].is_string());
    assert!(json["sequence"]["timingTracks"].is_array());
}
