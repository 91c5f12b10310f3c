use reelcheck::error::AnalysisError;
use reelcheck::scoring::{
    self, DEFAULT_NICHE, NICHE_OVERRIDES, resolve_niche, time_to_claim_score, weight_tables,
    words_per_second_score,
};
use reelcheck::signals::VideoSignals;

fn complete_signals() -> VideoSignals {
    serde_json::from_value(serde_json::json!({
        "hook": {
            "time_to_claim_seconds": 2.5,
            "pattern_break_strength": 2,
            "specificity_count": 3,
            "question_or_contradiction_count": 1
        },
        "structure": {
            "beat_count": 4,
            "progress_marker_count": 2,
            "payoff_present": false,
            "loop_cue_present": false
        },
        "clarity": {
            "word_count": 75,
            "spoken_duration_seconds": 30.0,
            "sentence_complexity": 4,
            "topic_jump_count": 1,
            "redundancy": 1
        },
        "delivery": {
            "loudness_stability": 4,
            "audio_noise_quality": 4,
            "pause_count": 3,
            "filler_word_count": 4,
            "energy_curve_present": true
        }
    }))
    .expect("signals fixture")
}

#[test]
fn breakdown_for_reference_signals() {
    let b = scoring::score(&complete_signals(), None).unwrap();
    assert_eq!(b.niche, "default");
    assert_eq!(b.hook.time_to_claim, 75);
    assert_eq!(b.hook.pattern_break, 40);
    assert_eq!(b.hook.specificity, 100);
    assert_eq!(b.hook.question_or_contradiction, 80);
    assert_eq!(b.hook.score, 73);
    assert_eq!(b.structure.score, 66);
    assert_eq!(b.clarity.words_per_second, 100);
    assert_eq!(b.clarity.score, 81);
    assert_eq!(b.delivery.pauses, 93);
    assert_eq!(b.delivery.filler_words, 84);
    assert_eq!(b.delivery.score, 87);
    assert_eq!(b.overall, 76);
}

#[test]
fn scoring_is_deterministic() {
    let s = complete_signals();
    let first = scoring::score(&s, Some("education")).unwrap();
    for _ in 0..50 {
        assert_eq!(scoring::score(&s, Some("education")).unwrap(), first);
    }
    let a = serde_json::to_string(&first).unwrap();
    let b = serde_json::to_string(&scoring::score(&s, Some("education")).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn every_number_stays_in_range() {
    let mut worst = complete_signals();
    worst.hook.time_to_claim_seconds = Some(60.0);
    worst.hook.pattern_break_strength = Some(1);
    worst.hook.specificity_count = Some(0);
    worst.hook.question_or_contradiction_count = Some(0);
    worst.structure.beat_count = Some(40);
    worst.structure.progress_marker_count = Some(0);
    worst.clarity.word_count = Some(900);
    worst.clarity.spoken_duration_seconds = Some(10.0);
    worst.clarity.sentence_complexity = Some(5);
    worst.clarity.topic_jump_count = Some(30);
    worst.clarity.redundancy = Some(5);
    worst.delivery.loudness_stability = Some(1);
    worst.delivery.audio_noise_quality = Some(1);
    worst.delivery.pause_count = Some(500);
    worst.delivery.filler_word_count = Some(500);
    worst.delivery.energy_curve_present = Some(false);

    for niche in [None, Some("tech"), Some("comedy"), Some("nonsense")] {
        let b = scoring::score(&worst, niche).unwrap();
        let all = [
            b.overall,
            b.hook.score,
            b.hook.time_to_claim,
            b.structure.score,
            b.structure.beat_count,
            b.clarity.score,
            b.clarity.words_per_second,
            b.delivery.score,
            b.delivery.pauses,
            b.delivery.filler_words,
        ];
        assert!(all.iter().all(|v| *v <= 100), "{b:?}");
        assert_eq!(b.delivery.pauses, 0);
        assert_eq!(b.clarity.words_per_second, 0);
    }
}

#[test]
fn weight_tables_sum_to_one() {
    for (name, weights) in weight_tables() {
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "{name} sums to {sum}");
    }
}

#[test]
fn unknown_niche_falls_back_to_default() {
    assert_eq!(
        resolve_niche(Some("underwater basket weaving")).name,
        DEFAULT_NICHE.name
    );
    assert_eq!(resolve_niche(Some("   ")).name, "default");
    assert_eq!(resolve_niche(None).name, "default");
    assert_eq!(resolve_niche(Some("  Tutorial ")).name, "education");
    for n in NICHE_OVERRIDES {
        assert_eq!(resolve_niche(Some(n.name)).name, n.name);
    }
}

#[test]
fn niche_changes_overall_only() {
    let s = complete_signals();
    let default = scoring::score(&s, None).unwrap();
    let edu = scoring::score(&s, Some("education")).unwrap();
    assert_eq!(default.hook, edu.hook);
    assert_eq!(default.clarity, edu.clarity);
    // 73*.20 + 66*.25 + 81*.35 + 87*.20 = 76.85
    assert_eq!(edu.overall, 77);
}

#[test]
fn pace_band_edges_are_inclusive() {
    // 69 words / 30 s = 2.30 wps, 96 / 30 = 3.20 wps.
    assert_eq!(words_per_second_score(69.0 / 30.0), 100);
    assert_eq!(words_per_second_score(96.0 / 30.0), 100);
    // Two hundredths outside: 100 - 0.8 rounds to 99.
    assert_eq!(words_per_second_score(2.28), 99);
    assert_eq!(words_per_second_score(3.22), 99);
}

#[test]
fn pace_outside_band_tapers_by_four_per_tenth() {
    assert_eq!(words_per_second_score(2.20), 96);
    assert_eq!(words_per_second_score(3.30), 96);
    assert_eq!(words_per_second_score(1.30), 60);
    assert_eq!(words_per_second_score(0.0), 8);
}

#[test]
fn edge_pace_scores_identically_through_full_pipeline() {
    let mut a = complete_signals();
    a.clarity.word_count = Some(69);
    a.clarity.spoken_duration_seconds = Some(30.0);
    let mut b = a.clone();
    b.clarity.word_count = Some(23);
    b.clarity.spoken_duration_seconds = Some(10.0);
    let sa = scoring::score(&a, None).unwrap();
    let sb = scoring::score(&b, None).unwrap();
    assert_eq!(sa.clarity.words_per_second, 100);
    assert_eq!(sa, sb);
}

#[test]
fn time_to_claim_floors_instead_of_zero() {
    assert_eq!(time_to_claim_score(0.4), 100);
    assert_eq!(time_to_claim_score(3.0), 75);
    assert_eq!(time_to_claim_score(30.0), 20);
}

#[test]
fn missing_fields_are_invalid_signals() {
    let mut s = complete_signals();
    s.delivery.pause_count = None;
    s.hook.pattern_break_strength = None;
    match scoring::score(&s, None) {
        Err(AnalysisError::InvalidSignals(fields)) => {
            assert_eq!(
                fields,
                vec!["hook.pattern_break_strength", "delivery.pause_count"]
            );
        }
        other => panic!("expected InvalidSignals, got {other:?}"),
    }
}

#[test]
fn out_of_range_scale_is_invalid_signals() {
    let mut s = complete_signals();
    s.clarity.redundancy = Some(9);
    assert!(matches!(
        scoring::score(&s, None),
        Err(AnalysisError::InvalidSignals(f)) if f == vec!["clarity.redundancy"]
    ));
}

#[test]
fn ratings_off_the_scale_are_rejected_not_clamped() {
    for rating in [0, 6, -1, 300] {
        let mut s = complete_signals();
        s.hook.pattern_break_strength = Some(rating);
        s.delivery.audio_noise_quality = Some(rating);
        match scoring::score(&s, None) {
            Err(AnalysisError::InvalidSignals(fields)) => {
                assert_eq!(
                    fields,
                    vec![
                        "hook.pattern_break_strength",
                        "delivery.audio_noise_quality",
                    ]
                );
            }
            other => panic!("rating {rating}: expected InvalidSignals, got {other:?}"),
        }
    }
}

#[test]
fn negative_counts_decode_and_are_named() {
    let mut raw = serde_json::to_value(complete_signals()).unwrap();
    raw["delivery"]["pause_count"] = serde_json::json!(-1);
    raw["structure"]["progress_marker_count"] = serde_json::json!(-3);
    let s: VideoSignals = serde_json::from_value(raw).unwrap();

    match scoring::score(&s, None) {
        Err(AnalysisError::InvalidSignals(fields)) => {
            assert_eq!(
                fields,
                vec!["structure.progress_marker_count", "delivery.pause_count"]
            );
        }
        other => panic!("expected InvalidSignals, got {other:?}"),
    }
}
