use reelcheck::aggregate::{DOCUMENT_VERSION, ResultDocument, aggregate, digest, project};
use reelcheck::extractor::Classification;
use reelcheck::lint::{self, VideoFormat};
use reelcheck::narrative::parse_storyboard;
use reelcheck::scoring;
use reelcheck::signals::VideoSignals;
use serde_json::{Value, json};

const STORYBOARD: &str = r#"{
  "summary": "Three numbers that decide your savings",
  "beats": [
    {"role": "hook", "start_seconds": 0.0, "end_seconds": 3.0, "description": "Claim"},
    {"role": "setup", "start_seconds": 3.0, "end_seconds": 12.0, "description": "Rate"},
    {"role": "demonstration", "start_seconds": 12.0, "end_seconds": 24.0, "description": "Fees"},
    {"role": "payoff", "start_seconds": 24.0, "end_seconds": 30.0, "description": "Ten-year result"}
  ]
}"#;

fn signals() -> VideoSignals {
    serde_json::from_value(json!({
        "hook": {"time_to_claim_seconds": 2.5, "pattern_break_strength": 2,
                 "specificity_count": 3, "question_or_contradiction_count": 1},
        "structure": {"beat_count": 4, "progress_marker_count": 2,
                      "payoff_present": false, "loop_cue_present": false},
        "clarity": {"word_count": 75, "spoken_duration_seconds": 30.0,
                    "sentence_complexity": 4, "topic_jump_count": 1, "redundancy": 1},
        "delivery": {"loudness_stability": 4, "audio_noise_quality": 4, "pause_count": 3,
                     "filler_word_count": 4, "energy_curve_present": true}
    }))
    .expect("signals fixture")
}

fn build() -> ResultDocument {
    let classification = Classification {
        format: VideoFormat::TalkingHead,
        confidence: 0.91,
        evidence: vec!["single speaker facing camera".into()],
    };
    let s = signals();
    let lint = lint::lint(&s, "", VideoFormat::TalkingHead).unwrap();
    let board = parse_storyboard(STORYBOARD).unwrap();
    let score = scoring::score(&s, None).unwrap();
    let out = aggregate(&classification, &lint, &board, &score);
    assert_eq!(out.projection, project(&out.document));
    out.document
}

#[test]
fn projection_is_rederived_from_stored_document() {
    let doc = build();
    let stored = serde_json::to_string(&doc).unwrap();
    let reloaded: ResultDocument = serde_json::from_str(&stored).unwrap();
    assert_eq!(project(&reloaded), project(&doc));
}

#[test]
fn every_column_is_backed_by_the_document() {
    let doc = build();
    let cols = project(&doc);
    let s = &doc.score;

    assert_eq!(cols["document_version"], json!(DOCUMENT_VERSION));
    assert_eq!(cols["document_digest"], json!(doc.digest));
    assert_eq!(cols["format"], json!("talking_head"));
    assert_eq!(cols["overall_score"], json!(s.overall));
    assert_eq!(cols["overall_score"], json!(76));
    assert_eq!(cols["hook_score"], json!(s.hook.score));
    assert_eq!(cols["structure_payoff"], json!(s.structure.payoff));
    assert_eq!(
        cols["clarity_words_per_second"],
        json!(s.clarity.words_per_second)
    );
    assert_eq!(
        cols["delivery_energy_curve"],
        json!(s.delivery.energy_curve)
    );
    assert_eq!(cols["lint_score"], json!(doc.lint_summary.score));
    assert_eq!(cols["storyboard_beats"], json!(4));

    // one column per sub-score and category score, plus the overall
    let score_cols = cols
        .keys()
        .filter(|k| {
            ["hook_", "structure_", "clarity_", "delivery_"]
                .iter()
                .any(|p| k.starts_with(p))
        })
        .count();
    assert_eq!(score_cols, 4 + 4 + 4 + 4 + 5);
    let nested = |v: &Value| matches!(v, Value::Object(_) | Value::Array(_));
    assert!(!cols.values().any(nested));
}

#[test]
fn digest_covers_content_not_itself() {
    let doc = build();
    assert_eq!(doc.digest.len(), 64);
    assert_eq!(digest(&doc), doc.digest);

    let mut tampered = doc.clone();
    tampered.score.overall = 99;
    assert_ne!(digest(&tampered), doc.digest);
}

#[test]
fn violations_are_pinned_to_beats() {
    let doc = build();
    // HOOK-002 anchors at 0s, inside the hook beat; the others carry no time.
    assert_eq!(doc.highlights.len(), 1);
    assert_eq!(doc.highlights[0].rule_id, "HOOK-002");
    assert_eq!(doc.highlights[0].beat_index, 0);
}

#[test]
fn aggregation_is_deterministic() {
    assert_eq!(build(), build());
}
