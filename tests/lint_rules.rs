use reelcheck::error::AnalysisError;
use reelcheck::lint::{
    self, LintResult, LintViolation, Severity, VideoFormat, rules_for, score_from,
};
use reelcheck::signals::VideoSignals;

const CLEAN_TRANSCRIPT: &str = "Three numbers decide whether your savings survive inflation. \
The first is your real rate, the second is your fee drag, the third is time. \
Here is how each one moves the result over ten years. Follow for more.";

/// What the extractor hands back at the lint step: no delivery measurements yet.
fn lint_step_signals() -> VideoSignals {
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
        }
    }))
    .expect("signals fixture")
}

fn lint_clean(format: VideoFormat) -> LintResult {
    lint::lint(&lint_step_signals(), CLEAN_TRANSCRIPT, format).unwrap()
}

fn ids(r: &LintResult) -> Vec<&str> {
    r.violations.iter().map(|v| v.rule_id.as_str()).collect()
}

fn violation<'a>(r: &'a LintResult, id: &str) -> &'a LintViolation {
    r.violations.iter().find(|v| v.rule_id == id).unwrap()
}

#[test]
fn talking_head_reference_video() {
    let r = lint_clean(VideoFormat::TalkingHead);
    assert_eq!(ids(&r), vec!["HOOK-002", "STRUCT-001", "CLAR-003"]);
    assert_eq!(r.errors, 1);
    assert_eq!(r.warnings, 2);
    assert_eq!(r.infos, 0);
    // 17 rules apply to talking_head; the 4 delivery rules have no input yet.
    assert_eq!(r.total_rules, 13);
    assert_eq!(r.passed, 10);
    assert_eq!(r.bonus_points, 0);
    assert_eq!(r.score, 82);
}

#[test]
fn counts_are_derived_from_violations() {
    let r = lint_clean(VideoFormat::Tutorial);
    let count = |sev: Severity| r.violations.iter().filter(|v| v.severity == sev).count() as u32;
    assert_eq!(r.errors, count(Severity::Error));
    assert_eq!(r.warnings, count(Severity::Warning));
    assert_eq!(r.infos, count(Severity::Info));
    assert_eq!(r.passed + r.violations.len() as u32, r.total_rules);
}

#[test]
fn catalog_is_format_scoped() {
    assert_eq!(rules_for(VideoFormat::TalkingHead), 17);
    assert_eq!(rules_for(VideoFormat::Tutorial), 15);
    assert_eq!(rules_for(VideoFormat::Other), 9);

    // STRUCT-003 only applies to step-by-step formats.
    let mut s = lint_step_signals();
    s.structure.progress_marker_count = Some(0);
    let th = lint::lint(&s, "", VideoFormat::TalkingHead).unwrap();
    let tut = lint::lint(&s, "", VideoFormat::Tutorial).unwrap();
    assert!(!ids(&th).contains(&"STRUCT-003"));
    assert!(ids(&tut).contains(&"STRUCT-003"));
}

#[test]
fn rules_without_inputs_are_not_counted() {
    let r = lint::lint(&VideoSignals::default(), "", VideoFormat::Vlog).unwrap();
    assert_eq!(r.total_rules, 0);
    assert_eq!(r.passed, 0);
    assert!(r.violations.is_empty());
    assert_eq!(r.score, 100);
}

#[test]
fn score_is_clamped_at_zero() {
    assert_eq!(score_from(250, 0), 0);
    assert_eq!(score_from(101, 0), 0);
    assert_eq!(score_from(108, 8), 0);
}

#[test]
fn bonus_never_lifts_score_above_base() {
    assert_eq!(score_from(0, 8), 100);
    assert_eq!(score_from(4, 8), 100);
    assert_eq!(score_from(20, 8), 88);
    // The cap applies even to a caller-supplied bonus.
    assert_eq!(score_from(20, 50), 88);

    let mut s = lint_step_signals();
    s.structure.payoff_present = Some(true);
    s.structure.loop_cue_present = Some(true);
    s.delivery.energy_curve_present = Some(true);
    let r = lint::lint(&s, CLEAN_TRANSCRIPT, VideoFormat::TalkingHead).unwrap();
    // HOOK-002 and CLAR-003 remain: 100 - 8 + 8.
    assert_eq!(r.bonus_points, 8);
    assert_eq!(r.score, 100);
}

#[test]
fn hook_violations_carry_timestamps() {
    let mut s = lint_step_signals();
    s.hook.time_to_claim_seconds = Some(6.2);
    let r = lint::lint(&s, "", VideoFormat::TalkingHead).unwrap();
    let slow = violation(&r, "HOOK-001");
    assert_eq!(slow.severity, Severity::Error);
    assert_eq!(slow.timestamp.as_deref(), Some("0:00-0:06"));
    assert_eq!(slow.at_seconds, Some(0.0));
}

#[test]
fn narrative_rules_fire_on_transcript() {
    let transcript = "Hey guys, follow for more! I think this is maybe the best budgeting trick, \
kind of. Put every raise into savings before you see it, and your rate climbs without effort. \
That is the whole trick, and it compounds for decades.";
    let r = lint::lint(&lint_step_signals(), transcript, VideoFormat::TalkingHead).unwrap();
    let found = ids(&r);
    assert!(found.contains(&"NARR-001"), "{found:?}");
    assert!(found.contains(&"NARR-002"), "{found:?}");
    assert!(found.contains(&"NARR-003"), "{found:?}");

    let cta = violation(&r, "NARR-002");
    assert!(cta.message.contains("follow for more"));
    let at = cta.at_seconds.expect("anchored in time");
    assert!(at > 0.0 && at < 6.0, "{at}");
}

#[test]
fn late_call_to_action_is_fine() {
    let r = lint_clean(VideoFormat::Listicle);
    assert!(!ids(&r).contains(&"NARR-002"));
}

#[test]
fn out_of_range_signals_are_rejected() {
    let mut s = lint_step_signals();
    s.hook.pattern_break_strength = Some(0);
    let err = lint::lint(&s, "", VideoFormat::TalkingHead).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidSignals(f) if f == vec!["hook.pattern_break_strength"]
    ));
}

#[test]
fn negative_counts_are_named_not_rejected_at_decode() {
    let raw = serde_json::json!({
        "hook": { "specificity_count": -1 },
        "clarity": { "topic_jump_count": -4 }
    });
    let s: VideoSignals = serde_json::from_value(raw).unwrap();
    let err = lint::lint(&s, "", VideoFormat::Tutorial).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidSignals(f)
            if f == vec!["hook.specificity_count", "clarity.topic_jump_count"]
    ));
}
