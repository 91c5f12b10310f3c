use reelcheck::error::AnalysisError;
use reelcheck::narrative::{BeatRole, normalize, parse_storyboard, strip_code_fence};

#[test]
fn normalize_unifies_text() {
    let raw = "  Ｆｉｖｅ tips\r\nfor   \r\nbetter\u{0007} sleep  \n\n";
    assert_eq!(normalize(raw), "Five tips\nfor\nbetter sleep");
}

#[test]
fn fence_is_only_stripped_when_complete() {
    assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
    assert_eq!(strip_code_fence("```json\n[1]"), "```json\n[1]");
}

#[test]
fn storyboard_in_fence_parses_and_sorts() {
    let narrative = r#"```json
{
  "summary": "A  budgeting trick\r\n",
  "beats": [
    {"role": "payoff", "start_seconds": 18.0, "end_seconds": 30.0, "description": "The result"},
    {"role": "hook", "start_seconds": 0.0, "end_seconds": 3.0, "description": "Bold claim  "},
    {"role": "b_roll_montage", "start_seconds": 3.0, "end_seconds": 18.0, "description": "Steps"}
  ]
}
```"#;
    let board = parse_storyboard(narrative).unwrap();
    assert_eq!(board.summary, "A  budgeting trick");
    let roles: Vec<_> = board.beats.iter().map(|b| b.role).collect();
    assert_eq!(
        roles,
        vec![BeatRole::Hook, BeatRole::Other, BeatRole::Payoff]
    );
    assert_eq!(board.beats[0].description, "Bold claim");
    assert_eq!(board.beat_at(20.0), Some(2));
}

#[test]
fn malformed_storyboards_are_parse_failures() {
    let cases = [
        "not json at all",
        r#"{"summary": "x", "beats": []}"#,
        r#"{"beats":[{"role":"hook","start_seconds":5.0,"end_seconds":2.0,"description":"x"}]}"#,
        r#"{"beats":[{"role":"hook","start_seconds":-1.0,"end_seconds":2.0,"description":"x"}]}"#,
    ];
    for case in cases {
        let err = parse_storyboard(case).unwrap_err();
        assert!(
            matches!(err, AnalysisError::ParseFailure(_)),
            "{case}: {err}"
        );
    }
}
