//! Narrative cleanup and storyboard parsing.

use crate::error::{AnalysisError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Narrative text as the linter and the storyboard parser expect it:
/// LF newlines, NFKC, no stray control characters, no trailing whitespace.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let nfkc: String = unified.nfkc().collect();
    let cleaned = sanitize_control_chars(&nfkc);
    cleaned
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn sanitize_control_chars(s: &str) -> String {
    s.chars()
        .filter(|&ch| ch == '\n' || ch == '\t' || !ch.is_control())
        .collect()
}

static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```$").unwrap());

/// Models like to wrap JSON in a Markdown fence; drop it if present.
pub fn strip_code_fence(s: &str) -> &str {
    let trimmed = s.trim();
    match RE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => trimmed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatRole {
    Hook,
    Setup,
    Context,
    Demonstration,
    Payoff,
    CallToAction,
    Loop,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub role: BeatRole,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_screen_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    #[serde(default)]
    pub summary: String,
    pub beats: Vec<Beat>,
}

impl Storyboard {
    /// Index of the beat covering `seconds`, if any.
    pub fn beat_at(&self, seconds: f64) -> Option<usize> {
        self.beats
            .iter()
            .position(|b| seconds >= b.start_seconds && seconds < b.end_seconds)
    }
}

/// Parse the storyboard narrative. Anything that is not a well-formed
/// storyboard is a `ParseFailure`.
pub fn parse_storyboard(narrative: &str) -> Result<Storyboard> {
    let body = strip_code_fence(narrative);
    let mut board: Storyboard = serde_json::from_str(body)
        .map_err(|e| AnalysisError::parse(format!("storyboard is not valid JSON: {e}")))?;

    if board.beats.is_empty() {
        return Err(AnalysisError::parse("storyboard has no beats"));
    }
    for (i, beat) in board.beats.iter().enumerate() {
        let times_ok = beat.start_seconds.is_finite()
            && beat.end_seconds.is_finite()
            && beat.start_seconds >= 0.0
            && beat.end_seconds >= beat.start_seconds;
        if !times_ok {
            return Err(AnalysisError::parse(format!(
                "storyboard beat {i} has invalid times {}..{}",
                beat.start_seconds, beat.end_seconds
            )));
        }
    }

    board.summary = normalize(&board.summary);
    for beat in &mut board.beats {
        beat.description = normalize(&beat.description);
    }
    board
        .beats
        .sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fence(raw), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn beat_lookup_is_half_open() {
        let board = Storyboard {
            summary: String::new(),
            beats: vec![
                Beat {
                    role: BeatRole::Hook,
                    start_seconds: 0.0,
                    end_seconds: 3.0,
                    description: "open".into(),
                    on_screen_text: None,
                },
                Beat {
                    role: BeatRole::Payoff,
                    start_seconds: 3.0,
                    end_seconds: 9.0,
                    description: "reveal".into(),
                    on_screen_text: None,
                },
            ],
        };
        assert_eq!(board.beat_at(0.0), Some(0));
        assert_eq!(board.beat_at(3.0), Some(1));
        assert_eq!(board.beat_at(9.0), None);
    }
}
