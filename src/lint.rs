//! Format-scoped content lint.
//!
//! A fixed catalog of rules, each scoped to the formats it makes sense for.
//! Rules whose inputs the extractor did not provide are skipped rather than
//! counted as passed or failed.

use crate::error::{AnalysisError, Result};
use crate::narrative;
use crate::scoring::wps_centi;
use crate::signals::VideoSignals;
use crate::util::format_clock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub const BASE_SCORE: u8 = 100;

const ERROR_PENALTY: i32 = 10;
const WARNING_PENALTY: i32 = 4;
const INFO_PENALTY: i32 = 1;

const PAYOFF_BONUS: u8 = 3;
const LOOP_CUE_BONUS: u8 = 3;
const ENERGY_CURVE_BONUS: u8 = 2;
pub const MAX_BONUS: u8 = 8;

const SLOW_CLAIM_SECONDS: f64 = 3.0;
const WEAK_PATTERN_BREAK: i64 = 2;
const MIN_BEATS: i64 = 3;
const MAX_BEATS: i64 = 8;
/// Acceptable pace for lint purposes, hundredths of a word per second.
const PACE_CENTI_MIN: i64 = 200;
const PACE_CENTI_MAX: i64 = 360;
const MAX_TOPIC_JUMPS: i64 = 2;
const COMPLEX_SENTENCES: i64 = 4;
const HIGH_REDUNDANCY: i64 = 4;
const MAX_FILLER_WORDS: i64 = 5;
const POOR_AUDIO: i64 = 2;
const UNSTABLE_LOUDNESS: i64 = 2;
/// A call to action inside this leading share of the transcript comes before the payoff.
const EARLY_CTA_SHARE: f64 = 0.2;
const HEDGE_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    TalkingHead,
    Tutorial,
    Listicle,
    Storytime,
    VoiceoverBroll,
    Skit,
    Vlog,
    #[serde(other)]
    Other,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 8] = [
        VideoFormat::TalkingHead,
        VideoFormat::Tutorial,
        VideoFormat::Listicle,
        VideoFormat::Storytime,
        VideoFormat::VoiceoverBroll,
        VideoFormat::Skit,
        VideoFormat::Vlog,
        VideoFormat::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::TalkingHead => "talking_head",
            VideoFormat::Tutorial => "tutorial",
            VideoFormat::Listicle => "listicle",
            VideoFormat::Storytime => "storytime",
            VideoFormat::VoiceoverBroll => "voiceover_broll",
            VideoFormat::Skit => "skit",
            VideoFormat::Vlog => "vlog",
            VideoFormat::Other => "other",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        VideoFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| AnalysisError::invalid_input(format!("unknown video format: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn penalty(self) -> i32 {
        match self {
            Severity::Error => ERROR_PENALTY,
            Severity::Warning => WARNING_PENALTY,
            Severity::Info => INFO_PENALTY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintViolation {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
    /// Display range such as `0:00-0:05`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Point in the video the violation anchors to, for beat lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintResult {
    pub format: VideoFormat,
    pub violations: Vec<LintViolation>,
    /// Rules applicable to the format whose inputs were available.
    pub total_rules: u32,
    pub passed: u32,
    pub warnings: u32,
    pub errors: u32,
    pub infos: u32,
    pub base_score: u8,
    pub bonus_points: u8,
    pub score: u8,
}

struct LintInput<'a> {
    signals: &'a VideoSignals,
    transcript: &'a str,
}

enum Outcome {
    /// Inputs the rule needs are absent.
    Skipped,
    Pass,
    Fail(Finding),
}

struct Finding {
    message: String,
    at_seconds: Option<f64>,
    timestamp: Option<String>,
}

impl Finding {
    fn new(message: String) -> Self {
        Self {
            message,
            at_seconds: None,
            timestamp: None,
        }
    }

    fn at(mut self, start: f64, end: f64) -> Self {
        self.at_seconds = Some(start);
        self.timestamp = Some(format!("{}-{}", format_clock(start), format_clock(end)));
        self
    }
}

enum Scope {
    AllFormats,
    Only(&'static [VideoFormat]),
}

impl Scope {
    fn includes(&self, format: VideoFormat) -> bool {
        match self {
            Scope::AllFormats => true,
            Scope::Only(list) => list.contains(&format),
        }
    }
}

struct Rule {
    id: &'static str,
    name: &'static str,
    scope: Scope,
    severity: Severity,
    check: fn(&LintInput<'_>) -> Outcome,
    suggestion: &'static str,
}

use VideoFormat::*;

static RULES: &[Rule] = &[
    Rule {
        id: "HOOK-001",
        name: "slow-claim",
        scope: Scope::AllFormats,
        severity: Severity::Error,
        check: check_slow_claim,
        suggestion: "Open with the concrete claim or result; cut the warm-up before it.",
    },
    Rule {
        id: "HOOK-002",
        name: "weak-pattern-break",
        scope: Scope::Only(&[TalkingHead, Storytime, Skit, Vlog, VoiceoverBroll]),
        severity: Severity::Warning,
        check: check_pattern_break,
        suggestion: "Start on motion, a cut, or an unexpected visual in the first second.",
    },
    Rule {
        id: "HOOK-003",
        name: "vague-hook",
        scope: Scope::Only(&[TalkingHead, Tutorial, Listicle, VoiceoverBroll]),
        severity: Severity::Warning,
        check: check_vague_hook,
        suggestion: "Put a number, name, or specific outcome in the first sentence.",
    },
    Rule {
        id: "HOOK-004",
        name: "no-open-loop",
        scope: Scope::Only(&[TalkingHead, Storytime, Skit, Vlog]),
        severity: Severity::Info,
        check: check_open_loop,
        suggestion: "Pose a question or contradiction the video resolves later.",
    },
    Rule {
        id: "STRUCT-001",
        name: "missing-payoff",
        scope: Scope::AllFormats,
        severity: Severity::Error,
        check: check_payoff,
        suggestion: "Deliver the promised result explicitly before the video ends.",
    },
    Rule {
        id: "STRUCT-002",
        name: "beat-pacing",
        scope: Scope::AllFormats,
        severity: Severity::Warning,
        check: check_beats,
        suggestion: "Aim for 3 to 8 distinct beats: hook, build, payoff.",
    },
    Rule {
        id: "STRUCT-003",
        name: "no-progress-markers",
        scope: Scope::Only(&[Tutorial, Listicle]),
        severity: Severity::Warning,
        check: check_progress_markers,
        suggestion: "Signpost steps (\"step 2\", \"number 3\") so viewers know where they are.",
    },
    Rule {
        id: "CLAR-001",
        name: "pace",
        scope: Scope::AllFormats,
        severity: Severity::Warning,
        check: check_pace,
        suggestion: "Target roughly 2.3 to 3.2 words per second.",
    },
    Rule {
        id: "CLAR-002",
        name: "topic-jumps",
        scope: Scope::AllFormats,
        severity: Severity::Warning,
        check: check_topic_jumps,
        suggestion: "Keep to one idea; move tangents to a separate video.",
    },
    Rule {
        id: "CLAR-003",
        name: "complex-sentences",
        scope: Scope::Only(&[TalkingHead, Tutorial, VoiceoverBroll]),
        severity: Severity::Warning,
        check: check_complexity,
        suggestion: "Split long sentences; one clause per breath.",
    },
    Rule {
        id: "CLAR-004",
        name: "redundancy",
        scope: Scope::AllFormats,
        severity: Severity::Info,
        check: check_redundancy,
        suggestion: "Say each point once; cut restatements.",
    },
    Rule {
        id: "DELIV-001",
        name: "filler-words",
        scope: Scope::Only(&[TalkingHead, Tutorial, Storytime, Vlog]),
        severity: Severity::Warning,
        check: check_fillers,
        suggestion: "Cut \"um\", \"like\", \"you know\" in the edit or re-record the take.",
    },
    Rule {
        id: "DELIV-002",
        name: "noisy-audio",
        scope: Scope::AllFormats,
        severity: Severity::Error,
        check: check_noise,
        suggestion: "Use a closer mic or apply noise reduction before export.",
    },
    Rule {
        id: "DELIV-003",
        name: "unstable-loudness",
        scope: Scope::AllFormats,
        severity: Severity::Warning,
        check: check_loudness,
        suggestion: "Normalize loudness and compress peaks.",
    },
    Rule {
        id: "DELIV-004",
        name: "flat-energy",
        scope: Scope::Only(&[TalkingHead, Storytime, Vlog]),
        severity: Severity::Info,
        check: check_energy,
        suggestion: "Vary intensity: build toward the payoff instead of a flat read.",
    },
    Rule {
        id: "NARR-001",
        name: "greeting-opener",
        scope: Scope::Only(&[TalkingHead, Tutorial, Vlog]),
        severity: Severity::Warning,
        check: check_greeting,
        suggestion: "Drop the greeting; the first words should be the hook.",
    },
    Rule {
        id: "NARR-002",
        name: "early-call-to-action",
        scope: Scope::AllFormats,
        severity: Severity::Warning,
        check: check_early_cta,
        suggestion: "Ask for the follow after the payoff, not before it.",
    },
    Rule {
        id: "NARR-003",
        name: "hedging",
        scope: Scope::Only(&[TalkingHead, Tutorial]),
        severity: Severity::Info,
        check: check_hedging,
        suggestion: "State claims directly; drop \"I think\" and \"kind of\".",
    },
];

static RE_GREETING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(hey|hi|hello|what'?s up|welcome back)\b").unwrap());
static RE_CTA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(like and subscribe|follow for more|smash (?:that|the) like|link in (?:my|the) bio)\b",
    )
    .unwrap()
});
static RE_HEDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i think|maybe|kind of|sort of|i guess|probably)\b").unwrap()
});

/// Number of rules in the catalog that apply to `format`.
pub fn rules_for(format: VideoFormat) -> usize {
    RULES.iter().filter(|r| r.scope.includes(format)).count()
}

/// Lint `signals` and `transcript` against the rules scoped to `format`.
pub fn lint(signals: &VideoSignals, transcript: &str, format: VideoFormat) -> Result<LintResult> {
    signals.validate()?;
    let transcript = narrative::normalize(transcript);
    let input = LintInput {
        signals,
        transcript: &transcript,
    };

    let mut violations = Vec::new();
    let mut evaluated = 0u32;
    for rule in RULES.iter().filter(|r| r.scope.includes(format)) {
        match (rule.check)(&input) {
            Outcome::Skipped => continue,
            Outcome::Pass => evaluated += 1,
            Outcome::Fail(f) => {
                evaluated += 1;
                violations.push(LintViolation {
                    rule_id: rule.id.to_string(),
                    rule_name: rule.name.to_string(),
                    severity: rule.severity,
                    message: f.message,
                    suggestion: rule.suggestion.to_string(),
                    timestamp: f.timestamp,
                    at_seconds: f.at_seconds,
                });
            }
        }
    }

    let count = |sev: Severity| violations.iter().filter(|v| v.severity == sev).count() as u32;
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);
    let infos = count(Severity::Info);

    let penalty: i32 = violations.iter().map(|v| v.severity.penalty()).sum();
    let bonus_points = bonus(signals);
    let score = score_from(penalty, bonus_points);

    Ok(LintResult {
        format,
        total_rules: evaluated,
        passed: evaluated - violations.len() as u32,
        warnings,
        errors,
        infos,
        violations,
        base_score: BASE_SCORE,
        bonus_points,
        score,
    })
}

/// Base minus penalties plus bonus, never above the base and never below 0.
pub fn score_from(penalty: i32, bonus_points: u8) -> u8 {
    let base = i32::from(BASE_SCORE);
    (base - penalty + i32::from(bonus_points.min(MAX_BONUS)))
        .min(base)
        .clamp(0, 100) as u8
}

fn bonus(signals: &VideoSignals) -> u8 {
    let mut points = 0u8;
    if signals.structure.payoff_present == Some(true) {
        points += PAYOFF_BONUS;
    }
    if signals.structure.loop_cue_present == Some(true) {
        points += LOOP_CUE_BONUS;
    }
    if signals.delivery.energy_curve_present == Some(true) {
        points += ENERGY_CURVE_BONUS;
    }
    points.min(MAX_BONUS)
}

fn outcome(failed: bool, finding: impl FnOnce() -> Finding) -> Outcome {
    if failed {
        Outcome::Fail(finding())
    } else {
        Outcome::Pass
    }
}

fn check_slow_claim(i: &LintInput<'_>) -> Outcome {
    let Some(ttc) = i.signals.hook.time_to_claim_seconds else {
        return Outcome::Skipped;
    };
    outcome(ttc > SLOW_CLAIM_SECONDS, || {
        Finding::new(format!(
            "First claim at {ttc:.1}s; viewers decide within {SLOW_CLAIM_SECONDS:.0}s."
        ))
        .at(0.0, ttc)
    })
}

fn check_pattern_break(i: &LintInput<'_>) -> Outcome {
    let Some(strength) = i.signals.hook.pattern_break_strength else {
        return Outcome::Skipped;
    };
    outcome(strength <= WEAK_PATTERN_BREAK, || {
        Finding::new(format!(
            "Opening pattern break is weak ({strength}/5); nothing interrupts the scroll."
        ))
        .at(0.0, 1.0)
    })
}

fn check_vague_hook(i: &LintInput<'_>) -> Outcome {
    let hook = &i.signals.hook;
    let Some(n) = hook.specificity_count else {
        return Outcome::Skipped;
    };
    let hook_end = hook.time_to_claim_seconds.unwrap_or(SLOW_CLAIM_SECONDS);
    outcome(n == 0, || {
        Finding::new("Hook contains no concrete numbers or facts.".to_string()).at(0.0, hook_end)
    })
}

fn check_open_loop(i: &LintInput<'_>) -> Outcome {
    let Some(n) = i.signals.hook.question_or_contradiction_count else {
        return Outcome::Skipped;
    };
    outcome(n == 0, || {
        Finding::new("Hook raises no question or contradiction to hold attention.".to_string())
    })
}

fn check_payoff(i: &LintInput<'_>) -> Outcome {
    let Some(present) = i.signals.structure.payoff_present else {
        return Outcome::Skipped;
    };
    outcome(!present, || {
        Finding::new("No payoff detected: the hook's promise is never resolved.".to_string())
    })
}

fn check_beats(i: &LintInput<'_>) -> Outcome {
    let Some(beats) = i.signals.structure.beat_count else {
        return Outcome::Skipped;
    };
    outcome(!(MIN_BEATS..=MAX_BEATS).contains(&beats), || {
        let why = if beats < MIN_BEATS {
            "too few"
        } else {
            "too many"
        };
        Finding::new(format!(
            "{beats} narrative beats is {why} for short-form pacing."
        ))
    })
}

fn check_progress_markers(i: &LintInput<'_>) -> Outcome {
    let Some(n) = i.signals.structure.progress_marker_count else {
        return Outcome::Skipped;
    };
    outcome(n == 0, || {
        Finding::new("No progress markers: viewers cannot tell how far along it is.".to_string())
    })
}

fn check_pace(i: &LintInput<'_>) -> Outcome {
    let Some(wps) = i.signals.words_per_second() else {
        return Outcome::Skipped;
    };
    let centi = wps_centi(wps);
    outcome(!(PACE_CENTI_MIN..=PACE_CENTI_MAX).contains(&centi), || {
        let why = if centi < PACE_CENTI_MIN {
            "slow"
        } else {
            "fast"
        };
        Finding::new(format!("Speaking pace of {wps:.2} words/s is too {why}."))
    })
}

fn check_topic_jumps(i: &LintInput<'_>) -> Outcome {
    let Some(n) = i.signals.clarity.topic_jump_count else {
        return Outcome::Skipped;
    };
    outcome(n > MAX_TOPIC_JUMPS, || {
        Finding::new(format!("{n} topic jumps dilute the main point."))
    })
}

fn check_complexity(i: &LintInput<'_>) -> Outcome {
    let Some(level) = i.signals.clarity.sentence_complexity else {
        return Outcome::Skipped;
    };
    outcome(level >= COMPLEX_SENTENCES, || {
        Finding::new(format!(
            "Sentence complexity is high ({level}/5) for spoken delivery."
        ))
    })
}

fn check_redundancy(i: &LintInput<'_>) -> Outcome {
    let Some(level) = i.signals.clarity.redundancy else {
        return Outcome::Skipped;
    };
    outcome(level >= HIGH_REDUNDANCY, || {
        Finding::new(format!("Script repeats itself ({level}/5 redundancy)."))
    })
}

fn check_fillers(i: &LintInput<'_>) -> Outcome {
    let Some(n) = i.signals.delivery.filler_word_count else {
        return Outcome::Skipped;
    };
    outcome(n > MAX_FILLER_WORDS, || {
        Finding::new(format!("{n} filler words detected."))
    })
}

fn check_noise(i: &LintInput<'_>) -> Outcome {
    let Some(q) = i.signals.delivery.audio_noise_quality else {
        return Outcome::Skipped;
    };
    outcome(q <= POOR_AUDIO, || {
        Finding::new(format!(
            "Background noise is distracting (audio quality {q}/5)."
        ))
    })
}

fn check_loudness(i: &LintInput<'_>) -> Outcome {
    let Some(q) = i.signals.delivery.loudness_stability else {
        return Outcome::Skipped;
    };
    outcome(q <= UNSTABLE_LOUDNESS, || {
        Finding::new(format!("Loudness swings noticeably (stability {q}/5)."))
    })
}

fn check_energy(i: &LintInput<'_>) -> Outcome {
    let Some(present) = i.signals.delivery.energy_curve_present else {
        return Outcome::Skipped;
    };
    outcome(!present, || {
        Finding::new("Delivery energy stays flat from start to finish.".to_string())
    })
}

fn check_greeting(i: &LintInput<'_>) -> Outcome {
    if i.transcript.is_empty() {
        return Outcome::Skipped;
    }
    outcome(RE_GREETING.is_match(i.transcript), || {
        Finding::new("Video opens with a greeting instead of the hook.".to_string()).at(0.0, 1.0)
    })
}

fn check_early_cta(i: &LintInput<'_>) -> Outcome {
    if i.transcript.is_empty() {
        return Outcome::Skipped;
    }
    let len = i.transcript.len() as f64;
    let early = RE_CTA
        .find(i.transcript)
        .filter(|m| (m.start() as f64) / len < EARLY_CTA_SHARE);
    match early {
        None => Outcome::Pass,
        Some(m) => {
            let cta = m.as_str();
            let mut finding =
                Finding::new(format!("Call to action \"{cta}\" comes before the payoff."));
            if let Some(duration) = i.signals.clarity.spoken_duration_seconds {
                let start = duration * (m.start() as f64) / len;
                let end = duration * (m.end() as f64) / len;
                finding = finding.at(start, end);
            }
            Outcome::Fail(finding)
        }
    }
}

fn check_hedging(i: &LintInput<'_>) -> Outcome {
    if i.transcript.is_empty() {
        return Outcome::Skipped;
    }
    let hedges = RE_HEDGE.find_iter(i.transcript).count();
    outcome(hedges >= HEDGE_LIMIT, || {
        Finding::new(format!("{hedges} hedging phrases weaken the claims."))
    })
}
