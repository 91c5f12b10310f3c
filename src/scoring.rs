//! Deterministic 0-100 quality score.
//!
//! Every raw signal goes through a threshold table (not a curve), sub-scores
//! are combined per category with fixed weights, and categories are combined
//! with a niche-selected weight table. All stored numbers are integers in
//! `[0, 100]`, and each level is computed from the *rounded* level below it, so
//! any number in a breakdown can be re-derived from the numbers beneath it.

use crate::error::Result;
use crate::signals::{CompleteSignals, VideoSignals};
use serde::{Deserialize, Serialize};

pub const SCORING_VERSION: &str = "score-v1";

const WEIGHT_EPSILON: f64 = 1e-9;

// ---- hook ------------------------------------------------------------------

/// `(upper bound in seconds, score)`; the first bucket the value fits wins.
const TIME_TO_CLAIM_BUCKETS: [(f64, f64); 5] = [
    (1.0, 100.0),
    (2.0, 90.0),
    (3.0, 75.0),
    (5.0, 55.0),
    (8.0, 35.0),
];
const TIME_TO_CLAIM_FLOOR: f64 = 20.0;

/// Indexed by `rating - 1`.
const PATTERN_BREAK_SCALE: [f64; 5] = [20.0, 40.0, 60.0, 80.0, 100.0];

/// `(at least, score)`, checked top-down.
const SPECIFICITY_STEPS: [(u32, f64); 4] = [(3, 100.0), (2, 80.0), (1, 60.0), (0, 30.0)];
const QUESTION_STEPS: [(u32, f64); 3] = [(2, 100.0), (1, 80.0), (0, 40.0)];

/// time-to-claim, pattern break, specificity, question/contradiction
pub const HOOK_WEIGHTS: [f64; 4] = [0.35, 0.25, 0.25, 0.15];

// ---- structure -------------------------------------------------------------

pub const IDEAL_BEATS_MIN: u32 = 3;
pub const IDEAL_BEATS_MAX: u32 = 6;
const BEATS_TOO_FEW_PENALTY: f64 = 25.0;
const BEATS_TOO_MANY_PENALTY: f64 = 10.0;

const PROGRESS_MARKER_STEPS: [(u32, f64); 4] = [(3, 100.0), (2, 90.0), (1, 70.0), (0, 40.0)];
const PAYOFF_PARTIAL: f64 = 30.0;
const LOOP_CUE_PARTIAL: f64 = 50.0;

/// beats, progress markers, payoff, loop cue
pub const STRUCTURE_WEIGHTS: [f64; 4] = [0.30, 0.20, 0.35, 0.15];

// ---- clarity ---------------------------------------------------------------

/// Ideal pace band in hundredths of a word per second, inclusive on both edges.
pub const IDEAL_WPS_CENTI_MIN: i64 = 230;
pub const IDEAL_WPS_CENTI_MAX: i64 = 320;
/// Points lost per 0.01 wps outside the band (4 per 0.1).
const WPS_PENALTY_PER_CENTI: f64 = 0.4;

const SENTENCE_COMPLEXITY_SCALE: [f64; 5] = [100.0, 90.0, 70.0, 45.0, 20.0];
const REDUNDANCY_SCALE: [f64; 5] = [100.0, 85.0, 65.0, 40.0, 20.0];
const TOPIC_JUMP_STEPS: [(u32, f64); 5] = [(4, 10.0), (3, 30.0), (2, 55.0), (1, 80.0), (0, 100.0)];

/// words per second, sentence complexity, topic jumps, redundancy
pub const CLARITY_WEIGHTS: [f64; 4] = [0.30, 0.25, 0.25, 0.20];

// ---- delivery --------------------------------------------------------------

const LOUDNESS_SCALE: [f64; 5] = [20.0, 40.0, 60.0, 80.0, 100.0];
const NOISE_SCALE: [f64; 5] = [20.0, 40.0, 60.0, 80.0, 100.0];

pub const MAX_GOOD_PAUSES: u32 = 4;
const PAUSE_BASE: f64 = 70.0;
const PAUSE_REWARD: f64 = 7.5;
const PAUSE_PENALTY: f64 = 10.0;

pub const FREE_FILLER_WORDS: u32 = 2;
const FILLER_PENALTY: f64 = 8.0;

const ENERGY_CURVE_PARTIAL: f64 = 40.0;

/// loudness, noise, pauses, fillers, energy curve
pub const DELIVERY_WEIGHTS: [f64; 5] = [0.20, 0.20, 0.15, 0.25, 0.20];

// ---- niches ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryWeights {
    pub hook: f64,
    pub structure: f64,
    pub clarity: f64,
    pub delivery: f64,
}

impl CategoryWeights {
    pub const fn as_array(&self) -> [f64; 4] {
        [self.hook, self.structure, self.clarity, self.delivery]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NicheWeights {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub weights: CategoryWeights,
}

pub const DEFAULT_NICHE: &NicheWeights = &NicheWeights {
    name: "default",
    aliases: &[],
    weights: CategoryWeights {
        hook: 0.30,
        structure: 0.25,
        clarity: 0.25,
        delivery: 0.20,
    },
};

pub const NICHE_OVERRIDES: &[NicheWeights] = &[
    NicheWeights {
        name: "education",
        aliases: &["tutorial", "howto", "how-to"],
        weights: CategoryWeights {
            hook: 0.20,
            structure: 0.25,
            clarity: 0.35,
            delivery: 0.20,
        },
    },
    NicheWeights {
        name: "entertainment",
        aliases: &["comedy", "skit"],
        weights: CategoryWeights {
            hook: 0.40,
            structure: 0.25,
            clarity: 0.15,
            delivery: 0.20,
        },
    },
    NicheWeights {
        name: "business",
        aliases: &["finance", "marketing"],
        weights: CategoryWeights {
            hook: 0.25,
            structure: 0.25,
            clarity: 0.30,
            delivery: 0.20,
        },
    },
    NicheWeights {
        name: "lifestyle",
        aliases: &["fitness", "beauty", "vlog"],
        weights: CategoryWeights {
            hook: 0.30,
            structure: 0.20,
            clarity: 0.20,
            delivery: 0.30,
        },
    },
    NicheWeights {
        name: "tech",
        aliases: &["technology", "software"],
        weights: CategoryWeights {
            hook: 0.25,
            structure: 0.25,
            clarity: 0.30,
            delivery: 0.20,
        },
    },
];

const fn sums_to_one(weights: &[f64]) -> bool {
    let mut sum = 0.0;
    let mut i = 0;
    while i < weights.len() {
        sum += weights[i];
        i += 1;
    }
    let diff = sum - 1.0;
    diff < WEIGHT_EPSILON && diff > -WEIGHT_EPSILON
}

const _: () = assert!(sums_to_one(&HOOK_WEIGHTS));
const _: () = assert!(sums_to_one(&STRUCTURE_WEIGHTS));
const _: () = assert!(sums_to_one(&CLARITY_WEIGHTS));
const _: () = assert!(sums_to_one(&DELIVERY_WEIGHTS));
const _: () = assert!(sums_to_one(&DEFAULT_NICHE.weights.as_array()));
const _: () = {
    let mut i = 0;
    while i < NICHE_OVERRIDES.len() {
        assert!(sums_to_one(&NICHE_OVERRIDES[i].weights.as_array()));
        i += 1;
    }
};

/// Pick the category weights for a niche. Total: anything unknown resolves to default.
pub fn resolve_niche(niche: Option<&str>) -> &'static NicheWeights {
    let Some(raw) = niche else {
        return DEFAULT_NICHE;
    };
    let key = raw.trim().to_ascii_lowercase();
    if key.is_empty() {
        return DEFAULT_NICHE;
    }
    NICHE_OVERRIDES
        .iter()
        .find(|n| n.name == key || n.aliases.iter().any(|a| *a == key))
        .unwrap_or(DEFAULT_NICHE)
}

/// Every weight table in use, for invariant checks.
pub fn weight_tables() -> Vec<(&'static str, Vec<f64>)> {
    let mut out = vec![
        ("hook", HOOK_WEIGHTS.to_vec()),
        ("structure", STRUCTURE_WEIGHTS.to_vec()),
        ("clarity", CLARITY_WEIGHTS.to_vec()),
        ("delivery", DELIVERY_WEIGHTS.to_vec()),
        (DEFAULT_NICHE.name, DEFAULT_NICHE.weights.as_array().to_vec()),
    ];
    for n in NICHE_OVERRIDES {
        out.push((n.name, n.weights.as_array().to_vec()));
    }
    out
}

// ---- breakdown -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub overall: u8,
    /// Name of the weight table actually applied.
    pub niche: String,
    pub scoring_version: String,
    pub hook: HookScores,
    pub structure: StructureScores,
    pub clarity: ClarityScores,
    pub delivery: DeliveryScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookScores {
    pub score: u8,
    pub time_to_claim: u8,
    pub pattern_break: u8,
    pub specificity: u8,
    pub question_or_contradiction: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureScores {
    pub score: u8,
    pub beat_count: u8,
    pub progress_markers: u8,
    pub payoff: u8,
    pub loop_cue: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarityScores {
    pub score: u8,
    pub words_per_second: u8,
    pub sentence_complexity: u8,
    pub topic_jumps: u8,
    pub redundancy: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryScores {
    pub score: u8,
    pub loudness_stability: u8,
    pub audio_noise_quality: u8,
    pub pauses: u8,
    pub filler_words: u8,
    pub energy_curve: u8,
}

/// Score a complete signal set. Missing or out-of-range fields are an
/// `InvalidSignals` error; nothing is defaulted.
pub fn score(signals: &VideoSignals, niche: Option<&str>) -> Result<ScoreBreakdown> {
    let s = signals.require_complete()?;
    Ok(score_complete(&s, niche))
}

fn score_complete(s: &CompleteSignals, niche: Option<&str>) -> ScoreBreakdown {
    let table = resolve_niche(niche);

    let hook = hook_scores(s);
    let structure = structure_scores(s);
    let clarity = clarity_scores(s);
    let delivery = delivery_scores(s);

    let overall = weighted(
        &[hook.score, structure.score, clarity.score, delivery.score],
        &table.weights.as_array(),
    );

    ScoreBreakdown {
        overall,
        niche: table.name.to_string(),
        scoring_version: SCORING_VERSION.to_string(),
        hook,
        structure,
        clarity,
        delivery,
    }
}

fn hook_scores(s: &CompleteSignals) -> HookScores {
    let time_to_claim = time_to_claim_score(s.time_to_claim_seconds);
    let pattern_break = scale_score(&PATTERN_BREAK_SCALE, s.pattern_break_strength);
    let specificity = step_score(&SPECIFICITY_STEPS, s.specificity_count);
    let question_or_contradiction = step_score(&QUESTION_STEPS, s.question_or_contradiction_count);
    HookScores {
        score: weighted(
            &[
                time_to_claim,
                pattern_break,
                specificity,
                question_or_contradiction,
            ],
            &HOOK_WEIGHTS,
        ),
        time_to_claim,
        pattern_break,
        specificity,
        question_or_contradiction,
    }
}

fn structure_scores(s: &CompleteSignals) -> StructureScores {
    let beat_count = beat_count_score(s.beat_count);
    let progress_markers = step_score(&PROGRESS_MARKER_STEPS, s.progress_marker_count);
    let payoff = flag_score(s.payoff_present, PAYOFF_PARTIAL);
    let loop_cue = flag_score(s.loop_cue_present, LOOP_CUE_PARTIAL);
    StructureScores {
        score: weighted(
            &[beat_count, progress_markers, payoff, loop_cue],
            &STRUCTURE_WEIGHTS,
        ),
        beat_count,
        progress_markers,
        payoff,
        loop_cue,
    }
}

fn clarity_scores(s: &CompleteSignals) -> ClarityScores {
    let words_per_second = words_per_second_score(s.words_per_second());
    let sentence_complexity = scale_score(&SENTENCE_COMPLEXITY_SCALE, s.sentence_complexity);
    let topic_jumps = step_score(&TOPIC_JUMP_STEPS, s.topic_jump_count);
    let redundancy = scale_score(&REDUNDANCY_SCALE, s.redundancy);
    ClarityScores {
        score: weighted(
            &[
                words_per_second,
                sentence_complexity,
                topic_jumps,
                redundancy,
            ],
            &CLARITY_WEIGHTS,
        ),
        words_per_second,
        sentence_complexity,
        topic_jumps,
        redundancy,
    }
}

fn delivery_scores(s: &CompleteSignals) -> DeliveryScores {
    let loudness_stability = scale_score(&LOUDNESS_SCALE, s.loudness_stability);
    let audio_noise_quality = scale_score(&NOISE_SCALE, s.audio_noise_quality);
    let pauses = pause_score(s.pause_count);
    let filler_words = filler_word_score(s.filler_word_count);
    let energy_curve = flag_score(s.energy_curve_present, ENERGY_CURVE_PARTIAL);
    DeliveryScores {
        score: weighted(
            &[
                loudness_stability,
                audio_noise_quality,
                pauses,
                filler_words,
                energy_curve,
            ],
            &DELIVERY_WEIGHTS,
        ),
        loudness_stability,
        audio_noise_quality,
        pauses,
        filler_words,
        energy_curve,
    }
}

// ---- sub-score functions ---------------------------------------------------

pub fn time_to_claim_score(seconds: f64) -> u8 {
    TIME_TO_CLAIM_BUCKETS
        .iter()
        .find(|(max, _)| seconds <= *max)
        .map(|(_, score)| to_score(*score))
        .unwrap_or_else(|| to_score(TIME_TO_CLAIM_FLOOR))
}

/// Too few beats costs more per beat than too many.
pub fn beat_count_score(beats: u32) -> u8 {
    if beats < IDEAL_BEATS_MIN {
        to_score(100.0 - BEATS_TOO_FEW_PENALTY * f64::from(IDEAL_BEATS_MIN - beats))
    } else if beats > IDEAL_BEATS_MAX {
        to_score(100.0 - BEATS_TOO_MANY_PENALTY * f64::from(beats - IDEAL_BEATS_MAX))
    } else {
        100
    }
}

/// Pace is rounded to hundredths (half away from zero) before comparison, and
/// both band edges count as inside. 2.30 and 3.20 score 100; 2.29 and 3.21 do not.
pub fn words_per_second_score(wps: f64) -> u8 {
    let centi = wps_centi(wps);
    let distance = if centi < IDEAL_WPS_CENTI_MIN {
        IDEAL_WPS_CENTI_MIN - centi
    } else if centi > IDEAL_WPS_CENTI_MAX {
        centi - IDEAL_WPS_CENTI_MAX
    } else {
        0
    };
    to_score(100.0 - WPS_PENALTY_PER_CENTI * distance as f64)
}

pub fn wps_centi(wps: f64) -> i64 {
    if wps.is_finite() && wps > 0.0 {
        (wps * 100.0).round() as i64
    } else {
        0
    }
}

/// Rewarded up to `MAX_GOOD_PAUSES`, penalized past it.
pub fn pause_score(pauses: u32) -> u8 {
    if pauses <= MAX_GOOD_PAUSES {
        to_score(PAUSE_BASE + PAUSE_REWARD * f64::from(pauses))
    } else {
        to_score(100.0 - PAUSE_PENALTY * f64::from(pauses - MAX_GOOD_PAUSES))
    }
}

pub fn filler_word_score(fillers: u32) -> u8 {
    let over = fillers.saturating_sub(FREE_FILLER_WORDS);
    to_score(100.0 - FILLER_PENALTY * f64::from(over))
}

fn flag_score(present: bool, partial: f64) -> u8 {
    if present { 100 } else { to_score(partial) }
}

/// `rating` is already range-checked; `CompleteSignals` cannot hold anything else.
fn scale_score(table: &[f64; 5], rating: u8) -> u8 {
    to_score(table[usize::from(rating) - 1])
}

fn step_score(steps: &[(u32, f64)], value: u32) -> u8 {
    steps
        .iter()
        .find(|(at_least, _)| value >= *at_least)
        .map(|(_, score)| to_score(*score))
        .unwrap_or(0)
}

fn weighted(scores: &[u8], weights: &[f64]) -> u8 {
    debug_assert_eq!(scores.len(), weights.len());
    let total: f64 = scores
        .iter()
        .zip(weights)
        .map(|(s, w)| f64::from(*s) * w)
        .sum();
    to_score(total)
}

/// Clamp to `[0, 100]` and round half away from zero.
pub fn to_score(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}
