//! Raw measurements returned by the signal extractor.
//!
//! Every field is optional on the wire: the lint step may only get part of the
//! picture, and the storyboard step fills in the rest. Scoring requires the
//! complete set (see [`VideoSignals::require_complete`]).
//!
//! Counts and ratings are decoded as plain integers so that negative or
//! oversized values reach [`VideoSignals::validate`] and are reported by field
//! name instead of failing the whole document.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Lowest and highest value of the 1-5 rating scales.
pub const SCALE_MIN: i64 = 1;
pub const SCALE_MAX: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSignals {
    #[serde(default)]
    pub hook: HookSignals,
    #[serde(default)]
    pub structure: StructureSignals,
    #[serde(default)]
    pub clarity: ClaritySignals,
    #[serde(default)]
    pub delivery: DeliverySignals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookSignals {
    /// Seconds until the first concrete claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_claim_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_break_strength: Option<i64>,
    /// Concrete numbers or facts stated in the hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_or_contradiction_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_marker_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payoff_present: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_cue_present: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaritySignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoken_duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_complexity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_jump_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliverySignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness_stability: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_noise_quality: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filler_word_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_curve_present: Option<bool>,
}

/// Signals with every field present and range-checked.
///
/// Only [`VideoSignals::require_complete`] builds one, so ratings are always
/// within `SCALE_MIN..=SCALE_MAX`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompleteSignals {
    pub(crate) time_to_claim_seconds: f64,
    pub(crate) pattern_break_strength: u8,
    pub(crate) specificity_count: u32,
    pub(crate) question_or_contradiction_count: u32,
    pub(crate) beat_count: u32,
    pub(crate) progress_marker_count: u32,
    pub(crate) payoff_present: bool,
    pub(crate) loop_cue_present: bool,
    pub(crate) word_count: u32,
    pub(crate) spoken_duration_seconds: f64,
    pub(crate) sentence_complexity: u8,
    pub(crate) topic_jump_count: u32,
    pub(crate) redundancy: u8,
    pub(crate) loudness_stability: u8,
    pub(crate) audio_noise_quality: u8,
    pub(crate) pause_count: u32,
    pub(crate) filler_word_count: u32,
    pub(crate) energy_curve_present: bool,
}

impl VideoSignals {
    /// Fields present in `self` win; gaps are filled from `other`.
    pub fn merged_with(&self, other: &VideoSignals) -> VideoSignals {
        VideoSignals {
            hook: HookSignals {
                time_to_claim_seconds: self
                    .hook
                    .time_to_claim_seconds
                    .or(other.hook.time_to_claim_seconds),
                pattern_break_strength: self
                    .hook
                    .pattern_break_strength
                    .or(other.hook.pattern_break_strength),
                specificity_count: self.hook.specificity_count.or(other.hook.specificity_count),
                question_or_contradiction_count: self
                    .hook
                    .question_or_contradiction_count
                    .or(other.hook.question_or_contradiction_count),
            },
            structure: StructureSignals {
                beat_count: self.structure.beat_count.or(other.structure.beat_count),
                progress_marker_count: self
                    .structure
                    .progress_marker_count
                    .or(other.structure.progress_marker_count),
                payoff_present: self
                    .structure
                    .payoff_present
                    .or(other.structure.payoff_present),
                loop_cue_present: self
                    .structure
                    .loop_cue_present
                    .or(other.structure.loop_cue_present),
            },
            clarity: ClaritySignals {
                word_count: self.clarity.word_count.or(other.clarity.word_count),
                spoken_duration_seconds: self
                    .clarity
                    .spoken_duration_seconds
                    .or(other.clarity.spoken_duration_seconds),
                sentence_complexity: self
                    .clarity
                    .sentence_complexity
                    .or(other.clarity.sentence_complexity),
                topic_jump_count: self
                    .clarity
                    .topic_jump_count
                    .or(other.clarity.topic_jump_count),
                redundancy: self.clarity.redundancy.or(other.clarity.redundancy),
            },
            delivery: DeliverySignals {
                loudness_stability: self
                    .delivery
                    .loudness_stability
                    .or(other.delivery.loudness_stability),
                audio_noise_quality: self
                    .delivery
                    .audio_noise_quality
                    .or(other.delivery.audio_noise_quality),
                pause_count: self.delivery.pause_count.or(other.delivery.pause_count),
                filler_word_count: self
                    .delivery
                    .filler_word_count
                    .or(other.delivery.filler_word_count),
                energy_curve_present: self
                    .delivery
                    .energy_curve_present
                    .or(other.delivery.energy_curve_present),
            },
        }
    }

    /// Range-check the fields that are present. Absent fields are not an error here.
    pub fn validate(&self) -> Result<()> {
        let mut bad = Vec::new();
        let b = &mut bad;
        let h = &self.hook;
        let s = &self.structure;
        let c = &self.clarity;
        let d = &self.delivery;

        check_seconds(b, "hook.time_to_claim_seconds", h.time_to_claim_seconds);
        check_scale(b, "hook.pattern_break_strength", h.pattern_break_strength);
        check_count(b, "hook.specificity_count", h.specificity_count);
        check_count(
            b,
            "hook.question_or_contradiction_count",
            h.question_or_contradiction_count,
        );
        check_count(b, "structure.beat_count", s.beat_count);
        check_count(
            b,
            "structure.progress_marker_count",
            s.progress_marker_count,
        );
        check_count(b, "clarity.word_count", c.word_count);
        check_seconds(
            b,
            "clarity.spoken_duration_seconds",
            c.spoken_duration_seconds,
        );
        check_scale(b, "clarity.sentence_complexity", c.sentence_complexity);
        check_count(b, "clarity.topic_jump_count", c.topic_jump_count);
        check_scale(b, "clarity.redundancy", c.redundancy);
        check_scale(b, "delivery.loudness_stability", d.loudness_stability);
        check_scale(b, "delivery.audio_noise_quality", d.audio_noise_quality);
        check_count(b, "delivery.pause_count", d.pause_count);
        check_count(b, "delivery.filler_word_count", d.filler_word_count);

        // Words spoken in zero time cannot produce a pace.
        if let (Some(words), Some(secs)) = (c.word_count, c.spoken_duration_seconds) {
            if words > 0 && secs == 0.0 {
                b.push("clarity.spoken_duration_seconds".to_string());
            }
        }

        if bad.is_empty() {
            Ok(())
        } else {
            bad.dedup();
            Err(AnalysisError::InvalidSignals(bad))
        }
    }

    pub fn require_complete(&self) -> Result<CompleteSignals> {
        self.validate()?;

        let mut missing = Vec::new();
        let m = &mut missing;
        let h = &self.hook;
        let s = &self.structure;
        let c = &self.clarity;
        let d = &self.delivery;

        let out = CompleteSignals {
            time_to_claim_seconds: need(m, "hook.time_to_claim_seconds", h.time_to_claim_seconds),
            pattern_break_strength: need(
                m,
                "hook.pattern_break_strength",
                h.pattern_break_strength,
            ),
            specificity_count: need(m, "hook.specificity_count", h.specificity_count),
            question_or_contradiction_count: need(
                m,
                "hook.question_or_contradiction_count",
                h.question_or_contradiction_count,
            ),
            beat_count: need(m, "structure.beat_count", s.beat_count),
            progress_marker_count: need(
                m,
                "structure.progress_marker_count",
                s.progress_marker_count,
            ),
            payoff_present: need(m, "structure.payoff_present", s.payoff_present),
            loop_cue_present: need(m, "structure.loop_cue_present", s.loop_cue_present),
            word_count: need(m, "clarity.word_count", c.word_count),
            spoken_duration_seconds: need(
                m,
                "clarity.spoken_duration_seconds",
                c.spoken_duration_seconds,
            ),
            sentence_complexity: need(m, "clarity.sentence_complexity", c.sentence_complexity),
            topic_jump_count: need(m, "clarity.topic_jump_count", c.topic_jump_count),
            redundancy: need(m, "clarity.redundancy", c.redundancy),
            loudness_stability: need(m, "delivery.loudness_stability", d.loudness_stability),
            audio_noise_quality: need(m, "delivery.audio_noise_quality", d.audio_noise_quality),
            pause_count: need(m, "delivery.pause_count", d.pause_count),
            filler_word_count: need(m, "delivery.filler_word_count", d.filler_word_count),
            energy_curve_present: need(m, "delivery.energy_curve_present", d.energy_curve_present),
        };

        if missing.is_empty() {
            Ok(out)
        } else {
            Err(AnalysisError::InvalidSignals(missing))
        }
    }

    /// Words per second, when both inputs are known and the duration is positive.
    pub fn words_per_second(&self) -> Option<f64> {
        let words = self.clarity.word_count?;
        let secs = self.clarity.spoken_duration_seconds?;
        (secs > 0.0).then(|| words as f64 / secs)
    }
}

impl CompleteSignals {
    pub fn words_per_second(&self) -> f64 {
        if self.spoken_duration_seconds > 0.0 {
            self.word_count as f64 / self.spoken_duration_seconds
        } else {
            0.0
        }
    }
}

// The placeholder never escapes: a non-empty `missing` list turns into an error.
fn need<S, T>(missing: &mut Vec<String>, name: &str, value: Option<S>) -> T
where
    T: TryFrom<S> + Default,
{
    match value.map(T::try_from) {
        Some(Ok(v)) => v,
        _ => {
            missing.push(name.to_string());
            T::default()
        }
    }
}

fn check_scale(bad: &mut Vec<String>, name: &str, value: Option<i64>) {
    if let Some(v) = value {
        if !(SCALE_MIN..=SCALE_MAX).contains(&v) {
            bad.push(name.to_string());
        }
    }
}

fn check_count(bad: &mut Vec<String>, name: &str, value: Option<i64>) {
    if let Some(v) = value {
        if u32::try_from(v).is_err() {
            bad.push(name.to_string());
        }
    }
}

fn check_seconds(bad: &mut Vec<String>, name: &str, value: Option<f64>) {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            bad.push(name.to_string());
        }
    }
}
