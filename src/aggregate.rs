//! Final result document and its flat projection.
//!
//! `project` reads nothing but the document, so the query columns can always
//! be rebuilt from the stored document.

use crate::extractor::Classification;
use crate::lint::{LintResult, Severity};
use crate::narrative::Storyboard;
use crate::scoring::ScoreBreakdown;
use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DOCUMENT_VERSION: u32 = 1;

pub type Projection = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub document_version: u32,
    pub classification: Classification,
    pub lint_summary: LintResult,
    pub storyboard: Storyboard,
    pub score: ScoreBreakdown,
    /// Lint violations pinned to the storyboard beat they fall in.
    pub highlights: Vec<Highlight>,
    /// sha256 of the document serialized with this field empty.
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub rule_id: String,
    pub severity: Severity,
    pub beat_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub document: ResultDocument,
    pub projection: Projection,
}

pub fn aggregate(
    classification: &Classification,
    lint: &LintResult,
    storyboard: &Storyboard,
    score: &ScoreBreakdown,
) -> Aggregated {
    let highlights = lint
        .violations
        .iter()
        .filter_map(|v| {
            let beat_index = storyboard.beat_at(v.at_seconds?)?;
            Some(Highlight {
                rule_id: v.rule_id.clone(),
                severity: v.severity,
                beat_index,
            })
        })
        .collect();

    let mut document = ResultDocument {
        document_version: DOCUMENT_VERSION,
        classification: classification.clone(),
        lint_summary: lint.clone(),
        storyboard: storyboard.clone(),
        score: score.clone(),
        highlights,
        digest: String::new(),
    };
    document.digest = digest(&document);

    let projection = project(&document);
    Aggregated {
        document,
        projection,
    }
}

/// Content hash of the document, ignoring the stored digest itself.
pub fn digest(doc: &ResultDocument) -> String {
    let mut unsigned = doc.clone();
    unsigned.digest.clear();
    // Plain structs, string keys: serialization cannot fail.
    let bytes = serde_json::to_vec(&unsigned).unwrap_or_default();
    sha256_hex(&bytes)
}

/// Flatten the document into named scalar columns.
pub fn project(doc: &ResultDocument) -> Projection {
    let mut cols = Projection::new();
    let mut put = |key: &str, value: Value| {
        cols.insert(key.to_string(), value);
    };

    put("document_version", doc.document_version.into());
    put("document_digest", doc.digest.clone().into());

    put("format", doc.classification.format.as_str().into());
    put("format_confidence", doc.classification.confidence.into());

    let s = &doc.score;
    put("niche", s.niche.clone().into());
    put("scoring_version", s.scoring_version.clone().into());
    put("overall_score", s.overall.into());

    put("hook_score", s.hook.score.into());
    put("hook_time_to_claim", s.hook.time_to_claim.into());
    put("hook_pattern_break", s.hook.pattern_break.into());
    put("hook_specificity", s.hook.specificity.into());
    put(
        "hook_question_or_contradiction",
        s.hook.question_or_contradiction.into(),
    );

    put("structure_score", s.structure.score.into());
    put("structure_beat_count", s.structure.beat_count.into());
    put(
        "structure_progress_markers",
        s.structure.progress_markers.into(),
    );
    put("structure_payoff", s.structure.payoff.into());
    put("structure_loop_cue", s.structure.loop_cue.into());

    put("clarity_score", s.clarity.score.into());
    put(
        "clarity_words_per_second",
        s.clarity.words_per_second.into(),
    );
    put(
        "clarity_sentence_complexity",
        s.clarity.sentence_complexity.into(),
    );
    put("clarity_topic_jumps", s.clarity.topic_jumps.into());
    put("clarity_redundancy", s.clarity.redundancy.into());

    put("delivery_score", s.delivery.score.into());
    put(
        "delivery_loudness_stability",
        s.delivery.loudness_stability.into(),
    );
    put(
        "delivery_audio_noise_quality",
        s.delivery.audio_noise_quality.into(),
    );
    put("delivery_pauses", s.delivery.pauses.into());
    put("delivery_filler_words", s.delivery.filler_words.into());
    put("delivery_energy_curve", s.delivery.energy_curve.into());

    let l = &doc.lint_summary;
    put("lint_score", l.score.into());
    put("lint_total_rules", l.total_rules.into());
    put("lint_passed", l.passed.into());
    put("lint_errors", l.errors.into());
    put("lint_warnings", l.warnings.into());
    put("lint_infos", l.infos.into());

    put("storyboard_beats", doc.storyboard.beats.len().into());
    put("highlight_count", doc.highlights.len().into());

    cols
}
