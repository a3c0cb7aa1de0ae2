//! Span post-processing: overlap resolution and BIO re-labelling.
//!
//! Candidates from the rules, the stacked tagger and an optional external
//! recognizer are merged into one non-overlapping, BIO-tagged list:
//!
//! ```
//! use querytag::entity::{EntityLabel, Tag};
//! use querytag::postprocess::{CandidateSource, CandidateSpan, process_spans};
//!
//! let spans = process_spans(vec![
//!     CandidateSpan::new(0, 5, Tag::Begin(EntityLabel::Type), CandidateSource::Ensemble),
//!     CandidateSpan::new(2, 7, Tag::Begin(EntityLabel::Volume), CandidateSource::Rules),
//! ]);
//! assert_eq!(spans.len(), 1);
//! assert_eq!(spans[0].tag, Tag::Begin(EntityLabel::Volume));
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityLabel, Tag, ranges_overlap};

/// Where a candidate span came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Rules,
    Ensemble,
    External,
}

/// A labelled character range proposed by one of the sources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpan {
    pub start: usize,
    pub end: usize,
    /// Tag as proposed; only its entity matters for conflict resolution.
    pub tag: Tag,
    pub source: CandidateSource,
    /// Source confidence; `1.0` for rules and the tagger.
    pub confidence: f64,
}

impl CandidateSpan {
    pub fn new(start: usize, end: usize, tag: Tag, source: CandidateSource) -> Self {
        CandidateSpan {
            start,
            end,
            tag,
            source,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    fn priority(&self) -> u8 {
        self.tag.entity().map(EntityLabel::priority).unwrap_or(0)
    }

    fn overlaps(&self, other: &CandidateSpan) -> bool {
        ranges_overlap((self.start, self.end), (other.start, other.end))
    }
}

/// A final span with a grammar-consistent tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedSpan {
    pub start: usize,
    pub end: usize,
    pub tag: Tag,
}

impl ProcessedSpan {
    pub fn entity(&self) -> Option<EntityLabel> {
        self.tag.entity()
    }
}

/// Reduce candidates to a mutually non-overlapping set.
///
/// Candidates are visited in start order (stable). One that overlaps
/// accepted spans replaces all of them if its priority is strictly greater
/// than each of theirs, and is dropped otherwise. Candidates tagged `O` are
/// ignored. The result is greedy: it depends on visiting order.
pub fn resolve_conflicts(candidates: Vec<CandidateSpan>) -> Vec<CandidateSpan> {
    let mut sorted: Vec<CandidateSpan> = candidates
        .into_iter()
        .filter(|c| !c.tag.is_outside() && c.start < c.end)
        .collect();
    sorted.sort_by_key(|c| c.start);

    let mut accepted: Vec<CandidateSpan> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        let priority = candidate.priority();
        let mut overlapping = accepted.iter().filter(|a| a.overlaps(&candidate)).peekable();

        if overlapping.peek().is_none() {
            accepted.push(candidate);
            continue;
        }

        if overlapping.all(|a| priority > a.priority()) {
            accepted.retain(|a| !a.overlaps(&candidate));
            accepted.push(candidate);
        } else {
            debug!(
                "Dropping {:?} candidate {}..{} ({})",
                candidate.source, candidate.start, candidate.end, candidate.tag
            );
        }
    }

    accepted
}

/// Assign `B-`/`I-` per entity group.
///
/// Spans are grouped by entity in first-seen order and sorted by start
/// within each group. A span continues its predecessor (`I-`) only when it
/// starts exactly where the predecessor ends.
pub fn validate_bio_sequence(spans: &[CandidateSpan]) -> Vec<ProcessedSpan> {
    let mut groups: Vec<(EntityLabel, Vec<&CandidateSpan>)> = Vec::new();
    for span in spans {
        let Some(entity) = span.tag.entity() else {
            continue;
        };
        match groups.iter_mut().find(|(e, _)| *e == entity) {
            Some((_, members)) => members.push(span),
            None => groups.push((entity, vec![span])),
        }
    }

    let mut processed = Vec::with_capacity(spans.len());
    for (entity, mut members) in groups {
        members.sort_by_key(|s| s.start);
        let mut prev_end: Option<usize> = None;
        for span in members {
            let tag = if prev_end == Some(span.start) {
                Tag::Inside(entity)
            } else {
                Tag::Begin(entity)
            };
            processed.push(ProcessedSpan {
                start: span.start,
                end: span.end,
                tag,
            });
            prev_end = Some(span.end);
        }
    }

    processed
}

/// Resolve overlaps, re-tag, and order by start.
pub fn process_spans(candidates: Vec<CandidateSpan>) -> Vec<ProcessedSpan> {
    let resolved = resolve_conflicts(candidates);
    let mut processed = validate_bio_sequence(&resolved);
    processed.sort_by_key(|s| s.start);
    processed
}
