//! BIO codec: character spans ⇄ per-token tags, and tag-grammar repair.
//!
//! The grammar is a per-pair state machine over the nine tags. The initial
//! state is `O`; `I-E` may only follow `B-E` or `I-E` of the same entity;
//! `O` and any `B-E` may follow anything. There is no terminal state.

use crate::analysis::token::Token;
use crate::entity::{EntityLabel, GoldSpan, Tag, TagRun, ranges_overlap};

/// Normalise a raw gold label to its flat entity name: trims whitespace and
/// drops a `B-`/`I-` prefix (`"O"` stays `"O"`).
fn flatten_label(label: &str) -> &str {
    let label = label.trim();
    if label.starts_with("B-") || label.starts_with("I-") {
        label.rsplit('-').next().unwrap_or(label)
    } else {
        label
    }
}

/// Project character-level gold spans onto tokens as BIO tags.
///
/// Each token takes the flat label of the first span overlapping it by at
/// least one character. A token opens an entity (`B-`) unless the previous
/// token carried the same flat label. Labels outside the tagset become `O`.
pub fn spans_to_bio(tokens: &[Token], spans: &[GoldSpan]) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(tokens.len());
    let mut prev: Option<&str> = None;

    for token in tokens {
        let mark = spans
            .iter()
            .find(|span| ranges_overlap(token.range(), (span.start, span.end)))
            .map(|span| flatten_label(&span.label));

        let tag = match mark {
            None => Tag::Outside,
            Some(ent) => {
                let prefixed = if prev == Some(ent) {
                    format!("I-{ent}")
                } else {
                    format!("B-{ent}")
                };
                Tag::parse(&prefixed).unwrap_or(Tag::Outside)
            }
        };

        tags.push(tag);
        prev = mark;
    }

    tags
}

/// Repair a tag sequence so that every `I-E` continues an `E` entity.
///
/// An orphan `I-E` is rewritten to `B-E`; nothing else changes.
pub fn bio_validate(tags: &[Tag]) -> Vec<Tag> {
    let mut out = Vec::with_capacity(tags.len());
    let mut prev = Tag::Outside;

    for &tag in tags {
        let fixed = match tag {
            Tag::Inside(entity) if !continues(prev, entity) => Tag::Begin(entity),
            other => other,
        };
        out.push(fixed);
        prev = fixed;
    }

    out
}

fn continues(prev: Tag, entity: EntityLabel) -> bool {
    matches!(prev, Tag::Begin(e) | Tag::Inside(e) if e == entity)
}

/// Whether `next` may directly follow `prev`.
pub fn is_valid_transition(prev: Tag, next: Tag) -> bool {
    match next {
        Tag::Outside | Tag::Begin(_) => true,
        Tag::Inside(entity) => continues(prev, entity),
    }
}

/// Whether a whole sequence obeys the grammar, starting from `O`.
pub fn is_valid_sequence(tags: &[Tag]) -> bool {
    let mut prev = Tag::Outside;
    tags.iter().all(|&tag| {
        let ok = is_valid_transition(prev, tag);
        prev = tag;
        ok
    })
}

/// Merge consecutive tokens with the same flat label into runs.
///
/// `O` tokens are merged too, so the runs tile the tagged tokens. Runs use
/// `[start_of_first, end_of_last)`.
pub fn bio_to_spans(tokens: &[Token], tags: &[Tag]) -> Vec<TagRun> {
    let mut runs: Vec<TagRun> = Vec::new();

    for (token, tag) in tokens.iter().zip(tags) {
        let entity = tag.entity();
        match runs.last_mut() {
            Some(run) if run.entity == entity => run.end = token.end_offset,
            _ => runs.push(TagRun {
                start: token.start_offset,
                end: token.end_offset,
                entity,
            }),
        }
    }

    runs
}
