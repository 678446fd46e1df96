/// Span resolution: turn the unordered union of scanner output into a
/// non-overlapping, left-to-right emission list.
///
/// Resolution is deterministic so nested detections (an email inside a
/// URL-with-secret, a date inside a longer NER span) always collapse to the
/// outermost, highest-information match.
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::entities::{EntityMatch, EntityType};
use crate::error::{RedactorError, Result};

/// Filter, order, and de-overlap scanner matches.
///
/// 1. Drop matches whose type is in `skip_types`.
/// 2. Drop matches whose exact text is in `allow_list`.
/// 3. Sort by `(start, -length, -score)`.
/// 4. Greedy sweep: a span is emitted only if it starts at or after the end
///    of the previously emitted span.
pub fn resolve_spans(
    mut matches: Vec<EntityMatch>,
    skip_types: &HashSet<EntityType>,
    allow_list: &HashSet<String>,
) -> Result<Vec<EntityMatch>> {
    matches.retain(|m| !skip_types.contains(&m.entity_type));
    matches.retain(|m| !allow_list.contains(&m.text));
    matches.retain(|m| !m.is_empty());

    matches.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });

    let mut resolved: Vec<EntityMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        match resolved.last() {
            Some(last) if m.start < last.end => continue,
            _ => resolved.push(m),
        }
    }

    verify_resolution(&resolved)?;
    Ok(resolved)
}

/// Post-condition: the emitted list must be ordered and overlap-free. A
/// violation here is an internal bug, not bad input.
fn verify_resolution(resolved: &[EntityMatch]) -> Result<()> {
    for pair in resolved.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(RedactorError::Protocol(format!(
                "overlap survived resolution: {:?}",
                resolved
            )));
        }
    }
    Ok(())
}
