//! Event Discovery
//!
//! Matches a meeting known only by its agenda against candidate published
//! records. Municipal portals frequently publish the same meeting several
//! times (draft agenda, final agenda, minutes) with reworded item titles, so
//! the match is fuzzy: each candidate is scored by token-set overlap with
//! the provided agenda items, and the best-scoring candidate wins.

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::indexing::Tokenizer;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Agenda Matching
// =============================================================================

/// Outcome of matching provided agenda items against candidate records
#[derive(Clone, Debug, PartialEq)]
pub struct AgendaMatch {
    /// Index of the best-scoring candidate
    pub selected_index: usize,
    /// Score of every candidate, in input order, each in [0, 1]
    pub scores: Vec<f64>,
}

/// Collapses a set of item titles into one normalized token set
fn token_set(tokenizer: &Tokenizer, items: &[String]) -> BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| tokenizer.tokenize(item))
        .collect()
}

/// Token-set similarity between two item lists: the size of the token
/// intersection over the size of the token union. Two lists with identical
/// vocabulary score 1.0 regardless of item ordering or repetition.
pub fn item_similarity(tokenizer: &Tokenizer, a: &[String], b: &[String]) -> f64 {
    let set_a = token_set(tokenizer, a);
    let set_b = token_set(tokenizer, b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Selects the candidate whose item titles best match the provided agenda.
///
/// Scores every candidate and picks the highest; ties resolve to the
/// earliest candidate so the result is deterministic. Fails with a
/// validation error when there are no candidates to choose from.
pub fn match_event_by_agenda(
    tokenizer: &Tokenizer,
    provided_items: &[String],
    candidates: &[Vec<String>],
) -> CoreResult<AgendaMatch> {
    if candidates.is_empty() {
        return Err(CoreError::Validation(
            "No candidate records to match against".to_string(),
        ));
    }

    let scores: Vec<f64> = candidates
        .iter()
        .map(|candidate| item_similarity(tokenizer, provided_items, candidate))
        .collect();

    let mut selected_index = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[selected_index] {
            selected_index = i;
        }
    }

    debug!(
        "Agenda match: candidate {} of {} (score {:.3})",
        selected_index,
        candidates.len(),
        scores[selected_index]
    );
    Ok(AgendaMatch {
        selected_index,
        scores,
    })
}
