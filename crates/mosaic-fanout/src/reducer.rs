//! Pure state updates for settling branches
//!
//! Nothing here performs I/O. Every function takes the current state by
//! reference and returns the next one; untouched branches are shared
//! with the previous state.

use std::sync::Arc;

use mosaic_core::{ProviderId, ProviderOutcome};

use crate::turn::{Branch, BranchStatus, Turn, TurnId};

const GENERIC_FAILURE: &str = "Generation failed";

/// Apply one provider outcome to a turn
///
/// An outcome for a label the turn does not have is a no-op. Text from
/// a text-centric branch also becomes the turn content; when several
/// such branches resolve, the last one wins.
pub fn merge(turn: &Turn, provider: &ProviderId, outcome: &ProviderOutcome) -> Turn {
    let Some(index) = turn.branches.iter().position(|branch| &branch.label == provider) else {
        return turn.clone();
    };

    let settled = settle(&turn.branches[index], outcome);

    let mut next = turn.clone();
    if settled.status == BranchStatus::Resolved
        && settled.modality.is_text_centric()
        && let Some(ref text) = settled.text
    {
        next.content = Some(text.clone());
    }
    next.branches[index] = Arc::new(settled);
    next
}

/// Apply an outcome to the turn with `turn_id`, leaving every other turn as is
pub fn merge_into(turns: &[Turn], turn_id: TurnId, provider: &ProviderId, outcome: &ProviderOutcome) -> Vec<Turn> {
    turns
        .iter()
        .map(|turn| {
            if turn.id == turn_id {
                merge(turn, provider, outcome)
            } else {
                turn.clone()
            }
        })
        .collect()
}

fn settle(previous: &Branch, outcome: &ProviderOutcome) -> Branch {
    let mut branch = Branch {
        duration_ms: Some(outcome.duration_ms),
        ..previous.clone()
    };

    if outcome.is_success() {
        branch.status = BranchStatus::Resolved;
        branch.image_url.clone_from(&outcome.image_url);
        branch.text.clone_from(&outcome.text);
        branch.tokens_used = outcome.tokens_used;
    } else {
        branch.status = BranchStatus::Failed;
        branch.image_url = None;
        branch.text = Some(
            outcome
                .error_message
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        );
        branch.tokens_used = None;
    }

    branch
}
