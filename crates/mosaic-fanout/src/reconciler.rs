use std::sync::Arc;

use mosaic_core::ProviderId;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FanoutError, Result},
    turn::{Branch, BranchStatus, Turn, Vote},
};

/// Actions offered on a branch that resolved with an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchAction {
    ReuseAsInput,
    Download,
}

const IMAGE_ACTIONS: [BranchAction; 2] = [BranchAction::ReuseAsInput, BranchAction::Download];

/// How a single branch should be drawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BranchView {
    /// Loading placeholder sized like the expected output
    Pending { label: ProviderId, width: u32, height: u32 },
    /// The image with its overlay actions
    Image {
        label: ProviderId,
        image_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        vote: Option<Vote>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u64>,
        actions: [BranchAction; 2],
    },
    /// Error text in the branch slot
    Failed { label: ProviderId, message: String },
    /// Text shown through the turn content; nothing in the slot
    TextOnly { label: ProviderId },
    /// Settled with nothing to show
    Hidden { label: ProviderId },
}

impl BranchView {
    pub fn label(&self) -> &ProviderId {
        match self {
            Self::Pending { label, .. }
            | Self::Image { label, .. }
            | Self::Failed { label, .. }
            | Self::TextOnly { label }
            | Self::Hidden { label } => label,
        }
    }

    /// Whether the branch occupies a slot in the grid
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Pending { .. } | Self::Image { .. } | Self::Failed { .. })
    }
}

/// Decide how one branch renders
pub fn render_branch(branch: &Branch) -> BranchView {
    let label = branch.label.clone();

    match branch.status {
        BranchStatus::Pending => BranchView::Pending {
            label,
            width: branch.expected_size.width,
            height: branch.expected_size.height,
        },
        BranchStatus::Failed if branch.image_url.is_none() => BranchView::Failed {
            label,
            message: branch.text.clone().unwrap_or_default(),
        },
        BranchStatus::Resolved | BranchStatus::Failed => match (&branch.image_url, &branch.text) {
            (Some(image_url), text) => BranchView::Image {
                label,
                image_url: image_url.clone(),
                text: text.clone(),
                vote: branch.vote,
                duration_ms: branch.duration_ms,
                tokens_used: branch.tokens_used,
                actions: IMAGE_ACTIONS,
            },
            (None, Some(text)) if !text.trim().is_empty() => BranchView::TextOnly { label },
            (None, _) => BranchView::Hidden { label },
        },
    }
}

/// Render every branch of a turn, in branch order
pub fn render(turn: &Turn) -> Vec<BranchView> {
    turn.branches.iter().map(|branch| render_branch(branch)).collect()
}

/// Toggle a vote on one branch
///
/// Choosing the active vote clears it. Branches without an image cannot
/// be voted on.
pub fn toggle_vote(turn: &Turn, label: &ProviderId, vote: Vote) -> Result<Turn> {
    let index = turn
        .branches
        .iter()
        .position(|branch| &branch.label == label)
        .ok_or_else(|| FanoutError::BranchNotFound(label.clone()))?;

    let branch = &turn.branches[index];
    if branch.image_url.is_none() {
        return Err(FanoutError::NoImage(label.clone()));
    }

    let next_vote = if branch.vote == Some(vote) { None } else { Some(vote) };

    let mut next = turn.clone();
    next.branches[index] = Arc::new(Branch {
        vote: next_vote,
        ..Branch::clone(branch)
    });
    Ok(next)
}

/// The next submission being composed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
}

/// Copy a branch's image into the draft's input slot
pub fn reuse_as_input(draft: &Draft, turn: &Turn, label: &ProviderId) -> Result<Draft> {
    let branch = turn
        .branch(label)
        .ok_or_else(|| FanoutError::BranchNotFound(label.clone()))?;

    let image_url = branch
        .image_url
        .clone()
        .filter(|_| branch.status == BranchStatus::Resolved)
        .ok_or_else(|| FanoutError::NoImage(label.clone()))?;

    Ok(Draft {
        prompt: draft.prompt.clone(),
        input_image: Some(image_url),
    })
}
