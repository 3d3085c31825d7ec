use std::{fmt, str::FromStr, sync::Arc};

use mosaic_core::{Modality, OutputSize, ProviderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TurnId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Up,
    Down,
}

/// One provider's slot in an assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub label: ProviderId,
    pub status: BranchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<Vote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    pub modality: Modality,
    pub expected_size: OutputSize,
}

impl Branch {
    pub fn pending(label: ProviderId, modality: Modality, expected_size: OutputSize) -> Self {
        Self {
            label,
            status: BranchStatus::Pending,
            image_url: None,
            text: None,
            vote: None,
            duration_ms: None,
            tokens_used: None,
            modality,
            expected_size,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status != BranchStatus::Pending
    }
}

/// A message in a conversation
///
/// Branches sit behind `Arc` so that a merge copies only the branch it
/// touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Arc<Branch>>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::User,
            content: Some(content.into()),
            branches: Vec::new(),
        }
    }

    /// Assistant turn with one pending branch per dispatched provider
    pub fn assistant(branches: impl IntoIterator<Item = Branch>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Assistant,
            content: None,
            branches: branches.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn branch(&self, label: &ProviderId) -> Option<&Arc<Branch>> {
        self.branches.iter().find(|branch| &branch.label == label)
    }

    /// Whether every branch has reported
    pub fn is_settled(&self) -> bool {
        self.branches.iter().all(|branch| branch.is_settled())
    }
}
