//! Fan-out of one prompt to many providers
//!
//! [`dispatch`] runs adapters concurrently and yields outcomes as they
//! settle. [`merge`] folds each outcome into the conversation turn, and
//! the reconciler decides how every branch renders.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod conversation;
mod error;
mod orchestrator;
mod quota;
mod reconciler;
mod reducer;
mod service;
mod turn;

pub use conversation::{Conversation, ConversationId, ConversationStore};
pub use error::{FanoutError, Result};
pub use orchestrator::{Dispatch, dispatch};
pub use quota::{QuotaDecision, QuotaGuard};
pub use reconciler::{BranchAction, BranchView, Draft, render, render_branch, reuse_as_input, toggle_vote};
pub use reducer::{merge, merge_into};
pub use service::{FanoutEvent, FanoutServer, FanoutServerBuilder, Started};
pub use turn::{Branch, BranchStatus, Role, Turn, TurnId, Vote};
