use std::sync::Arc;

use mosaic_config::QuotaConfig;
use mosaic_core::UserId;
use mosaic_store::GenerationLog;

use crate::error::{FanoutError, Result};

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allow { used: usize },
    Reject { used: usize, ceiling: u32 },
}

/// Caps the number of completed generations per user
pub struct QuotaGuard {
    log: Arc<dyn GenerationLog>,
    ceiling: u32,
    enabled: bool,
}

impl QuotaGuard {
    pub fn new(log: Arc<dyn GenerationLog>, config: &QuotaConfig) -> Self {
        Self {
            log,
            ceiling: config.max_generations,
            enabled: config.enabled,
        }
    }

    pub const fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Count the user's completed generations against the ceiling
    pub async fn check(&self, user: &UserId) -> Result<QuotaDecision> {
        if !self.enabled {
            return Ok(QuotaDecision::Allow { used: 0 });
        }

        let used = self.log.count_completed(user).await?;
        let ceiling = usize::try_from(self.ceiling).unwrap_or(usize::MAX);

        if used >= ceiling {
            tracing::info!(user = %user, used, ceiling = self.ceiling, "generation quota exhausted");
            Ok(QuotaDecision::Reject {
                used,
                ceiling: self.ceiling,
            })
        } else {
            Ok(QuotaDecision::Allow { used })
        }
    }

    /// Like [`check`](Self::check), turning a rejection into an error
    pub async fn ensure(&self, user: &UserId) -> Result<()> {
        match self.check(user).await? {
            QuotaDecision::Allow { .. } => Ok(()),
            QuotaDecision::Reject { ceiling, .. } => Err(FanoutError::QuotaExceeded { ceiling }),
        }
    }
}
