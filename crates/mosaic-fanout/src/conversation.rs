use std::{fmt, num::NonZeroUsize, str::FromStr};

use dashmap::DashMap;
use mosaic_core::{ProviderId, ProviderOutcome, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{FanoutError, Result},
    reconciler::{self, Draft},
    reducer::merge_into,
    turn::{Turn, TurnId, Vote},
};

/// Time-ordered conversation id; older conversations sort first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(skip)]
    pub owner: UserId,
    pub turns: Vec<Turn>,
    pub draft: Draft,
}

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();

/// Live conversations, mutated only through the reducer and reconciler
///
/// Bounded: creating a conversation past capacity drops the oldest one.
/// Fan-outs still running against a dropped conversation settle silently.
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Conversation>,
    capacity: NonZeroUsize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ConversationStore {
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            conversations: DashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn create(&self, owner: UserId) -> ConversationId {
        while self.conversations.len() >= self.capacity.get() {
            let Some(oldest) = self.conversations.iter().map(|entry| *entry.key()).min() else {
                break;
            };
            self.conversations.remove(&oldest);
            tracing::debug!(conversation = %oldest, "conversation evicted");
        }

        let id = ConversationId::new();
        self.conversations.insert(
            id,
            Conversation {
                id,
                owner,
                turns: Vec::new(),
                draft: Draft::default(),
            },
        );
        id
    }

    /// Copy of a conversation, visible only to its owner
    pub fn snapshot(&self, id: ConversationId, owner: &UserId) -> Result<Conversation> {
        self.conversations
            .get(&id)
            .filter(|conversation| &conversation.owner == owner)
            .map(|conversation| conversation.value().clone())
            .ok_or_else(|| FanoutError::ConversationNotFound(id.to_string()))
    }

    pub fn push_turn(&self, id: ConversationId, owner: &UserId, turn: Turn) -> Result<()> {
        self.with_owned(id, owner, |conversation| {
            conversation.turns.push(turn);
            Ok(())
        })
    }

    /// Merge a settled outcome, returning the updated turn
    ///
    /// `None` when the conversation or turn no longer exists.
    pub fn apply(
        &self,
        id: ConversationId,
        turn_id: TurnId,
        provider: &ProviderId,
        outcome: &ProviderOutcome,
    ) -> Option<Turn> {
        let mut conversation = self.conversations.get_mut(&id)?;
        conversation.turns = merge_into(&conversation.turns, turn_id, provider, outcome);
        conversation.turns.iter().find(|turn| turn.id == turn_id).cloned()
    }

    pub fn vote(
        &self,
        id: ConversationId,
        owner: &UserId,
        turn_id: TurnId,
        label: &ProviderId,
        vote: Vote,
    ) -> Result<Turn> {
        self.with_owned(id, owner, |conversation| {
            let turn = conversation
                .turns
                .iter_mut()
                .find(|turn| turn.id == turn_id)
                .ok_or_else(|| FanoutError::TurnNotFound(turn_id.to_string()))?;

            *turn = reconciler::toggle_vote(turn, label, vote)?;
            Ok(turn.clone())
        })
    }

    pub fn reuse(&self, id: ConversationId, owner: &UserId, turn_id: TurnId, label: &ProviderId) -> Result<Draft> {
        self.with_owned(id, owner, |conversation| {
            let turn = conversation
                .turns
                .iter()
                .find(|turn| turn.id == turn_id)
                .ok_or_else(|| FanoutError::TurnNotFound(turn_id.to_string()))?;

            conversation.draft = reconciler::reuse_as_input(&conversation.draft, turn, label)?;
            Ok(conversation.draft.clone())
        })
    }

    fn with_owned<T>(
        &self,
        id: ConversationId,
        owner: &UserId,
        f: impl FnOnce(&mut Conversation) -> Result<T>,
    ) -> Result<T> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .filter(|conversation| &conversation.owner == owner)
            .ok_or_else(|| FanoutError::ConversationNotFound(id.to_string()))?;

        f(&mut conversation)
    }
}

#[cfg(test)]
mod tests {
    use mosaic_core::{Modality, OutputSize};

    use super::*;
    use crate::turn::{Branch, BranchStatus};

    fn setup() -> (ConversationStore, ConversationId, UserId, TurnId) {
        let store = ConversationStore::default();
        let owner = UserId::new("user_1");
        let id = store.create(owner.clone());

        let turn = Turn::assistant([Branch::pending("dalle".into(), Modality::Image, OutputSize::default())]);
        let turn_id = turn.id;
        store.push_turn(id, &owner, Turn::user("a red bicycle")).unwrap();
        store.push_turn(id, &owner, turn).unwrap();

        (store, id, owner, turn_id)
    }

    fn image() -> ProviderOutcome {
        ProviderOutcome::success("dalle".into(), Some("https://img.test/a.png".into()), None, None, 10)
    }

    #[test]
    fn creating_past_capacity_drops_the_oldest() {
        let store = ConversationStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let owner = UserId::new("user_1");

        let first = store.create(owner.clone());
        let second = store.create(owner.clone());
        let third = store.create(owner.clone());

        assert_eq!(store.len(), 2);
        assert!(matches!(
            store.snapshot(first, &owner),
            Err(FanoutError::ConversationNotFound(_))
        ));
        assert!(store.snapshot(second, &owner).is_ok());
        assert!(store.snapshot(third, &owner).is_ok());
    }

    #[test]
    fn outcome_for_an_evicted_conversation_is_dropped() {
        let store = ConversationStore::with_capacity(NonZeroUsize::MIN);
        let owner = UserId::new("user_1");
        let id = store.create(owner.clone());
        let turn = Turn::assistant([Branch::pending("dalle".into(), Modality::Image, OutputSize::default())]);
        let turn_id = turn.id;
        store.push_turn(id, &owner, turn).unwrap();

        store.create(UserId::new("user_2"));

        assert!(store.apply(id, turn_id, &"dalle".into(), &image()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn other_users_cannot_see_a_conversation() {
        let (store, id, _, _) = setup();
        let error = store.snapshot(id, &UserId::new("intruder")).unwrap_err();
        assert!(matches!(error, FanoutError::ConversationNotFound(_)));
    }

    #[test]
    fn apply_updates_the_targeted_turn() {
        let (store, id, owner, turn_id) = setup();

        let turn = store.apply(id, turn_id, &"dalle".into(), &image()).unwrap();
        assert_eq!(turn.branches[0].status, BranchStatus::Resolved);

        let snapshot = store.snapshot(id, &owner).unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[1], turn);
    }

    #[test]
    fn late_outcome_for_unknown_turn_changes_nothing() {
        let (store, id, owner, _) = setup();
        let before = store.snapshot(id, &owner).unwrap().turns;

        assert!(store.apply(id, TurnId::new(), &"dalle".into(), &image()).is_none());
        assert_eq!(store.snapshot(id, &owner).unwrap().turns, before);
    }

    #[test]
    fn vote_and_reuse_go_through_the_reconciler() {
        let (store, id, owner, turn_id) = setup();
        store.apply(id, turn_id, &"dalle".into(), &image());

        let turn = store.vote(id, &owner, turn_id, &"dalle".into(), Vote::Down).unwrap();
        assert_eq!(turn.branches[0].vote, Some(Vote::Down));

        let draft = store.reuse(id, &owner, turn_id, &"dalle".into()).unwrap();
        assert_eq!(draft.input_image.as_deref(), Some("https://img.test/a.png"));
        assert_eq!(store.snapshot(id, &owner).unwrap().draft, draft);
    }

    #[test]
    fn vote_on_unknown_turn_is_not_found() {
        let (store, id, owner, _) = setup();
        let error = store.vote(id, &owner, TurnId::new(), &"dalle".into(), Vote::Up).unwrap_err();
        assert!(matches!(error, FanoutError::TurnNotFound(_)));
    }
}
