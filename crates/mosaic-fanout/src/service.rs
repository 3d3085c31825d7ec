use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use mosaic_config::Config;
use mosaic_core::{GenerationRequest, InputImage, ProviderId, ProviderOutcome, UserId};
use mosaic_providers::{Adapter, GenerationInput, ProviderRegistry, RegistryBuilder, run};
use mosaic_store::{GenerationLog, GenerationRecord, RecordStatus};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::{
    conversation::{ConversationId, ConversationStore},
    error::{FanoutError, Result},
    orchestrator::{Dispatch, dispatch},
    quota::QuotaGuard,
    reconciler::{BranchView, render_branch},
    turn::{Branch, Turn, TurnId},
};

/// Progress of a running fan-out, in the order it happens
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FanoutEvent {
    /// One branch settled
    Branch {
        turn_id: TurnId,
        view: BranchView,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Every branch has settled
    Done { turn_id: TurnId },
}

/// A fan-out that passed validation and the quota check
pub struct Started {
    pub user_turn: Turn,
    pub assistant_turn: Turn,
    pub events: mpsc::UnboundedReceiver<FanoutEvent>,
}

/// Validates, guards, dispatches, and records generations
pub struct FanoutServer {
    registry: ProviderRegistry,
    quota: QuotaGuard,
    log: Arc<dyn GenerationLog>,
    conversations: Arc<ConversationStore>,
    record_failures: bool,
}

impl FanoutServer {
    pub fn new(registry: ProviderRegistry, log: Arc<dyn GenerationLog>, quota: QuotaGuard, record_failures: bool) -> Self {
        Self {
            registry,
            quota,
            log,
            conversations: Arc::default(),
            record_failures,
        }
    }

    /// Replace the conversation store with one holding at most `capacity`
    #[must_use]
    pub fn with_conversation_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.conversations = Arc::new(ConversationStore::with_capacity(capacity));
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Check a request and resolve its adapters, without side effects
    ///
    /// Repeated provider ids collapse to their first occurrence.
    pub fn validate(&self, request: &GenerationRequest) -> Result<Vec<Arc<dyn Adapter>>> {
        validate_prompt(request)?;

        if request.providers.is_empty() {
            return Err(FanoutError::Validation("select at least one provider".to_string()));
        }

        let mut selected: Vec<ProviderId> = Vec::with_capacity(request.providers.len());
        for id in &request.providers {
            if !selected.contains(id) {
                selected.push(id.clone());
            }
        }

        self.registry.select(&selected).map_err(FanoutError::UnknownProvider)
    }

    /// Start a fan-out inside a conversation
    ///
    /// After validation the user turn is appended even if the quota then
    /// rejects the request. Branches keep running when the returned
    /// receiver is dropped.
    pub async fn submit(
        &self,
        user: &UserId,
        conversation: ConversationId,
        request: GenerationRequest,
    ) -> Result<Started> {
        let adapters = self.validate(&request)?;

        let user_turn = Turn::user(request.prompt.clone());
        self.conversations.push_turn(conversation, user, user_turn.clone())?;

        self.quota.ensure(user).await?;

        let kinds: HashMap<ProviderId, &'static str> = adapters
            .iter()
            .map(|adapter| (adapter.id().clone(), adapter.descriptor().kind))
            .collect();

        let assistant_turn = Turn::assistant(adapters.iter().map(|adapter| {
            let descriptor = adapter.descriptor();
            Branch::pending(adapter.id().clone(), descriptor.modality, descriptor.expected_size)
        }));
        self.conversations
            .push_turn(conversation, user, assistant_turn.clone())?;

        let dispatch = dispatch(generation_input(&request), adapters)?;

        tracing::info!(
            user = %user,
            conversation = %conversation,
            turn_id = %assistant_turn.id,
            branches = dispatch.remaining(),
            "fan-out dispatched"
        );

        let (events, receiver) = mpsc::unbounded_channel();
        let driver = Driver {
            conversations: Arc::clone(&self.conversations),
            recorder: Recorder {
                log: Arc::clone(&self.log),
                record_failures: self.record_failures,
            },
            user: user.clone(),
            request,
            conversation,
            turn_id: assistant_turn.id,
            kinds,
            events,
        };
        tokio::spawn(driver.run(dispatch));

        Ok(Started {
            user_turn,
            assistant_turn,
            events: receiver,
        })
    }

    /// Run a single provider outside any conversation
    ///
    /// A failed outcome is recorded, then returned as
    /// [`FanoutError::Generation`] carrying the provider's classification.
    pub async fn generate(
        &self,
        user: &UserId,
        provider: &ProviderId,
        request: &GenerationRequest,
    ) -> Result<ProviderOutcome> {
        validate_prompt(request)?;

        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| FanoutError::UnknownProvider(provider.clone()))?;

        self.quota.ensure(user).await?;

        let outcome = run(adapter.as_ref(), &generation_input(request)).await;

        Recorder {
            log: Arc::clone(&self.log),
            record_failures: self.record_failures,
        }
        .record(user, request, adapter.descriptor().kind, &outcome)
        .await;

        if outcome.is_success() {
            Ok(outcome)
        } else {
            Err(FanoutError::generation(outcome))
        }
    }

    /// The user's completed generations, newest first
    pub async fn history(&self, user: &UserId) -> Result<Vec<GenerationRecord>> {
        Ok(self.log.query_completed(user).await?)
    }
}

fn validate_prompt(request: &GenerationRequest) -> Result<()> {
    if request.prompt.trim().is_empty() {
        return Err(FanoutError::Validation("prompt must not be empty".to_string()));
    }
    Ok(())
}

fn generation_input(request: &GenerationRequest) -> GenerationInput {
    GenerationInput {
        prompt: request.prompt.clone(),
        image: request.input_image.clone(),
        enhance: request.enhance,
    }
}

struct Recorder {
    log: Arc<dyn GenerationLog>,
    record_failures: bool,
}

impl Recorder {
    /// Persist one settled branch; write failures are only logged
    async fn record(&self, user: &UserId, request: &GenerationRequest, kind: &str, outcome: &ProviderOutcome) {
        let mut record = if outcome.is_success() {
            let mut record =
                GenerationRecord::new(user.clone(), &request.prompt, outcome.provider.as_str(), RecordStatus::Completed);
            record.output_image_url.clone_from(&outcome.image_url);
            record.metadata = json!({
                "provider": outcome.provider,
                "kind": kind,
                "duration_ms": outcome.duration_ms,
                "tokens": outcome.tokens_used,
                "text": outcome.text,
            });
            record
        } else if self.record_failures {
            let mut record =
                GenerationRecord::new(user.clone(), &request.prompt, outcome.provider.as_str(), RecordStatus::Failed);
            record.error.clone_from(&outcome.error_message);
            record.metadata = json!({
                "provider": outcome.provider,
                "kind": kind,
                "duration_ms": outcome.duration_ms,
            });
            record
        } else {
            return;
        };

        if let Some(InputImage::Url(url)) = &request.input_image {
            record.input_image_url = Some(url.clone());
        }

        if let Err(e) = self.log.insert(record).await {
            tracing::error!(provider = %outcome.provider, error = %e, "failed to persist generation record");
        }
    }
}

/// Owns a dispatch until every branch has settled
struct Driver {
    conversations: Arc<ConversationStore>,
    recorder: Recorder,
    user: UserId,
    request: GenerationRequest,
    conversation: ConversationId,
    turn_id: TurnId,
    kinds: HashMap<ProviderId, &'static str>,
    events: mpsc::UnboundedSender<FanoutEvent>,
}

impl Driver {
    async fn run(self, mut dispatch: Dispatch) {
        while let Some((provider, outcome)) = dispatch.next().await {
            let kind = self.kinds.get(&provider).copied().unwrap_or("unknown");
            self.recorder.record(&self.user, &self.request, kind, &outcome).await;

            let Some(turn) = self
                .conversations
                .apply(self.conversation, self.turn_id, &provider, &outcome)
            else {
                tracing::debug!(provider = %provider, turn_id = %self.turn_id, "turn is gone, dropping outcome");
                continue;
            };

            if let Some(branch) = turn.branch(&provider) {
                self.emit(FanoutEvent::Branch {
                    turn_id: self.turn_id,
                    view: render_branch(branch),
                    content: turn.content.clone(),
                });
            }
        }

        tracing::info!(turn_id = %self.turn_id, "fan-out settled");
        self.emit(FanoutEvent::Done { turn_id: self.turn_id });
    }

    fn emit(&self, event: FanoutEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(turn_id = %self.turn_id, "event receiver dropped");
        }
    }
}

/// Builds a [`FanoutServer`] from configuration
pub struct FanoutServerBuilder<'a> {
    config: &'a Config,
}

impl<'a> FanoutServerBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub async fn build(self) -> anyhow::Result<FanoutServer> {
        let storage = mosaic_store::object_store(&self.config.storage)?;
        let log = mosaic_store::generation_log(&self.config.persistence).await?;
        let registry = RegistryBuilder::new(self.config, storage).build()?;
        let quota = QuotaGuard::new(Arc::clone(&log), &self.config.quota);

        let server = FanoutServer::new(registry, log, quota, self.config.persistence.record_failures);

        Ok(match self.config.server.max_conversations {
            Some(capacity) => server.with_conversation_capacity(capacity),
            None => server,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use mosaic_config::QuotaConfig;
    use mosaic_core::{HttpError, Modality, OutputSize};
    use mosaic_providers::{AdapterDescriptor, Generation, ProviderError};
    use mosaic_store::MemoryGenerationLog;

    use super::*;
    use crate::turn::BranchStatus;

    struct Fake {
        id: ProviderId,
        delay: Duration,
        modality: Modality,
        result: fn() -> mosaic_providers::Result<Generation>,
    }

    #[async_trait]
    impl Adapter for Fake {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor {
                kind: "fake",
                modality: self.modality,
                expected_size: OutputSize::default(),
            }
        }

        async fn invoke(&self, _input: &GenerationInput) -> mosaic_providers::Result<Generation> {
            tokio::time::sleep(self.delay).await;
            (self.result)()
        }
    }

    fn image_after(id: &str, millis: u64) -> Arc<dyn Adapter> {
        Arc::new(Fake {
            id: id.into(),
            delay: Duration::from_millis(millis),
            modality: Modality::Image,
            result: || {
                Ok(Generation {
                    image_url: Some("https://img.test/generations/a.png".into()),
                    ..Generation::default()
                })
            },
        })
    }

    fn failure_after(id: &str, millis: u64) -> Arc<dyn Adapter> {
        Arc::new(Fake {
            id: id.into(),
            delay: Duration::from_millis(millis),
            modality: Modality::Image,
            result: || {
                Err(ProviderError::Upstream {
                    status: 500,
                    message: "boom".into(),
                })
            },
        })
    }

    fn text_only(id: &str) -> Arc<dyn Adapter> {
        Arc::new(Fake {
            id: id.into(),
            delay: Duration::from_millis(5),
            modality: Modality::TextAndImage,
            result: || {
                Ok(Generation {
                    text: Some("X is the 24th letter.".into()),
                    ..Generation::default()
                })
            },
        })
    }

    fn server(adapters: Vec<Arc<dyn Adapter>>, record_failures: bool) -> (FanoutServer, Arc<MemoryGenerationLog>) {
        let log = Arc::new(MemoryGenerationLog::default());
        let quota = QuotaGuard::new(log.clone(), &QuotaConfig::default());
        let server = FanoutServer::new(ProviderRegistry::from_adapters(adapters), log.clone(), quota, record_failures);
        (server, log)
    }

    fn request(prompt: &str, providers: &[&str]) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            input_image: None,
            providers: providers.iter().map(|&id| ProviderId::from(id)).collect(),
            enhance: false,
        }
    }

    async fn drain(mut events: mpsc::UnboundedReceiver<FanoutEvent>) -> Vec<FanoutEvent> {
        let mut all = Vec::new();
        while let Some(event) = events.recv().await {
            all.push(event);
        }
        all
    }

    #[tokio::test(start_paused = true)]
    async fn red_bicycle_image_then_failure() {
        let (server, log) = server(vec![image_after("a", 100), failure_after("b", 300)], false);
        let user = UserId::new("user_1");
        let conversation = server.conversations().create(user.clone());

        let started = server
            .submit(&user, conversation, request("a red bicycle", &["a", "b"]))
            .await
            .unwrap();
        let turn_id = started.assistant_turn.id;
        let events = drain(started.events).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], FanoutEvent::Branch { view: BranchView::Image { label, .. }, .. } if label.as_str() == "a"));
        assert!(matches!(&events[1], FanoutEvent::Branch { view: BranchView::Failed { message, .. }, content: None, .. }
            if message == "provider returned 500: boom"));
        assert!(matches!(events[2], FanoutEvent::Done { .. }));

        let snapshot = server.conversations().snapshot(conversation, &user).unwrap();
        let turn = snapshot.turns.iter().find(|turn| turn.id == turn_id).unwrap();
        assert!(turn.content.is_none());
        assert_eq!(turn.branches[0].status, BranchStatus::Resolved);
        assert_eq!(turn.branches[1].status, BranchStatus::Failed);

        let records = log.query_completed(&user).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model, "a");
        assert_eq!(records[0].metadata["duration_ms"], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn text_only_provider_fills_content() {
        let (server, _) = server(vec![text_only("c")], false);
        let user = UserId::new("user_1");
        let conversation = server.conversations().create(user.clone());

        let started = server
            .submit(&user, conversation, request("summarize X", &["c"]))
            .await
            .unwrap();
        let events = drain(started.events).await;

        assert!(matches!(&events[0], FanoutEvent::Branch { view: BranchView::TextOnly { .. }, content: Some(content), .. }
            if content == "X is the 24th letter."));
    }

    #[tokio::test]
    async fn validation_failures_leave_no_trace() {
        let (server, _) = server(vec![image_after("a", 1)], false);
        let user = UserId::new("user_1");
        let conversation = server.conversations().create(user.clone());

        for bad in [request("   ", &["a"]), request("a cat", &[]), request("a cat", &["a", "zzz"])] {
            assert!(server.submit(&user, conversation, bad).await.is_err());
        }

        assert!(server.conversations().snapshot(conversation, &user).unwrap().turns.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_providers_collapse() {
        let (server, _) = server(vec![image_after("a", 1)], false);
        let user = UserId::new("user_1");
        let conversation = server.conversations().create(user.clone());

        let started = server
            .submit(&user, conversation, request("a cat", &["a", "a"]))
            .await
            .unwrap();
        assert_eq!(started.assistant_turn.branches.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_rejection_keeps_only_the_user_turn() {
        let (server, log) = server(vec![image_after("a", 1)], false);
        let user = UserId::new("user_1");
        for _ in 0..10 {
            log.insert(GenerationRecord::new(user.clone(), "p", "a", RecordStatus::Completed))
                .await
                .unwrap();
        }
        let conversation = server.conversations().create(user.clone());

        let Err(error) = server.submit(&user, conversation, request("one more", &["a"])).await else {
            panic!("expected quota rejection");
        };
        assert!(matches!(error, FanoutError::QuotaExceeded { ceiling: 10 }));

        let turns = server.conversations().snapshot(conversation, &user).unwrap().turns;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content.as_deref(), Some("one more"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_recorded_only_when_enabled() {
        let user = UserId::new("user_1");
        let req = request("a cat", &["b"]);

        let (quiet, quiet_log) = server(vec![failure_after("b", 1)], false);
        quiet.generate(&user, &"b".into(), &req).await.unwrap_err();
        assert!(quiet_log.snapshot().await.is_empty());

        let (noisy, noisy_log) = server(vec![failure_after("b", 1)], true);
        let error = noisy.generate(&user, &"b".into(), &req).await.unwrap_err();
        assert_eq!(error.status_code(), http::StatusCode::BAD_GATEWAY);
        let records = noisy_log.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RecordStatus::Failed);
        assert_eq!(records[0].error.as_deref(), Some("provider returned 500: boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_generation_reports_the_provider_status() {
        let timed_out: Arc<dyn Adapter> = Arc::new(Fake {
            id: "flux".into(),
            delay: Duration::from_millis(1),
            modality: Modality::Image,
            result: || Err(ProviderError::Timeout { attempts: 3 }),
        });
        let bad_input: Arc<dyn Adapter> = Arc::new(Fake {
            id: "gemini".into(),
            delay: Duration::from_millis(1),
            modality: Modality::TextAndImage,
            result: || Err(ProviderError::InvalidInput("invalid base64".into())),
        });
        let (server, _) = server(vec![timed_out, bad_input], false);
        let user = UserId::new("user_1");
        let req = request("a cat", &[]);

        let error = server.generate(&user, &"flux".into(), &req).await.unwrap_err();
        assert_eq!(error.status_code(), http::StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.error_type(), "timeout_error");

        let error = server.generate(&user, &"gemini".into(), &req).await.unwrap_err();
        assert_eq!(error.status_code(), http::StatusCode::BAD_REQUEST);
        assert!(matches!(error, FanoutError::Generation { ref provider, .. } if provider.as_str() == "gemini"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_generation_counts_toward_quota() {
        let (server, _) = server(vec![image_after("a", 1)], false);
        let user = UserId::new("user_1");
        let req = request("a cat", &[]);

        for _ in 0..10 {
            assert!(server.generate(&user, &"a".into(), &req).await.unwrap().is_success());
        }
        let error = server.generate(&user, &"a".into(), &req).await.unwrap_err();
        assert!(matches!(error, FanoutError::QuotaExceeded { .. }));
        assert_eq!(server.history(&user).await.unwrap().len(), 10);
    }
}
