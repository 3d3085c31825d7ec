use std::{collections::HashMap, sync::Arc};

use futures::Stream;
use mosaic_core::{ProviderId, ProviderOutcome};
use mosaic_providers::{Adapter, GenerationInput, run};
use tokio::{
    task::{Id, JoinError, JoinSet},
    time::Instant,
};

use crate::error::{FanoutError, Result};

/// In-flight fan-out of one request
///
/// Outcomes come back in completion order. Dropping a `Dispatch` does
/// not cancel its tasks; they run to completion in the background.
pub struct Dispatch {
    tasks: JoinSet<ProviderOutcome>,
    providers: HashMap<Id, (ProviderId, Instant)>,
}

/// Launch one task per adapter
///
/// Fails before spawning anything when no adapter is selected.
pub fn dispatch(input: GenerationInput, adapters: Vec<Arc<dyn Adapter>>) -> Result<Dispatch> {
    if adapters.is_empty() {
        return Err(FanoutError::Validation("select at least one provider".to_string()));
    }

    let input = Arc::new(input);
    let mut tasks = JoinSet::new();
    let mut providers = HashMap::with_capacity(adapters.len());

    for adapter in adapters {
        let provider = adapter.id().clone();
        let input = Arc::clone(&input);

        let handle = tasks.spawn(async move { run(adapter.as_ref(), &input).await });
        tracing::debug!(provider = %provider, "branch dispatched");
        providers.insert(handle.id(), (provider, Instant::now()));
    }

    mosaic_telemetry::metrics::record_fanout(providers.len());

    Ok(Dispatch { tasks, providers })
}

impl Dispatch {
    /// Branches that have not settled yet
    pub fn remaining(&self) -> usize {
        self.providers.len()
    }

    /// Wait for the next branch to settle
    ///
    /// Returns `None` once every branch has reported.
    pub async fn next(&mut self) -> Option<(ProviderId, ProviderOutcome)> {
        loop {
            match self.tasks.join_next_with_id().await? {
                Ok((id, outcome)) => {
                    self.providers.remove(&id);
                    return Some((outcome.provider.clone(), outcome));
                }
                Err(error) => {
                    if let Some(settled) = self.task_failed(&error) {
                        return Some(settled);
                    }
                }
            }
        }
    }

    /// Wait for every branch, in completion order
    pub async fn settle_all(mut self) -> Vec<(ProviderId, ProviderOutcome)> {
        let mut settled = Vec::with_capacity(self.remaining());
        while let Some(outcome) = self.next().await {
            settled.push(outcome);
        }
        settled
    }

    pub fn into_stream(self) -> impl Stream<Item = (ProviderId, ProviderOutcome)> {
        futures::stream::unfold(self, |mut dispatch| async move {
            dispatch.next().await.map(|settled| (settled, dispatch))
        })
    }

    fn task_failed(&mut self, error: &JoinError) -> Option<(ProviderId, ProviderOutcome)> {
        let Some((provider, started)) = self.providers.remove(&error.id()) else {
            tracing::error!(error = %error, "unknown branch task failed");
            return None;
        };

        let message = if error.is_panic() {
            "provider task panicked"
        } else {
            "provider task was cancelled"
        };
        tracing::error!(provider = %provider, error = %error, "{message}");

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        mosaic_telemetry::metrics::record_branch(provider.as_str(), "failure", started.elapsed());

        Some((provider.clone(), ProviderOutcome::failure(provider, message, duration_ms)))
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        self.tasks.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use futures::StreamExt;
    use mosaic_core::{Modality, OutcomeKind, OutputSize};
    use mosaic_providers::{AdapterDescriptor, Generation, PollPolicy, PollStatus, ProviderError, poll_until};

    use super::*;

    enum Behavior {
        Image(Duration),
        Fail(Duration),
        NeverTerminal,
        Panic,
    }

    struct Fake {
        id: ProviderId,
        behavior: Behavior,
        finished: Arc<AtomicBool>,
    }

    fn fake(id: &str, behavior: Behavior) -> Arc<dyn Adapter> {
        Arc::new(Fake {
            id: id.into(),
            behavior,
            finished: Arc::default(),
        })
    }

    #[async_trait]
    impl Adapter for Fake {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor {
                kind: "images_api",
                modality: Modality::Image,
                expected_size: OutputSize::default(),
            }
        }

        async fn invoke(&self, _input: &GenerationInput) -> mosaic_providers::Result<Generation> {
            let result = match self.behavior {
                Behavior::Image(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Generation {
                        image_url: Some(format!("https://img.test/{}.png", self.id)),
                        ..Generation::default()
                    })
                }
                Behavior::Fail(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(ProviderError::Upstream {
                        status: 500,
                        message: "boom".into(),
                    })
                }
                Behavior::NeverTerminal => {
                    poll_until(PollPolicy::default(), |_| async { Ok(PollStatus::<Generation>::Pending) }).await
                }
                Behavior::Panic => panic!("adapter bug"),
            };
            self.finished.store(true, Ordering::SeqCst);
            result
        }
    }

    fn input() -> GenerationInput {
        GenerationInput {
            prompt: "a red bicycle".into(),
            image: None,
            enhance: false,
        }
    }

    #[tokio::test]
    async fn zero_providers_is_rejected_before_dispatch() {
        let result = dispatch(input(), Vec::new());
        assert!(matches!(result, Err(FanoutError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_arrive_in_completion_order() {
        let adapters = vec![
            fake("slow", Behavior::Image(Duration::from_millis(900))),
            fake("fast", Behavior::Image(Duration::from_millis(100))),
            fake("broken", Behavior::Fail(Duration::from_millis(400))),
        ];

        let settled = dispatch(input(), adapters).unwrap().settle_all().await;

        let order: Vec<_> = settled.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, ["fast", "broken", "slow"]);

        let durations: Vec<_> = settled.iter().map(|(_, outcome)| outcome.duration_ms).collect();
        assert_eq!(durations, [100, 400, 900]);
        assert_eq!(settled[1].1.kind, OutcomeKind::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_each_branch_once() {
        let adapters = vec![
            fake("a", Behavior::Image(Duration::from_millis(20))),
            fake("b", Behavior::Image(Duration::from_millis(10))),
        ];

        let ids: Vec<_> = dispatch(input(), adapters)
            .unwrap()
            .into_stream()
            .map(|(id, _)| id)
            .collect()
            .await;

        assert_eq!(ids, [ProviderId::from("b"), ProviderId::from("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_branch_fails_alone() {
        let adapters = vec![
            fake("panics", Behavior::Panic),
            fake("fine", Behavior::Image(Duration::from_millis(50))),
        ];

        let settled = dispatch(input(), adapters).unwrap().settle_all().await;

        assert_eq!(settled.len(), 2);
        let (panicked, outcome) = &settled[0];
        assert_eq!(panicked.as_str(), "panics");
        assert_eq!(outcome.error_message.as_deref(), Some("provider task panicked"));
        assert!(settled[1].1.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_timeout_does_not_hold_back_siblings() {
        let started = Instant::now();
        let adapters = vec![
            fake("stuck", Behavior::NeverTerminal),
            fake("dalle", Behavior::Image(Duration::from_secs(3))),
        ];

        let mut dispatch = dispatch(input(), adapters).unwrap();

        let (first, outcome) = dispatch.next().await.unwrap();
        assert_eq!(first.as_str(), "dalle");
        assert!(outcome.is_success());
        assert_eq!(started.elapsed(), Duration::from_secs(3));

        let (second, outcome) = dispatch.next().await.unwrap();
        assert_eq!(second.as_str(), "stuck");
        assert_eq!(outcome.error_message.as_deref(), Some("generation timed out after 120 polls"));
        assert_eq!(outcome.duration_ms, 60_000);
        assert!(dispatch.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_dispatch_does_not_cancel_branches() {
        let finished = Arc::new(AtomicBool::new(false));
        let adapter: Arc<dyn Adapter> = Arc::new(Fake {
            id: "dalle".into(),
            behavior: Behavior::Image(Duration::from_millis(100)),
            finished: finished.clone(),
        });

        drop(dispatch(input(), vec![adapter]).unwrap());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(finished.load(Ordering::SeqCst));
    }
}
