use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{
    core::{
        Credential, Error as CoreError, Result as CoreResult,
        domain::{ChatReply, ChatRequest, Message},
        ports::ChatGateway,
    },
    markup::rewrite_math_delimiters,
};

/// Fans one logical request out into independent gateway calls.
#[derive(Clone)]
pub struct CompletionClient {
    gateway: Arc<dyn ChatGateway>,
}

impl CompletionClient {
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self { gateway }
    }

    /// Issues `fan_out` identical requests concurrently and waits for all of them.
    ///
    /// `result[i]` belongs to request `i`. A failing unit never aborts its siblings; it
    /// carries its own error in place of content. Successful content has math
    /// delimiters rewritten. Once issued, units run to completion even if the
    /// returned future is dropped.
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        model: &str,
        temperature: Option<f32>,
        credential: &Credential,
        fan_out: usize,
    ) -> Vec<CoreResult<ChatReply>> {
        let fan_out = fan_out.max(1);
        let request = Arc::new(ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        });

        let mut units = Detached(JoinSet::new());
        for index in 0..fan_out {
            let gateway = self.gateway.clone();
            let request = request.clone();
            let credential = credential.clone();
            units.0.spawn(async move {
                let outcome = gateway.chat_completion(&credential, &request).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<CoreResult<ChatReply>>> = (0..fan_out).map(|_| None).collect();
        while let Some(joined) = units.0.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Err(err) = &outcome {
                        debug!(index, error = %err, "completion unit failed");
                    }
                    slots[index] = Some(outcome.map(postprocess));
                }
                Err(err) => warn!(error = %err, "completion task panicked or was cancelled"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(CoreError::System(
                        "completion task panicked or was cancelled".into(),
                    ))
                })
            })
            .collect()
    }
}

/// Detaches still-running units instead of aborting them when dropped.
struct Detached<T: 'static>(JoinSet<T>);

impl<T: 'static> Drop for Detached<T> {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

fn postprocess(mut reply: ChatReply) -> ChatReply {
    reply.content = rewrite_math_delimiters(&reply.content);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::UsageCounters;
    use async_trait::async_trait;
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    /// Call `n` answers `reply-n` after a delay; calls listed in `failing` return 500.
    struct ScriptedGateway {
        calls: AtomicUsize,
        finished: AtomicUsize,
        failing: Vec<usize>,
        delays_ms: Vec<u64>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedGateway {
        fn new(failing: Vec<usize>, delays_ms: Vec<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                failing,
                delays_ms,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn chat_completion(
            &self,
            _credential: &Credential,
            request: &ChatRequest,
        ) -> CoreResult<ChatReply> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            let delay = self.delays_ms.get(call).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&call) {
                return Err(CoreError::gateway_status(500));
            }
            Ok(ChatReply {
                content: format!(r"reply-{call} \(x\)"),
                usage: Some(UsageCounters {
                    prompt_tokens: 10,
                    completion_tokens: call as u64,
                }),
            })
        }
    }

    fn credential() -> Credential {
        Credential::resolve(Some("sk-test".into()), None).unwrap()
    }

    #[tokio::test]
    async fn one_failing_unit_does_not_disturb_siblings() {
        // Later calls finish first so completion order differs from issue order.
        let gateway = Arc::new(ScriptedGateway::new(vec![1], vec![60, 0, 20]));
        let client = CompletionClient::new(gateway.clone());

        let results = client
            .complete(vec![Message::user("hi")], "m/x", Some(0.7), &credential(), 3)
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.content, "reply-0 $x$");
        assert_eq!(first.usage.unwrap().completion_tokens, 0);

        assert_eq!(
            results[1].as_ref().unwrap_err().to_string(),
            "Error: 500"
        );

        let third = results[2].as_ref().unwrap();
        assert_eq!(third.content, "reply-2 $x$");
        assert_eq!(third.usage.unwrap().completion_tokens, 2);
    }

    #[tokio::test]
    async fn every_unit_gets_the_same_request() {
        let gateway = Arc::new(ScriptedGateway::new(vec![], vec![]));
        let client = CompletionClient::new(gateway.clone());
        let messages = vec![Message::system("sys"), Message::user("hi")];

        client
            .complete(messages.clone(), "m/x", None, &credential(), 4)
            .await;

        let seen = gateway.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|req| req.messages == messages
            && req.model == "m/x"
            && req.temperature.is_none()));
    }

    #[tokio::test]
    async fn zero_fan_out_still_issues_one_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![], vec![]));
        let client = CompletionClient::new(gateway.clone());
        let results = client
            .complete(vec![Message::user("hi")], "m/x", None, &credential(), 0)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn units_run_concurrently() {
        let gateway = Arc::new(ScriptedGateway::new(vec![], vec![200, 200, 200]));
        let client = CompletionClient::new(gateway);
        let started = std::time::Instant::now();
        client
            .complete(vec![Message::user("hi")], "m/x", None, &credential(), 3)
            .await;
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn abandoned_call_still_runs_every_unit() {
        let gateway = Arc::new(ScriptedGateway::new(vec![], vec![80, 80, 80]));
        let client = CompletionClient::new(gateway.clone());

        let waited = tokio::time::timeout(
            Duration::from_millis(10),
            client.complete(vec![Message::user("hi")], "m/x", None, &credential(), 3),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(gateway.finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(gateway.finished.load(Ordering::SeqCst), 3);
    }
}
