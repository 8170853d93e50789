use std::fmt;

use futures::future::BoxFuture;

use crate::error::Result;

/// Ordered list of named attempts. Attempts run one at a time and the first
/// success wins; later attempts are never polled.
pub struct FallbackChain<'a, T> {
    attempts: Vec<(String, BoxFuture<'a, Result<T>>)>,
}

#[derive(Debug)]
pub struct Resolved<T> {
    pub strategy: String,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainExhausted {
    pub failures: Vec<(String, String)>,
}

impl fmt::Display for ChainExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no strategies configured");
        }
        let reasons: Vec<String> = self
            .failures
            .iter()
            .map(|(name, reason)| format!("{}: {}", name, reason))
            .collect();
        write!(f, "{}", reasons.join("; "))
    }
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn attempt(mut self, name: impl Into<String>, run: BoxFuture<'a, Result<T>>) -> Self {
        self.attempts.push((name.into(), run));
        self
    }

    pub async fn run(self) -> std::result::Result<Resolved<T>, ChainExhausted> {
        let mut failures = Vec::new();

        for (name, run) in self.attempts {
            match run.await {
                Ok(value) => {
                    if !failures.is_empty() {
                        tracing::debug!("{} succeeded after {} failed attempts", name, failures.len());
                    }
                    return Ok(Resolved {
                        strategy: name,
                        value,
                    });
                }
                Err(e) => {
                    tracing::debug!("{} failed: {}", name, e);
                    failures.push((name, e.to_string()));
                }
            }
        }

        Err(ChainExhausted { failures })
    }
}

impl<'a, T> Default for FallbackChain<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_first_success_wins() {
        let polled_third = AtomicBool::new(false);

        let resolved = FallbackChain::new()
            .attempt("a", async { Err(Error::Upstream("503".into())) }.boxed())
            .attempt("b", async { Ok(2) }.boxed())
            .attempt(
                "c",
                async {
                    polled_third.store(true, Ordering::SeqCst);
                    Ok(3)
                }
                .boxed(),
            )
            .run()
            .await
            .unwrap();

        assert_eq!(resolved.strategy, "b");
        assert_eq!(resolved.value, 2);
        assert!(!polled_third.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_exhausted_collects_failures_in_order() {
        let err = FallbackChain::<u32>::new()
            .attempt("graph", async { Err(Error::Upstream("403".into())) }.boxed())
            .attempt("arm", async { Err(Error::NotFound("subscription".into())) }.boxed())
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0].0, "graph");
        assert_eq!(err.failures[1].0, "arm");
        assert_eq!(
            err.to_string(),
            "graph: Upstream API error: 403; arm: Not found: subscription"
        );
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let err = FallbackChain::<()>::new().run().await.unwrap_err();
        assert!(err.failures.is_empty());
    }
}
