use std::time::Duration;

use tracing::{info, warn};

use crate::{
    gemini::ImageGenerator,
    models::{DataUri, GenerationResult},
};

/// Fixed-delay retry for image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Pause after a failed call. Empty responses are retried without it.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, delay: Duration::from_millis(2000) }
    }
}

/// Calls `generator` until it yields an image or the policy runs out.
///
/// Never fails: every fault is logged and absorbed, and `None` means no
/// attempt produced an image.
pub async fn generate_with_retry(
    generator: &dyn ImageGenerator,
    source: &DataUri,
    prompt: &str,
    aspect_ratio: &str,
    policy: &RetryPolicy,
) -> Option<GenerationResult> {
    let attempts = policy.max_retries.saturating_add(1);
    for attempt in 1..=attempts {
        match generator.generate_image(source, prompt, aspect_ratio).await {
            Ok(Some(result)) => return Some(result),
            Ok(None) => {
                info!(attempt, attempts, "Generation returned no image");
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Generation attempt failed");
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    warn!(attempts, "Giving up on generation, no image produced");
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Plays back a scripted list of outcomes, then keeps failing.
    pub(crate) struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<Option<GenerationResult>, GeminiError>>>,
        pub calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(script: Vec<Result<Option<GenerationResult>, GeminiError>>) -> Self {
            Self { script: Mutex::new(script.into()), calls: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate_image(
            &self,
            _source: &DataUri,
            _prompt: &str,
            _aspect_ratio: &str,
        ) -> Result<Option<GenerationResult>, GeminiError> {
            *self.calls.lock() += 1;
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(GeminiError::Http("script exhausted".into())))
        }
    }

    pub(crate) fn rendered(tag: &str) -> GenerationResult {
        GenerationResult {
            variation: 0,
            image: DataUri::from_bytes("image/png", tag.as_bytes()),
            description: None,
        }
    }

    fn fault() -> Result<Option<GenerationResult>, GeminiError> {
        Err(GeminiError::Api { status: 503, body: "overloaded".into() })
    }

    fn source() -> DataUri {
        DataUri::from_bytes("image/png", b"plot")
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_k_faults() {
        let policy = RetryPolicy::default();
        for k in 0..=policy.max_retries {
            let mut script: Vec<_> = (0..k).map(|_| fault()).collect();
            script.push(Ok(Some(rendered("ok"))));
            let generator = ScriptedGenerator::new(script);

            let result = generate_with_retry(&generator, &source(), "p", "9:16", &policy).await;
            assert_eq!(result, Some(rendered("ok")));
            assert_eq!(*generator.calls.lock(), k + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_gives_none_after_all_attempts() {
        let policy = RetryPolicy { max_retries: 2, delay: Duration::from_millis(2000) };
        let generator = ScriptedGenerator::new(vec![]);
        let started = tokio::time::Instant::now();

        let result = generate_with_retry(&generator, &source(), "p", "9:16", &policy).await;
        assert_eq!(result, None);
        assert_eq!(*generator.calls.lock(), 3);
        // delays only between attempts, not after the last one
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4000) && elapsed < Duration::from_millis(6000), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_responses_are_retried_without_delay() {
        let policy = RetryPolicy::default();
        let generator = ScriptedGenerator::new(vec![Ok(None), Ok(None), Ok(Some(rendered("late")))]);
        let started = tokio::time::Instant::now();

        let result = generate_with_retry(&generator, &source(), "p", "9:16", &policy).await;
        assert_eq!(result, Some(rendered("late")));
        assert!(started.elapsed() < policy.delay);
    }

    #[tokio::test]
    async fn huge_retry_budget_still_attempts_and_stops_on_success() {
        let policy = RetryPolicy { max_retries: u32::MAX, delay: Duration::ZERO };
        let generator = ScriptedGenerator::new(vec![Ok(None), Ok(Some(rendered("first try")))]);
        assert_eq!(generate_with_retry(&generator, &source(), "p", "9:16", &policy).await, Some(rendered("first try")));
        assert_eq!(*generator.calls.lock(), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_attempt() {
        let policy = RetryPolicy { max_retries: 0, delay: Duration::ZERO };
        let generator = ScriptedGenerator::new(vec![Ok(None), Ok(Some(rendered("never")))]);
        assert_eq!(generate_with_retry(&generator, &source(), "p", "9:16", &policy).await, None);
        assert_eq!(*generator.calls.lock(), 1);
    }
}
