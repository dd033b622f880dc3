//! Bounded generation calls

use std::time::Duration;
use tracing::warn;

use docqa_core::{Error, GenerationResult, Generator, Result, RetryPolicy};

/// Generate under a time ceiling, retrying throttled attempts per `retry`
///
/// Each attempt gets the full `timeout`; an attempt that exceeds it is
/// dropped and reported as [`Error::Timeout`].
pub async fn generate_within(
    generator: &dyn Generator,
    prompt: &str,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<GenerationResult> {
    retry
        .run("generate", || async {
            match tokio::time::timeout(timeout, generator.generate(prompt)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        model = %generator.model_id(),
                        timeout_secs = timeout.as_secs(),
                        "generation timed out"
                    );
                    Err(Error::Timeout(format!(
                        "{} did not answer within {} seconds",
                        generator.model_id(),
                        timeout.as_secs()
                    )))
                }
            }
        })
        .await
}
