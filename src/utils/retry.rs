use std::time::Duration;

use crate::error::FinchError;

/// Retry `op` up to `attempts` times with exponential backoff, but only while
/// the error is transient. Validation and auth errors surface on the first
/// try.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    what: &str,
    mut op: F,
) -> Result<T, FinchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FinchError>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < attempts => {
                let delay = base_delay * 2u32.pow(attempt);
                log::warn!(
                    "{what} failed (attempt {}/{attempts}): {err}; retrying in {:?}",
                    attempt + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // Unreachable in practice: the loop always returns. Kept for totality.
    Err(last_err.unwrap_or_else(|| FinchError::Transient {
        service: what.to_owned(),
        message: "retries exhausted".to_owned(),
    }))
}
