use crate::cancel::CancelToken;
use crate::client::NichesClient;
use crate::domain::{FailureKind, FetchRequest, FetchResult};
use crate::retry::BackoffPolicy;

pub struct CategoryFetcher<C> {
    client: C,
    policy: BackoffPolicy,
}

impl<C: NichesClient> CategoryFetcher<C> {
    pub fn new(client: C, policy: BackoffPolicy) -> Self {
        Self { client, policy }
    }

    pub fn fetch(&self, request: FetchRequest, cancel: &CancelToken) -> FetchResult {
        let mut retry = 0u32;
        loop {
            if cancel.is_cancelled() {
                return cancelled(&request);
            }

            let err = match self.client.download(&request) {
                Ok(bytes) if bytes.is_empty() => {
                    tracing::debug!(%request, "empty page");
                    return FetchResult::Empty;
                }
                Ok(bytes) => {
                    tracing::debug!(%request, bytes = bytes.len(), "page downloaded");
                    return FetchResult::Success { bytes };
                }
                Err(err) => err,
            };

            retry += 1;
            let Some(delay) = self.policy.delay_for(retry) else {
                tracing::warn!(%request, attempts = retry, error = %err, "retries exhausted");
                return FetchResult::Failure {
                    kind: FailureKind::ExhaustedRetries,
                    message: format!("{request}: {retry} attempts failed, last error: {err}"),
                };
            };

            tracing::warn!(
                %request,
                attempt = retry,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "fetch failed, retrying"
            );
            if cancel.wait(delay) {
                return cancelled(&request);
            }
        }
    }
}

fn cancelled(request: &FetchRequest) -> FetchResult {
    FetchResult::Failure {
        kind: FailureKind::Cancelled,
        message: format!("{request}: cancelled before completion"),
    }
}
