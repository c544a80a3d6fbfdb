//! HTTP plumbing shared by the network runtimes.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::{MimirError, Result};

/// Default request timeout for backend calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 500;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MimirError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Pass successful responses through; map everything else to an error.
pub(crate) async fn check_status(response: Response, backend: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(MimirError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(MimirError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            Err(MimirError::Api {
                status: code,
                message: format!("{backend} API error: {status}: {excerpt}"),
            })
        }
    }
}
