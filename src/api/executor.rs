//! Uniform request execution: status classification, retry and escalation.
//!
//! | status | outcome |
//! |--------|---------|
//! | 2xx | response |
//! | 404, 409 | [`FsError::NotFound`] |
//! | 416 | empty response (range past EOF) |
//! | 401 | [`FsError::AccessTokenExpired`]; the registry unmounts the tenant |
//! | 429 + `Retry-After` | same request re-issued after the delay, unbounded |
//! | none (transport) | same request re-issued after a fixed delay, unbounded |
//! | anything else | reported, then [`FsError::HttpError`] |

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{FsError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

/// Largest request body echoed into failure reports.
const REPORT_BODY_LIMIT: usize = 1024;

#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn HttpTransport>,
    transport_retry_delay: Duration,
}

impl Executor {
    pub fn new(transport: Arc<dyn HttpTransport>, transport_retry_delay: Duration) -> Self {
        Self {
            transport,
            transport_retry_delay,
        }
    }

    /// Send `request`, retrying as the status table dictates.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        loop {
            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) if e.is_transport() => {
                    debug!(
                        caller = request.caller,
                        error = %e,
                        "no response, retrying after {:?}",
                        self.transport_retry_delay
                    );
                    sleep(self.transport_retry_delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match response.status {
                200..=299 => return Ok(response),
                404 | 409 => {
                    debug!(caller = request.caller, status = response.status, "not found");
                    return Err(FsError::NotFound(format!("not found in {}", request.caller)));
                }
                416 => {
                    debug!(caller = request.caller, "range not satisfiable, empty result");
                    return Ok(HttpResponse::empty(416));
                }
                401 => {
                    error!(caller = request.caller, "access token rejected");
                    return Err(FsError::AccessTokenExpired);
                }
                429 => match retry_after(&response) {
                    Some(delay) => {
                        debug!(
                            caller = request.caller,
                            "rate limited, retrying after {}s",
                            delay.as_secs()
                        );
                        sleep(delay).await;
                        continue;
                    }
                    None => {
                        report_failure(request, &response, "429 without Retry-After");
                        return Err(FsError::RateLimited {
                            caller: request.caller,
                        });
                    }
                },
                status => {
                    report_failure(request, &response, "unexpected status");
                    return Err(FsError::HttpError {
                        caller: request.caller,
                        status,
                    });
                }
            }
        }
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("Retry-After")?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Observability sink for unclassified failures.
fn report_failure(request: &HttpRequest, response: &HttpResponse, reason: &str) {
    let arg = request
        .header_value("Dropbox-API-Arg")
        .map(str::to_string)
        .or_else(|| {
            (request.body.len() <= REPORT_BODY_LIMIT)
                .then(|| String::from_utf8(request.body.clone()).ok())
                .flatten()
        })
        .unwrap_or_default();

    if (500..=599).contains(&response.status) {
        warn!(
            caller = request.caller,
            status = response.status,
            url = %request.url,
            "{}",
            reason
        );
    } else {
        error!(
            caller = request.caller,
            status = response.status,
            url = %request.url,
            request = %arg,
            response = %response.body_string(),
            "{}",
            reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn request() -> HttpRequest {
        HttpRequest::post("getMetadata", "https://api.test/2/files/get_metadata")
            .body(br#"{"path":"/a"}"#.to_vec())
    }

    fn executor(transport: Arc<MockTransport>) -> Executor {
        Executor::new(transport, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_success_passthrough() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::new(200, "{}")));
        let resp = executor(transport.clone()).execute(&request()).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_statuses() {
        for status in [404u16, 409] {
            let transport = MockTransport::new(move |_| Ok(HttpResponse::new(status, "")));
            let err = executor(transport).execute(&request()).await.unwrap_err();
            assert!(matches!(err, FsError::NotFound(_)), "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_range_not_satisfiable_is_empty_success() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::new(416, "ignored")));
        let resp = executor(transport).execute(&request()).await.unwrap();
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_escalates() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::new(401, "expired")));
        let err = executor(transport.clone())
            .execute(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AccessTokenExpired));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_honored_once_per_429() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = MockTransport::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(HttpResponse::new(429, "").with_header("Retry-After", "3"))
            } else {
                Ok(HttpResponse::new(200, "{}"))
            }
        });

        let start = Instant::now();
        let resp = executor(transport.clone()).execute(&request()).await.unwrap();
        assert_eq!(resp.status, 200);

        let times = transport.times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_secs(3));
        assert!(times[2] - times[1] >= Duration::from_secs(3));
        assert!(Instant::now() - start >= Duration::from_secs(6));

        let requests = transport.requests();
        assert!(requests.iter().all(|r| r.body == requests[0].body));
        assert!(requests.iter().all(|r| r.url == requests[0].url));
    }

    #[tokio::test]
    async fn test_429_without_retry_after_fails() {
        let transport = MockTransport::new(|_| Ok(HttpResponse::new(429, "")));
        let err = executor(transport.clone())
            .execute(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::RateLimited { .. }));
        assert_eq!(transport.requests().len(), 1);

        let transport = MockTransport::new(|_| {
            Ok(HttpResponse::new(429, "").with_header("Retry-After", "soon"))
        });
        assert!(executor(transport).execute(&request()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retries_after_delay() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = MockTransport::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FsError::Transport("timed out".into()))
            } else {
                Ok(HttpResponse::new(200, "{}"))
            }
        });

        executor(transport.clone()).execute(&request()).await.unwrap();
        let times = transport.times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_other_status_fails_without_retry() {
        for status in [400u16, 500, 503] {
            let transport = MockTransport::new(move |_| Ok(HttpResponse::new(status, "boom")));
            let err = executor(transport.clone())
                .execute(&request())
                .await
                .unwrap_err();
            assert!(matches!(err, FsError::HttpError { status: s, .. } if s == status));
            assert_eq!(transport.requests().len(), 1);
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let resp = HttpResponse::new(429, "").with_header("retry-after", " 7 ");
        assert_eq!(retry_after(&resp), Some(Duration::from_secs(7)));
        assert_eq!(retry_after(&HttpResponse::new(429, "")), None);
    }
}
