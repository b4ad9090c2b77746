use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::domain::{DeclarationSession, PollOutcome, MIN_CERTIFICATE_LEN};
use super::error::DpaeError;
use super::gateway::{GatewayRequest, HttpGateway};
use super::response::{classify, result_urls, ResultDocument};

/// Blocks the polling loop between attempts.
pub trait Pause: Debug {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wait and retry budget for result polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Wait before the first attempt.
    pub first_delay: Duration,
    /// Wait before every later attempt.
    pub retry_delay: Duration,
    /// Attempts beyond this count end the loop with a timeout.
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

enum Attempt {
    Pending,
    Certified(String),
    Rejected(String),
}

/// Queries the consultation endpoint until the declaration gets a verdict.
#[derive(Debug, Clone)]
pub struct ResultPoller {
    gateway: Arc<dyn HttpGateway>,
    endpoint: String,
    config: PollingConfig,
    pause: Arc<dyn Pause>,
}

impl ResultPoller {
    pub fn new(
        gateway: Arc<dyn HttpGateway>,
        endpoint: impl Into<String>,
        config: PollingConfig,
    ) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
            config,
            pause: Arc::new(ThreadPause),
        }
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    /// Polls until a certificate, a rejection, or the attempt budget runs out.
    ///
    /// Transient conditions (unreachable service, unreadable listing, no
    /// result yet) start a new attempt. A rejection is final. A session that
    /// already holds a verdict is answered from the session.
    pub fn poll(&self, session: &mut DeclarationSession) -> Result<PollOutcome, DpaeError> {
        if let Some(outcome) = stored_outcome(session) {
            debug!(flow_id = ?session.flow_id(), "declaration already resolved");
            return Ok(outcome);
        }

        let flow_id = session.flow_id().ok_or(DpaeError::MissingFlowId)?.to_string();
        let token = session.token().ok_or(DpaeError::MissingToken)?.to_string();
        let consultation_url = format!("{}/{}", self.endpoint.trim_end_matches('/'), flow_id);

        let mut attempts: u32 = 0;
        loop {
            let delay = if attempts == 0 {
                self.config.first_delay
            } else {
                self.config.retry_delay
            };
            self.pause.pause(delay);

            if attempts > self.config.max_attempts {
                warn!(flow_id = %flow_id, attempts, "no answer within retry budget");
                return Ok(PollOutcome::TimedOut { flow_id, attempts });
            }
            attempts += 1;
            debug!(flow_id = %flow_id, attempt = attempts, "polling for results");

            match self.attempt(&consultation_url, &token, &flow_id, attempts)? {
                Attempt::Pending => continue,
                Attempt::Certified(certificate) => {
                    info!(flow_id = %flow_id, attempts, "declaration certified");
                    session.certificate = Some(certificate.clone());
                    return Ok(PollOutcome::Certified(certificate));
                }
                Attempt::Rejected(message) => {
                    warn!(flow_id = %flow_id, attempts, "declaration rejected");
                    session.rejection = Some(message.clone());
                    return Ok(PollOutcome::Rejected(message));
                }
            }
        }
    }

    fn attempt(
        &self,
        consultation_url: &str,
        token: &str,
        flow_id: &str,
        attempt: u32,
    ) -> Result<Attempt, DpaeError> {
        let listing = match self.fetch(consultation_url, token) {
            Ok(body) => body,
            Err(err) if err.is_retryable() => {
                warn!(flow_id, attempt, error = %err, "consultation failed, retrying");
                return Ok(Attempt::Pending);
            }
            Err(err) => return Err(err),
        };

        let urls = match result_urls(&listing) {
            Ok(urls) => urls,
            Err(err) => {
                warn!(flow_id, attempt, error = %err, "unreadable consultation answer, retrying");
                return Ok(Attempt::Pending);
            }
        };
        if urls.is_empty() {
            debug!(flow_id, attempt, "no result document yet");
            return Ok(Attempt::Pending);
        }

        for url in &urls {
            let document = match self.fetch(url, token) {
                Ok(body) => body,
                Err(err) if err.is_retryable() => {
                    warn!(flow_id, attempt, error = %err, "result document unavailable, retrying");
                    return Ok(Attempt::Pending);
                }
                Err(err) => return Err(err),
            };

            match classify(&document) {
                ResultDocument::OtherProfile => {
                    debug!(flow_id, %url, "skipping result for another profile");
                }
                ResultDocument::NonCompliant { message } => {
                    let message = message.filter(|text| !text.is_empty()).ok_or_else(|| {
                        DpaeError::malformed(url, "non-conformity without message", &document)
                    })?;
                    return Ok(Attempt::Rejected(message));
                }
                ResultDocument::Unclassified => {
                    return Err(DpaeError::malformed(
                        url,
                        "compliance state missing",
                        &document,
                    ));
                }
                ResultDocument::Compliant { certificate } => {
                    let certificate = certificate
                        .filter(|value| value.chars().count() >= MIN_CERTIFICATE_LEN)
                        .ok_or_else(|| {
                            DpaeError::malformed(url, "certificate missing or too short", &document)
                        })?;
                    return Ok(Attempt::Certified(certificate));
                }
            }
        }

        Ok(Attempt::Pending)
    }

    fn fetch(&self, url: &str, token: &str) -> Result<String, DpaeError> {
        let response = self
            .gateway
            .execute(GatewayRequest::get(url).bearer_token(token))
            .map_err(|source| DpaeError::Network {
                endpoint: url.to_string(),
                source,
            })?;
        if !response.is_success() {
            return Err(DpaeError::Service {
                endpoint: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

fn stored_outcome(session: &DeclarationSession) -> Option<PollOutcome> {
    if let Some(certificate) = session.certificate() {
        return Some(PollOutcome::Certified(certificate.to_string()));
    }
    session
        .rejection()
        .map(|message| PollOutcome::Rejected(message.to_string()))
}

impl PollOutcome {
    /// Converts a rejection or a timeout into its tagged error.
    pub fn into_result(self, flow_id: &str) -> Result<String, DpaeError> {
        match self {
            PollOutcome::Certified(certificate) => Ok(certificate),
            PollOutcome::Rejected(message) => Err(DpaeError::NonConformity {
                flow_id: flow_id.to_string(),
                message,
            }),
            PollOutcome::TimedOut { flow_id, attempts } => {
                Err(DpaeError::Timeout { flow_id, attempts })
            }
        }
    }
}
