//! Pre-hire declaration workflow: authenticate, transmit, then poll for the
//! compliance verdict.

mod auth;
pub mod domain;
mod error;
mod gateway;
mod poller;
mod render;
mod response;
mod sanitize;
mod template;
mod transmit;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;

pub use auth::{Authenticator, MIN_TOKEN_LEN};
pub use domain::{
    Contract, Credentials, DeclarationSession, Employee, Employer, Password, PollOutcome,
    SubmissionMode, FLOW_ID_LEN, MIN_CERTIFICATE_LEN,
};
pub use error::{DpaeError, ErrorKind};
pub use gateway::{
    GatewayError, GatewayRequest, GatewayResponse, HttpGateway, Method, ReqwestGateway,
};
pub use poller::{Pause, PollingConfig, ResultPoller, ThreadPause};
pub use render::DocumentRenderer;
pub use sanitize::{escape_xml, sanitize, FIELD_WIDTH};
pub use template::TemplateError;
pub use transmit::{compress, encode_latin1, Transmitter};

/// Runs the three declaration phases in order over one shared gateway.
#[derive(Debug, Clone)]
pub struct DeclarationClient {
    authenticator: Authenticator,
    transmitter: Transmitter,
    poller: ResultPoller,
}

impl DeclarationClient {
    pub fn new(gateway: Arc<dyn HttpGateway>, config: &AppConfig) -> Self {
        Self {
            authenticator: Authenticator::new(gateway.clone(), config.endpoints.auth.clone()),
            transmitter: Transmitter::new(gateway.clone(), config.endpoints.submit.clone()),
            poller: ResultPoller::new(
                gateway,
                config.endpoints.consultation.clone(),
                config.polling,
            ),
        }
    }

    /// Client backed by [`ReqwestGateway`] with the configured request timeout.
    ///
    /// The returned client blocks on every exchange; call it from synchronous
    /// code only, never from within an async runtime.
    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let gateway = ReqwestGateway::new(config.http.timeout)?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.poller = self.poller.with_pause(pause);
        self
    }

    /// Authenticates, sends the declaration and waits for its verdict.
    ///
    /// A session that already holds a verdict is answered without any exchange.
    pub fn submit(&self, session: &mut DeclarationSession) -> Result<PollOutcome, DpaeError> {
        if session.is_resolved() {
            return self.poller.poll(session);
        }

        self.authenticator.authenticate(session)?;
        let flow_id = self.transmitter.send(session)?;
        info!(flow_id = %flow_id, mode = session.mode.code(), "waiting for declaration result");
        self.poller.poll(session)
    }
}
