use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{Credentials, DeclarationSession};
use super::error::DpaeError;
use super::gateway::{GatewayRequest, HttpGateway, APPLICATION_XML, CONTENT_TYPE};
use super::render::DocumentRenderer;

/// Status the authentication endpoint answers with for bad credentials.
const UNPROCESSABLE_ENTITY: u16 = 422;

/// Tokens shorter than this are treated as a malformed answer.
pub const MIN_TOKEN_LEN: usize = 10;

/// Exchanges the account credentials for a session token.
#[derive(Debug, Clone)]
pub struct Authenticator {
    gateway: Arc<dyn HttpGateway>,
    endpoint: String,
}

impl Authenticator {
    pub fn new(gateway: Arc<dyn HttpGateway>, endpoint: impl Into<String>) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
        }
    }

    /// Authenticates the session's credentials and stores the token on it.
    ///
    /// The password is erased from the session as soon as the request
    /// document is built, so a session can only authenticate once.
    pub fn authenticate(&self, session: &mut DeclarationSession) -> Result<(), DpaeError> {
        let token = self.request_token(&mut session.credentials)?;
        session.token = Some(token);
        info!(endpoint = %self.endpoint, "authenticated with declaration service");
        Ok(())
    }

    pub fn request_token(&self, credentials: &mut Credentials) -> Result<String, DpaeError> {
        if credentials.siret.trim().is_empty() || credentials.password.is_empty() {
            return Err(DpaeError::MissingCredentials);
        }

        let document = DocumentRenderer::render_auth(credentials)?;
        let request = GatewayRequest::post(&self.endpoint, document.as_bytes().to_vec())
            .header(CONTENT_TYPE, APPLICATION_XML);
        drop(document);

        let response = self
            .gateway
            .execute(request)
            .map_err(|source| DpaeError::Network {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        if response.status == UNPROCESSABLE_ENTITY {
            warn!(endpoint = %self.endpoint, "credentials rejected");
            return Err(DpaeError::AuthenticationRejected {
                endpoint: self.endpoint.clone(),
            });
        }
        if !response.is_success() {
            return Err(DpaeError::Service {
                endpoint: self.endpoint.clone(),
                status: response.status,
            });
        }

        let length = response.body.chars().count();
        if length < MIN_TOKEN_LEN {
            return Err(DpaeError::MalformedToken {
                endpoint: self.endpoint.clone(),
                length,
            });
        }

        Ok(response.body)
    }
}
