use std::io::Write as _;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use super::domain::{DeclarationSession, FLOW_ID_LEN};
use super::error::{fragment, DpaeError};
use super::gateway::{
    GatewayRequest, HttpGateway, APPLICATION_XML, CONTENT_ENCODING, CONTENT_TYPE,
};
use super::render::DocumentRenderer;
use super::response::extract_flow_id;

/// Renders, encodes and posts the declaration, then records the flow id.
#[derive(Debug, Clone)]
pub struct Transmitter {
    gateway: Arc<dyn HttpGateway>,
    endpoint: String,
}

impl Transmitter {
    pub fn new(gateway: Arc<dyn HttpGateway>, endpoint: impl Into<String>) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
        }
    }

    /// Sends the declaration and returns the flow identifier assigned to it.
    ///
    /// The rendered text is kept on the session as the record of what was
    /// sent. A successful send discards any verdict from a previous send.
    pub fn send(&self, session: &mut DeclarationSession) -> Result<String, DpaeError> {
        let token = session.token().ok_or(DpaeError::MissingToken)?.to_string();

        let document = DocumentRenderer::render_declaration(session)?;
        session.transmitted_document = Some(document.clone());

        let payload = compress(&encode_latin1(&document)?)?;
        debug!(
            endpoint = %self.endpoint,
            document_bytes = document.len(),
            payload_bytes = payload.len(),
            "posting declaration"
        );

        let request = GatewayRequest::post(&self.endpoint, payload)
            .header(CONTENT_TYPE, APPLICATION_XML)
            .header(CONTENT_ENCODING, "gzip")
            .bearer_token(&token);
        let response = self
            .gateway
            .execute(request)
            .map_err(|source| DpaeError::Network {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        if !response.is_success() {
            debug!(status = response.status, body = %fragment(&response.body), "submission refused");
            return Err(DpaeError::Service {
                endpoint: self.endpoint.clone(),
                status: response.status,
            });
        }

        let flow_id = extract_flow_id(&response.body).ok_or_else(|| {
            DpaeError::malformed(&self.endpoint, "idflux not found", &response.body)
        })?;
        let length = flow_id.chars().count();
        if length != FLOW_ID_LEN {
            return Err(DpaeError::FlowIdLength { flow_id, length });
        }

        session.flow_id = Some(flow_id.clone());
        session.certificate = None;
        session.rejection = None;
        info!(flow_id = %flow_id, "declaration submitted");

        Ok(flow_id)
    }
}

/// Transcodes text to ISO-8859-1, failing on the first unrepresentable character.
pub fn encode_latin1(text: &str) -> Result<Vec<u8>, DpaeError> {
    text.chars()
        .enumerate()
        .map(|(position, character)| {
            u8::try_from(character).map_err(|_| DpaeError::Unencodable {
                character,
                position,
            })
        })
        .collect()
}

pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, DpaeError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes).map_err(DpaeError::Compression)?;
    encoder.finish().map_err(DpaeError::Compression)
}
