use std::fmt::{self, Debug};
use std::time::Duration;

use tokio::runtime::Runtime;
use zeroize::Zeroizing;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const AUTHORIZATION: &str = "Authorization";
pub const APPLICATION_XML: &str = "application/xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound exchange with the declaration service.
#[derive(Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    /// Wiped on drop: the authentication body carries the password.
    pub body: Zeroizing<Vec<u8>>,
}

impl GatewayRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Zeroizing::new(Vec::new()),
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Zeroizing::new(body),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Adds the `DSNLogin` authorization scheme carrying the session token.
    pub fn bearer_token(self, token: &str) -> Self {
        self.header(AUTHORIZATION, format!("DSNLogin jeton={token}"))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// Header values and bodies carry tokens and passwords.
impl Debug for GatewayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(name, _)| *name).collect();
        f.debug_struct("GatewayRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &names)
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unable to build request: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("http runtime unavailable: {0}")]
    Runtime(String),
}

/// Blocking transport used by every declaration phase.
pub trait HttpGateway: Debug {
    fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Wraps the async reqwest client so the sequential declaration phases can
/// block on each exchange without exposing async details.
///
/// Every exchange runs through `block_on` on a private runtime, so the
/// gateway must be used from synchronous code: calling it from inside an
/// async task panics.
pub struct ReqwestGateway {
    client: reqwest::Client,
    runtime: Runtime,
}

impl ReqwestGateway {
    /// Builds the client and its private runtime. Not usable from async code.
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| GatewayError::Runtime(err.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;
        Ok(Self { client, runtime })
    }

    fn map_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_builder() {
            GatewayError::Request(err.to_string())
        } else if err.is_body() || err.is_decode() {
            GatewayError::Body(err.to_string())
        } else {
            GatewayError::Connect(err.to_string())
        }
    }
}

impl Debug for ReqwestGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestGateway").finish_non_exhaustive()
    }
}

impl HttpGateway for ReqwestGateway {
    fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let GatewayRequest {
            method,
            url,
            headers,
            mut body,
        } = request;

        self.runtime.block_on(async {
            let mut builder = match method {
                Method::Get => self.client.get(&url),
                // The buffer reqwest sends from is out of reach once handed over.
                Method::Post => self.client.post(&url).body(std::mem::take(&mut *body)),
            };
            for (name, value) in headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(Self::map_error)?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            // The body is drained here so the connection is released on every path.
            let bytes = response.bytes().await.map_err(Self::map_error)?;

            Ok(GatewayResponse {
                status,
                body: decode_body(content_type.as_deref(), &bytes),
            })
        })
    }
}

/// Decodes a response body using the declared charset.
///
/// The service speaks ISO-8859-1; bodies without a charset are read as
/// UTF-8 when valid and as Latin-1 otherwise, so no byte is ever lost.
pub(crate) fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> String {
    if declared_charset(content_type).is_some_and(is_latin1) {
        return decode_latin1(bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_latin1(bytes),
    }
}

fn declared_charset(content_type: Option<&str>) -> Option<&str> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

fn is_latin1(charset: &str) -> bool {
    ["iso-8859-1", "iso8859-1", "latin1", "latin-1"]
        .iter()
        .any(|name| charset.eq_ignore_ascii_case(name))
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}
