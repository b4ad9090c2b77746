//! Extraction of values from the service's loosely structured responses.
//!
//! Result documents are not guaranteed to be well-formed markup, so values
//! are taken from between their named markers rather than from a parsed tree.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

struct ResponsePatterns {
    flow_id: Regex,
    certificate: Regex,
    message: Regex,
}

static PATTERNS: OnceLock<ResponsePatterns> = OnceLock::new();

fn patterns() -> &'static ResponsePatterns {
    PATTERNS.get_or_init(|| ResponsePatterns {
        flow_id: Regex::new(r"idflux>(.*)</idflux").expect("Valid regex"),
        certificate: Regex::new(r"<certificat_conformite>(.*)</certificat_conformite>")
            .expect("Valid regex"),
        message: Regex::new(r"(?s)<message>(.*)</message>").expect("Valid regex"),
    })
}

const DPAE_PROFILE: &str = r#"profil="DPAE""#;
const COMPLIANT: &str = "<etat_conformite>OK</etat_conformite>";
const NON_COMPLIANT: &str = "<etat_conformite>KO</etat_conformite>";

/// Trimmed flow identifier from a submission response, if the marker is present.
pub(crate) fn extract_flow_id(body: &str) -> Option<String> {
    capture(&patterns().flow_id, body)
}

#[derive(Debug, Deserialize)]
struct Consultation {
    retours: Returns,
}

#[derive(Debug, Deserialize)]
struct Returns {
    #[serde(default)]
    flux: Vec<Flow>,
}

#[derive(Debug, Deserialize)]
struct Flow {
    #[serde(default)]
    retour: Vec<ReturnRecord>,
}

#[derive(Debug, Deserialize)]
struct ReturnRecord {
    #[serde(default)]
    url: String,
}

/// Every result-document URL listed in a consultation response, in order.
pub(crate) fn result_urls(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let consultation: Consultation = serde_json::from_str(body)?;
    Ok(consultation
        .retours
        .flux
        .into_iter()
        .flat_map(|flow| flow.retour)
        .map(|record| record.url)
        .filter(|url| !url.trim().is_empty())
        .collect())
}

/// What a single result document says about the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResultDocument {
    /// Belongs to another declaration type sharing the flow.
    OtherProfile,
    Compliant { certificate: Option<String> },
    NonCompliant { message: Option<String> },
    /// Neither compliance state is declared.
    Unclassified,
}

pub(crate) fn classify(body: &str) -> ResultDocument {
    if !body.contains(DPAE_PROFILE) {
        return ResultDocument::OtherProfile;
    }
    if body.contains(NON_COMPLIANT) {
        return ResultDocument::NonCompliant {
            message: capture(&patterns().message, body),
        };
    }
    if body.contains(COMPLIANT) {
        return ResultDocument::Compliant {
            certificate: capture(&patterns().certificate, body),
        };
    }
    ResultDocument::Unclassified
}

fn capture(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().trim().to_string())
}
