//! Fixtures and fakes shared by the workflow unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};

use super::domain::{Contract, Credentials, DeclarationSession, Employee, Employer, Password};
use super::gateway::{GatewayError, GatewayRequest, GatewayResponse, HttpGateway};
use super::poller::Pause;

pub const TOKEN: &str = "jeton-0123456789abcdef";
pub const FLOW_ID: &str = "FLUX0123456789012345678";

pub fn credentials() -> Credentials {
    Credentials {
        siret: "12345678901234".into(),
        last_name: "Dupont".into(),
        first_name: "Jean".into(),
        password: Password::new("p&ss<word>"),
        service: "25".into(),
    }
}

pub fn session() -> DeclarationSession {
    let employer = Employer {
        designation: "Boulangerie L'Épi d'Or".into(),
        siret: "12345678901234".into(),
        ape: "1071C".into(),
        urssaf_code: "117".into(),
        address: "3, rue des Lilas".into(),
        town: "Lyon".into(),
        postal: "69003".into(),
        phone: String::new(),
        health_service: "42".into(),
    };
    let employee = Employee {
        surname: "Lefèvre".into(),
        first_name: "Chloé".into(),
        sex: 2,
        nir: "2850769123456".into(),
        nir_key: "42".into(),
        birth_date: NaiveDate::from_ymd_opt(1985, 7, 14).expect("valid date"),
        birth_town: "Saint-Denis".into(),
        birth_department: "974".into(),
    };
    let contract = Contract {
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
        start_time: NaiveTime::from_hms_opt(8, 30, 0).expect("valid time"),
        end_date: None,
        nature_code: "CDI".into(),
    };
    DeclarationSession::new(credentials(), employer, employee, contract)
}

pub fn authenticated_session() -> DeclarationSession {
    let mut session = session();
    session.credentials.clear_password();
    session.token = Some(TOKEN.to_string());
    session
}

pub fn submitted_session() -> DeclarationSession {
    let mut session = authenticated_session();
    session.flow_id = Some(FLOW_ID.to_string());
    session
}

pub fn submission_response(flow_id: &str) -> String {
    format!("<?xml version=\"1.0\"?><retour><idflux>{flow_id}</idflux></retour>")
}

/// Consultation listing with one flow holding every given result URL.
pub fn consultation(urls: &[&str]) -> String {
    let records: Vec<_> = urls
        .iter()
        .map(|url| serde_json::json!({ "url": url, "nature": "AR" }))
        .collect();
    serde_json::json!({ "retours": { "flux": [{ "id": FLOW_ID, "retour": records }] } })
        .to_string()
}

/// DPAE result document; `value` is the certificate for `OK` and the message for `KO`.
pub fn result_document(state: &str, value: &str) -> String {
    let detail = if state == "OK" {
        format!("<certificat_conformite>{value}</certificat_conformite>")
    } else {
        format!("<message>{value}</message>")
    };
    format!(
        "<?xml version=\"1.0\"?>\n<retour profil=\"DPAE\">\n<etat_conformite>{state}</etat_conformite>\n{detail}\n</retour>"
    )
}

/// Answers requests from a fixed script and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<GatewayResponse, GatewayError>>>,
    fallback: Option<GatewayResponse>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.push(Ok(GatewayResponse::new(status, body)))
    }

    pub fn fail(self, error: GatewayError) -> Self {
        self.push(Err(error))
    }

    /// Response used once the script is exhausted.
    pub fn otherwise(mut self, status: u16, body: impl Into<String>) -> Self {
        self.fallback = Some(GatewayResponse::new(status, body));
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn push(self, entry: Result<GatewayResponse, GatewayError>) -> Self {
        self.script.lock().expect("script lock").push_back(entry);
        self
    }
}

impl HttpGateway for ScriptedGateway {
    fn execute(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.requests.lock().expect("requests lock").push(request);
        if let Some(entry) = self.script.lock().expect("script lock").pop_front() {
            return entry;
        }
        self.fallback
            .clone()
            .ok_or_else(|| GatewayError::Connect("script exhausted".into()))
    }
}

#[derive(Debug, Default)]
pub struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn recorded(&self) -> Vec<Duration> {
        self.waits.lock().expect("pause lock").clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.waits.lock().expect("pause lock").push(duration);
    }
}
