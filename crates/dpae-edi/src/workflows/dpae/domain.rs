use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum length of a compliance certificate returned by the service.
pub const MIN_CERTIFICATE_LEN: usize = 10;

/// Exact length of a flow identifier issued by the submission endpoint.
pub const FLOW_ID_LEN: usize = 23;

/// Whether the declaration is a dry run against the service or a real filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionMode {
    #[default]
    Test,
    Production,
}

impl SubmissionMode {
    /// Indicator code carried in the declaration document.
    pub fn code(self) -> u16 {
        match self {
            SubmissionMode::Test => 1,
            SubmissionMode::Production => 120,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0 | 1 => Some(Self::Test),
            120 => Some(Self::Production),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SubmissionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;
        SubmissionMode::from_code(code).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unsupported test indicator {code} (expected 1 or 120)"
            ))
        })
    }
}

/// Account password. Redacted in every formatted output and zeroed on drop.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Password(<cleared>)")
        } else {
            f.write_str("Password(<redacted>)")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(rename = "SIRET", default)]
    pub siret: String,
    #[serde(rename = "Nom", default)]
    pub last_name: String,
    #[serde(rename = "Prenom", default)]
    pub first_name: String,
    #[serde(rename = "MotDePasse", default)]
    pub password: Password,
    #[serde(rename = "Service", default)]
    pub service: String,
}

impl Credentials {
    /// Erase the password in place. Called as soon as the authentication
    /// document has been built.
    pub fn clear_password(&mut self) {
        self.password.zeroize();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employer {
    #[serde(default)]
    pub designation: String,
    #[serde(rename = "SIRET", default)]
    pub siret: String,
    #[serde(rename = "APE", default)]
    pub ape: String,
    #[serde(rename = "URSSAFCode", default)]
    pub urssaf_code: String,
    #[serde(rename = "Adress", default)]
    pub address: String,
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub postal: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub health_service: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employee {
    #[serde(default)]
    pub surname: String,
    #[serde(rename = "ChristianName", default)]
    pub first_name: String,
    pub sex: u8,
    #[serde(rename = "NIR", default)]
    pub nir: String,
    #[serde(rename = "NIRKey", default)]
    pub nir_key: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub birth_town: String,
    #[serde(default)]
    pub birth_department: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contract {
    #[serde(rename = "StartContractDate", deserialize_with = "deserialize_date")]
    pub start_date: NaiveDate,
    #[serde(rename = "StartContractTime", deserialize_with = "deserialize_time")]
    pub start_time: NaiveTime,
    #[serde(
        rename = "EndContractDate",
        default,
        deserialize_with = "deserialize_optional_date"
    )]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub nature_code: String,
}

/// Single handle carried through authentication, transmission and polling.
///
/// Input fields come from the caller; the remaining fields are filled in
/// place by each phase and are what the caller inspects afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeclarationSession {
    #[serde(rename = "TestIndicator", default)]
    pub mode: SubmissionMode,
    #[serde(rename = "Identifiants")]
    pub credentials: Credentials,
    pub employer: Employer,
    pub employee: Employee,
    pub contract: Contract,
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(skip)]
    pub transmitted_document: Option<String>,
    #[serde(skip)]
    pub flow_id: Option<String>,
    #[serde(skip)]
    pub certificate: Option<String>,
    #[serde(skip)]
    pub rejection: Option<String>,
}

impl DeclarationSession {
    pub fn new(
        credentials: Credentials,
        employer: Employer,
        employee: Employee,
        contract: Contract,
    ) -> Self {
        Self {
            mode: SubmissionMode::default(),
            credentials,
            employer,
            employee,
            contract,
            token: None,
            transmitted_document: None,
            flow_id: None,
            certificate: None,
            rejection: None,
        }
    }

    pub fn with_mode(mut self, mode: SubmissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Token issued by the authentication endpoint, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn flow_id(&self) -> Option<&str> {
        self.flow_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn certificate(&self) -> Option<&str> {
        self.certificate.as_deref().filter(|value| !value.is_empty())
    }

    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref().filter(|value| !value.is_empty())
    }

    /// A declaration is resolved once it holds a certificate or a rejection.
    pub fn is_resolved(&self) -> bool {
        self.certificate().is_some() || self.rejection().is_some()
    }

    /// Applies the remote service's field conventions before rendering.
    pub(crate) fn normalize(&mut self) {
        self.employer.health_service = "01".to_string();
        self.employee.birth_department =
            normalize_department(&self.employee.birth_department);
    }
}

impl fmt::Display for DeclarationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dpae employer={} flow={}",
            self.employer.designation,
            self.flow_id().unwrap_or("-")
        )
    }
}

/// Final state of a declaration as reported by the result poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Certified(String),
    Rejected(String),
    TimedOut { flow_id: String, attempts: u32 },
}

impl PollOutcome {
    pub fn is_certified(&self) -> bool {
        matches!(self, PollOutcome::Certified(_))
    }
}

/// `00` is the provisional "born abroad" department and maps to `99`;
/// overseas departments (`971`..`976`) are sent as their first two digits.
pub(crate) fn normalize_department(raw: &str) -> String {
    if raw == "00" {
        return "99".to_string();
    }
    raw.chars().take(2).collect()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}
