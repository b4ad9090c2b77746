use std::io::Read;
use std::time::Duration;

use dpae_edi::config::AppConfig;
use dpae_edi::workflows::dpae::{
    DeclarationClient, DeclarationSession, DpaeError, ErrorKind, GatewayError, PollOutcome,
    PollingConfig,
};
use flate2::read::GzDecoder;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "jeton-0123456789abcdef";
const FLOW_ID: &str = "FLUX0123456789012345678";
const CERTIFICATE: &str = "CERT-2024-000042";

/// The client under test blocks, so the mock server is driven from a
/// separate runtime and the client is called from the plain test thread.
struct Harness {
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("test runtime");
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.server.uri(), suffix)
    }

    fn config(&self, max_attempts: u32) -> AppConfig {
        let mut config = AppConfig::default();
        config.endpoints.auth = self.url("/authentifier_dpae");
        config.endpoints.submit = self.url("/deposer-dsn/1.0/");
        config.endpoints.consultation = self.url("/lister-retours-flux/2.0/");
        config.http.timeout = Duration::from_secs(5);
        config.polling = PollingConfig {
            first_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            max_attempts,
        };
        config
    }

    fn received(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    fn received_on(&self, route: &str) -> Vec<Request> {
        self.received()
            .into_iter()
            .filter(|request| request.url.path() == route)
            .collect()
    }

    fn accept_credentials(&self) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/authentifier_dpae"))
                .and(header("content-type", "application/xml"))
                .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN)),
        );
    }

    fn accept_declaration(&self) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/deposer-dsn/1.0/"))
                .and(header("content-encoding", "gzip"))
                .and(header("authorization", format!("DSNLogin jeton={TOKEN}").as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "<?xml version=\"1.0\"?><retour><idflux>{FLOW_ID}</idflux></retour>"
                ))),
        );
    }

    fn list_results(&self, urls: &[String]) -> Mock {
        let records: Vec<_> = urls
            .iter()
            .map(|url| serde_json::json!({ "url": url }))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/lister-retours-flux/2.0/{FLOW_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "retours": { "flux": [{ "id": FLOW_ID, "retour": records }] }
            })))
    }

    fn serve_document(&self, route: &str, body: String) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body)),
        );
    }
}

fn declaration() -> DeclarationSession {
    serde_json::from_str(include_str!("fixtures/declaration.json")).expect("fixture parses")
}

fn result_document(profile: &str, state: &str, detail: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<retour profil=\"{profile}\">\n<etat_conformite>{state}</etat_conformite>\n{detail}\n</retour>"
    )
}

fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .expect("gzip body");
    decoded
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn declaration_is_certified_after_pending_poll() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/authentifier_dpae"))
            .and(body_string_contains(
                "<motdepasse>s3cr&amp;t&lt;pw&gt;</motdepasse>",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN)),
    );
    harness.accept_declaration();
    harness.mount(harness.list_results(&[]).up_to_n_times(1));
    harness.mount(harness.list_results(&[
        harness.url("/resultats/dsn"),
        harness.url("/resultats/dpae"),
    ]));
    harness.serve_document(
        "/resultats/dsn",
        result_document("DSN", "KO", "<message>not ours</message>"),
    );
    harness.serve_document(
        "/resultats/dpae",
        result_document(
            "DPAE",
            "OK",
            &format!("<certificat_conformite>{CERTIFICATE}</certificat_conformite>"),
        ),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let mut session = declaration();
    let outcome = client.submit(&mut session).expect("submitted");

    assert_eq!(outcome, PollOutcome::Certified(CERTIFICATE.to_string()));
    assert_eq!(session.flow_id(), Some(FLOW_ID));
    assert_eq!(session.certificate(), Some(CERTIFICATE));
    assert!(session.credentials.password.is_empty());

    let submissions = harness.received_on("/deposer-dsn/1.0/");
    assert_eq!(submissions.len(), 1);
    let sent = gunzip(&submissions[0].body);
    assert!(contains(&sent, b"encoding=\"ISO-8859-1\""));
    assert!(contains(&sent, b"<SA_PRENOM>Chlo\xE9</SA_PRENOM>"));
    assert!(contains(&sent, b"<CO_DATE_FIN_CDD>2024-08-31</CO_DATE_FIN_CDD>"));
    assert!(contains(&sent, b"<FO_TEST_INDICATOR>1</FO_TEST_INDICATOR>"));
    assert!(!contains(&sent, b"s3cr"));

    let retained = session.transmitted_document.as_deref().expect("retained");
    assert!(retained.contains("<SA_DEPARTEMENT_NAISSANCE>97</SA_DEPARTEMENT_NAISSANCE>"));
    assert!(!retained.contains("s3cr"));

    assert_eq!(
        harness
            .received_on(&format!("/lister-retours-flux/2.0/{FLOW_ID}"))
            .len(),
        2
    );
}

#[test]
fn non_conformity_is_reported_with_its_reason() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.accept_declaration();
    harness.mount(harness.list_results(&[harness.url("/resultats/dpae")]));
    harness.serve_document(
        "/resultats/dpae",
        result_document(
            "DPAE",
            "KO",
            "<message>\n  Numero de securite sociale invalide (invalid social security number)\n</message>",
        ),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let mut session = declaration();
    let outcome = client.submit(&mut session).expect("submitted");

    let message = "Numero de securite sociale invalide (invalid social security number)";
    assert_eq!(outcome, PollOutcome::Rejected(message.to_string()));
    assert_eq!(session.rejection(), Some(message));

    let err = outcome.into_result(FLOW_ID).expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::NonConformity);
    assert!(err.to_string().contains("invalid social security number"));
}

#[test]
fn rejected_credentials_stop_before_submission() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/authentifier_dpae"))
            .respond_with(ResponseTemplate::new(422)),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let mut session = declaration();
    let err = client.submit(&mut session).expect_err("bad credentials");

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(!err.to_string().contains("s3cr"));
    assert_eq!(harness.received().len(), 1);
}

#[test]
fn refused_submission_is_a_service_error() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/deposer-dsn/1.0/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error")),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let err = client
        .submit(&mut declaration())
        .expect_err("submission refused");

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.to_string().contains("500"));
    assert!(harness
        .received_on(&format!("/lister-retours-flux/2.0/{FLOW_ID}"))
        .is_empty());
}

#[test]
fn unavailable_consultation_is_retried() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.accept_declaration();
    harness.mount(
        Mock::given(method("GET"))
            .and(path(format!("/lister-retours-flux/2.0/{FLOW_ID}")))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2),
    );
    harness.mount(harness.list_results(&[harness.url("/resultats/dpae")]));
    harness.serve_document(
        "/resultats/dpae",
        result_document(
            "DPAE",
            "OK",
            &format!("<certificat_conformite>{CERTIFICATE}</certificat_conformite>"),
        ),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let outcome = client.submit(&mut declaration()).expect("submitted");

    assert!(outcome.is_certified());
    assert_eq!(
        harness
            .received_on(&format!("/lister-retours-flux/2.0/{FLOW_ID}"))
            .len(),
        3
    );
}

#[test]
fn polling_gives_up_after_retry_budget() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.accept_declaration();
    harness.mount(harness.list_results(&[]));

    let client = DeclarationClient::from_config(&harness.config(2)).expect("client");
    let mut session = declaration();
    let outcome = client.submit(&mut session).expect("submitted");

    assert_eq!(
        outcome,
        PollOutcome::TimedOut {
            flow_id: FLOW_ID.to_string(),
            attempts: 3
        }
    );
    assert!(!session.is_resolved());
    assert_eq!(
        harness
            .received_on(&format!("/lister-retours-flux/2.0/{FLOW_ID}"))
            .len(),
        3
    );
}

#[test]
fn latin1_rejection_reason_keeps_its_accents() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.accept_declaration();
    harness.mount(harness.list_results(&[harness.url("/resultats/dpae")]));
    let body = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<retour profil=\"DPAE\">\n<etat_conformite>KO</etat_conformite>\n<message>Num\xE9ro de s\xE9curit\xE9 sociale invalide</message>\n</retour>";
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/resultats/dpae"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.to_vec(), "application/xml; charset=ISO-8859-1"),
            ),
    );

    let client = DeclarationClient::from_config(&harness.config(5)).expect("client");
    let mut session = declaration();
    let outcome = client.submit(&mut session).expect("submitted");

    let message = "Num\u{e9}ro de s\u{e9}curit\u{e9} sociale invalide";
    assert_eq!(outcome, PollOutcome::Rejected(message.to_string()));
    assert_eq!(session.rejection(), Some(message));
}

#[test]
fn slow_authentication_times_out_as_network_error() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/authentifier_dpae"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(TOKEN)
                    .set_delay(Duration::from_secs(2)),
            ),
    );
    let mut config = harness.config(5);
    config.http.timeout = Duration::from_millis(300);

    let client = DeclarationClient::from_config(&config).expect("client");
    let mut session = declaration();
    let err = client.submit(&mut session).expect_err("timed out");

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(matches!(
        err,
        DpaeError::Network {
            source: GatewayError::Timeout,
            ..
        }
    ));
    assert!(session.token.is_none());
    assert!(harness.received_on("/deposer-dsn/1.0/").is_empty());
}

#[test]
fn slow_consultation_is_retried() {
    let harness = Harness::start();
    harness.accept_credentials();
    harness.accept_declaration();
    harness.mount(
        Mock::given(method("GET"))
            .and(path(format!("/lister-retours-flux/2.0/{FLOW_ID}")))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .up_to_n_times(1),
    );
    harness.mount(harness.list_results(&[harness.url("/resultats/dpae")]));
    harness.serve_document(
        "/resultats/dpae",
        result_document(
            "DPAE",
            "OK",
            &format!("<certificat_conformite>{CERTIFICATE}</certificat_conformite>"),
        ),
    );
    let mut config = harness.config(5);
    config.http.timeout = Duration::from_millis(300);

    let client = DeclarationClient::from_config(&config).expect("client");
    let outcome = client.submit(&mut declaration()).expect("submitted");

    assert_eq!(outcome, PollOutcome::Certified(CERTIFICATE.to_string()));
    assert_eq!(
        harness
            .received_on(&format!("/lister-retours-flux/2.0/{FLOW_ID}"))
            .len(),
        2
    );
}
