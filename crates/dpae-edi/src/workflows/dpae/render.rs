use zeroize::{Zeroize, Zeroizing};

use super::domain::{Credentials, DeclarationSession};
use super::template::{TemplateError, TemplateFields, AUTH_TEMPLATE, DECLARATION_TEMPLATE};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Fills the authentication and declaration templates from structured input.
pub struct DocumentRenderer;

impl DocumentRenderer {
    /// Renders the authentication request and erases the password from
    /// `credentials`, whether or not rendering succeeded.
    pub fn render_auth(credentials: &mut Credentials) -> Result<Zeroizing<String>, TemplateError> {
        let mut fields = FieldSet::default();
        fields.required("credentials.siret", &credentials.siret);
        fields.required("credentials.last_name", &credentials.last_name);
        fields.required("credentials.first_name", &credentials.first_name);
        fields.secret("credentials.password", credentials.password.expose());
        fields.required("credentials.service", &credentials.service);

        let rendered = AUTH_TEMPLATE.render(&fields.0).map(Zeroizing::new);

        credentials.clear_password();
        fields.0.values_mut().for_each(Zeroize::zeroize);

        rendered
    }

    /// Normalizes the session in place, then renders the declaration document.
    pub fn render_declaration(session: &mut DeclarationSession) -> Result<String, TemplateError> {
        session.normalize();

        let employer = &session.employer;
        let employee = &session.employee;
        let contract = &session.contract;

        let mut fields = FieldSet::default();
        fields.optional("mode", session.mode.code().to_string());

        fields.required("employer.siret", &employer.siret);
        fields.required("employer.designation", &employer.designation);
        fields.required("employer.ape", &employer.ape);
        fields.required("employer.urssaf_code", &employer.urssaf_code);
        fields.required("employer.address", &employer.address);
        fields.required("employer.postal", &employer.postal);
        fields.required("employer.town", &employer.town);
        fields.optional("employer.phone", employer.phone.trim());
        fields.required("employer.health_service", &employer.health_service);

        fields.required("employee.surname", &employee.surname);
        fields.required("employee.first_name", &employee.first_name);
        if matches!(employee.sex, 1 | 2) {
            fields.optional("employee.sex", employee.sex.to_string());
        }
        fields.required("employee.nir", &employee.nir);
        fields.required("employee.nir_key", &employee.nir_key);
        fields.optional(
            "employee.birth_date",
            employee.birth_date.format(DATE_FORMAT).to_string(),
        );
        fields.required("employee.birth_town", &employee.birth_town);
        fields.required("employee.birth_department", &employee.birth_department);

        fields.optional(
            "contract.start_date",
            contract.start_date.format(DATE_FORMAT).to_string(),
        );
        fields.optional(
            "contract.start_time",
            contract.start_time.format(TIME_FORMAT).to_string(),
        );
        fields.optional(
            "contract.end_date",
            contract
                .end_date
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        );
        fields.required("contract.nature_code", &contract.nature_code);

        DECLARATION_TEMPLATE.render(&fields.0)
    }
}

#[derive(Default)]
struct FieldSet(TemplateFields);

impl FieldSet {
    /// Blank values are left out so the template reports them as absent.
    fn required(&mut self, key: &'static str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.0.insert(key, value.to_string());
        }
    }

    /// Inserted verbatim: surrounding whitespace may be significant.
    fn secret(&mut self, key: &'static str, value: &str) {
        if !value.is_empty() {
            self.0.insert(key, value.to_string());
        }
    }

    fn optional(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }
}
