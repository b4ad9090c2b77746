use std::collections::BTreeMap;

use super::sanitize::{escape_xml, sanitize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template `{template}` requires field `{field}`, which is absent")]
    MissingField {
        template: &'static str,
        field: String,
    },
    #[error("template `{template}` uses unknown filter `{filter}`")]
    UnknownFilter {
        template: &'static str,
        filter: String,
    },
    #[error("template `{template}` has an unterminated placeholder at byte {offset}")]
    Unterminated { template: &'static str, offset: usize },
}

/// Values available to a template, keyed by dotted field name.
pub(crate) type TemplateFields = BTreeMap<&'static str, String>;

/// Embedded XML document template.
///
/// Placeholders are written `{{ field }}` (verbatim), `{{ field | escape }}`
/// (XML escaping) or `{{ field | xml }}` (full free-text sanitization). A
/// placeholder naming a field that is not in the map is an error, never an
/// empty substitution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Template {
    name: &'static str,
    source: &'static str,
}

pub(crate) const AUTH_TEMPLATE: Template = Template {
    name: "auth",
    source: include_str!("../../../templates/auth.xml"),
};

pub(crate) const DECLARATION_TEMPLATE: Template = Template {
    name: "dpae",
    source: include_str!("../../../templates/dpae.xml"),
};

impl Template {
    #[cfg(test)]
    pub(crate) const fn inline(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    pub(crate) fn render(&self, fields: &TemplateFields) -> Result<String, TemplateError> {
        let capacity = self.source.len() + fields.values().map(String::len).sum::<usize>();
        let mut out = String::with_capacity(capacity);
        let mut rest = self.source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let end = body.find("}}").ok_or(TemplateError::Unterminated {
                template: self.name,
                offset: offset + start,
            })?;

            self.substitute(body[..end].trim(), fields, &mut out)?;

            let advance = start + 2 + end + 2;
            offset += advance;
            rest = &rest[advance..];
        }
        out.push_str(rest);

        Ok(out)
    }

    fn substitute(
        &self,
        expression: &str,
        fields: &TemplateFields,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let (field, filter) = match expression.split_once('|') {
            Some((field, filter)) => (field.trim(), Some(filter.trim())),
            None => (expression, None),
        };

        let value = fields
            .get(field)
            .ok_or_else(|| TemplateError::MissingField {
                template: self.name,
                field: field.to_string(),
            })?;

        match filter {
            None => out.push_str(value),
            Some("escape") => out.push_str(&escape_xml(value)),
            Some("xml") => out.push_str(&sanitize(value)),
            Some(other) => {
                return Err(TemplateError::UnknownFilter {
                    template: self.name,
                    filter: other.to_string(),
                })
            }
        }

        Ok(())
    }
}
