//! Template filtering: `@token@` placeholders substituted from a per-test
//! property set.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{Result, VerifierError};

/// Placeholder substitutions for template filtering. Built once per test and
/// immutable afterwards (only read during filtering).
#[derive(Debug, Clone, Default)]
pub struct FilterProperties {
    values: BTreeMap<String, String>,
}

impl FilterProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }
}

/// Render `template` into `output`, substituting every `@token@` placeholder.
///
/// Placeholder names are ASCII alphanumerics plus `_` and `-`; any other
/// `@...@` span (prose, email addresses, dotted coordinates) is passed
/// through verbatim.
///
/// Fails with [`VerifierError::Template`] on I/O errors, non-UTF-8 template
/// content, or placeholders with no corresponding property.
pub fn filter_file(template: &Path, output: &Path, properties: &FilterProperties) -> Result<()> {
    let text = fs::read_to_string(template).map_err(|err| VerifierError::Template {
        path: template.to_path_buf(),
        reason: err.to_string(),
    })?;

    let rendered = substitute(&text, properties).map_err(|token| VerifierError::Template {
        path: template.to_path_buf(),
        reason: format!("unresolved placeholder `@{token}@`"),
    })?;

    fs::write(output, rendered).map_err(|err| VerifierError::Template {
        path: output.to_path_buf(),
        reason: err.to_string(),
    })?;

    tracing::debug!(
        target: "kiln.verifier",
        template = %template.display(),
        output = %output.display(),
        "filtered template"
    );
    Ok(())
}

/// On failure returns the first unresolved token name.
fn substitute(text: &str, properties: &FilterProperties) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('@') else {
            out.push('@');
            rest = after;
            continue;
        };

        let name = &after[..end];
        if !is_token_name(name) {
            // Not a placeholder (e.g. an email address); keep the `@` literal
            // and rescan from the next character.
            out.push('@');
            rest = after;
            continue;
        }

        match properties.get(name) {
            Some(value) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => return Err(name.to_string()),
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_tokens() {
        let mut props = FilterProperties::new();
        props.set("baseurl", "file:///tmp/test");
        props.set("basedir", "/tmp/test");

        let out = substitute("<url>@baseurl@/repo</url><dir>@basedir@</dir>", &props).unwrap();
        assert_eq!(out, "<url>file:///tmp/test/repo</url><dir>/tmp/test</dir>");
    }

    #[test]
    fn unresolved_token_fails() {
        let props = FilterProperties::new();
        let err = substitute("<url>@baseurl@</url>", &props).unwrap_err();
        assert_eq!(err, "baseurl");
    }

    #[test]
    fn literal_at_signs_are_preserved() {
        let props = FilterProperties::new();
        assert_eq!(
            substitute("mail user@example org@ and lone @", &props).unwrap(),
            "mail user@example org@ and lone @"
        );
    }

    #[test]
    fn dotted_spans_are_not_placeholders() {
        let props = FilterProperties::new();
        assert_eq!(
            substitute("see a@b.c@d and user@example.com@home", &props).unwrap(),
            "see a@b.c@d and user@example.com@home"
        );
    }

    #[test]
    fn filter_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let template = tmp.path().join("settings-template.xml");
        let output = tmp.path().join("settings.xml");
        fs::write(&template, "<localRepository>@basedir@/repo</localRepository>").unwrap();

        let mut props = FilterProperties::new();
        props.set("basedir", "/work");

        filter_file(&template, &output, &props).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "<localRepository>/work/repo</localRepository>"
        );
    }

    #[test]
    fn missing_template_is_a_template_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = filter_file(
            &tmp.path().join("absent.xml"),
            &tmp.path().join("out.xml"),
            &FilterProperties::new(),
        )
        .unwrap_err();
        assert!(matches!(err, VerifierError::Template { .. }));
    }
}
