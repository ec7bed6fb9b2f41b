//! Honeypot bot detection filter.

use anyhow::{bail, Result};
use serde::Deserialize;

use super::Filter;
use crate::domain::{AfterOutcome, BeforeOutcome, FilterArgs, Request, Response};

/// Honeypot settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HoneypotSettings {
    /// Name of the hidden field
    pub name: String,

    /// Label rendered next to the field
    pub label: String,

    /// Field markup; `{name}` and `{label}` are substituted
    pub template: String,

    /// Wrapper markup; `{template}` is substituted
    pub container: String,
}

impl Default for HoneypotSettings {
    fn default() -> Self {
        Self {
            name: "honeypot".to_string(),
            label: "Fill This Field".to_string(),
            template: r#"<label>{label}</label><input type="text" name="{name}" value="">"#
                .to_string(),
            container: r#"<div style="display:none">{template}</div>"#.to_string(),
        }
    }
}

/// Hides a trap field in HTML forms and fails requests that fill it in.
pub struct HoneypotFilter {
    settings: HoneypotSettings,
}

impl HoneypotFilter {
    pub fn new(settings: HoneypotSettings) -> Self {
        Self { settings }
    }

    fn markup(&self) -> String {
        let field = self
            .settings
            .template
            .replace("{label}", &self.settings.label)
            .replace("{name}", &self.settings.name);
        self.settings.container.replace("{template}", &field)
    }
}

impl Filter for HoneypotFilter {
    fn before(&self, request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        let filled = request
            .form
            .get(&self.settings.name)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);

        if filled {
            bail!(
                "honeypot field '{}' was filled in; the request looks like a bot",
                self.settings.name
            );
        }

        Ok(BeforeOutcome::Continue)
    }

    fn after(
        &self,
        _request: &Request,
        response: &Response,
        _args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        if !response.is_html() || !response.body.contains("</form>") {
            return Ok(AfterOutcome::Keep);
        }

        let body = response
            .body
            .replace("</form>", &format!("{}</form>", self.markup()));
        Ok(AfterOutcome::Replace(response.clone().with_body(body)))
    }
}
