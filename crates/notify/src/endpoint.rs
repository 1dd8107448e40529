//! Minijinja templating for recipient endpoint URLs.
//!
//! The endpoint is a template such as
//! `https://maker.ifttt.com/trigger/{{ trigger }}/with/key/{{ key }}`.
//! Both variables are percent-encoded before rendering and the encoded
//! payload query is appended to the result, joined with `&` when the
//! template already carries a query of its own.
//!
//! A fresh [`minijinja::Environment`] is created per render call since
//! the template is a dynamic string, not a pre-registered file.

use minijinja::context;

use crate::error::{RelayError, TransportError};

/// Variables every endpoint template has to reference.
const REQUIRED_VARS: [&str; 2] = ["key", "trigger"];

/// A validated endpoint URL template.
#[derive(Debug, Clone)]
pub struct EndpointTemplate {
    source: String,
}

impl EndpointTemplate {
    /// Parse and check `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the template has syntax errors or
    /// does not reference both `key` and `trigger`.
    pub fn new(source: impl Into<String>) -> Result<Self, RelayError> {
        let source = source.into();
        let declared = {
            let env = build_env();
            let template = env
                .template_from_str(&source)
                .map_err(|e| RelayError::Config(format!("invalid endpoint template: {e}")))?;
            template.undeclared_variables(false)
        };
        let missing: Vec<&str> = REQUIRED_VARS
            .into_iter()
            .filter(|var| !declared.contains(*var))
            .collect();
        if !missing.is_empty() {
            return Err(RelayError::Config(format!(
                "endpoint template must reference {}",
                missing.join(" and ")
            )));
        }

        Ok(Self { source })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the URL for one recipient key and trigger, with `query` appended.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Endpoint`] if rendering fails or the result
    /// is not an absolute URL.
    pub fn render(&self, key: &str, trigger: &str, query: &str) -> Result<String, TransportError> {
        let url = self.render_with(&urlencoding::encode(key), trigger, query)?;
        reqwest::Url::parse(&url).map_err(|e| TransportError::Endpoint(format!("{e}: {url}")))?;
        Ok(url)
    }

    /// The URL as it should appear in logs: `shown_key` is inserted as is.
    pub fn render_for_log(&self, shown_key: &str, trigger: &str, query: &str) -> String {
        self.render_with(shown_key, trigger, query)
            .unwrap_or_else(|_| trigger.to_string())
    }

    fn render_with(&self, key: &str, trigger: &str, query: &str) -> Result<String, TransportError> {
        let env = build_env();
        let ctx = context! {
            key => key,
            trigger => urlencoding::encode(trigger).into_owned(),
        };
        let url = env
            .render_str(&self.source, ctx)
            .map_err(|e| TransportError::Endpoint(e.to_string()))?;
        Ok(append_query(&url, query))
    }
}

/// Append an encoded `?a=1&b=2` query to `url`.
///
/// Joins with `&` when the rendered URL already has a query of its own and
/// keeps any `#fragment` last.
fn append_query(url: &str, query: &str) -> String {
    let params = query.trim_start_matches('?');
    if params.is_empty() {
        return url.to_string();
    }

    let (base, fragment) = url.split_at(url.find('#').unwrap_or(url.len()));
    let sep = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{base}{sep}{params}{fragment}")
}

/// Build a configured minijinja environment with the `env()` global.
fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.add_function("env", env_function);
    env
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
