use anyhow::{bail, Result};
use once_cell::sync::Lazy;

/// Hosted completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Provider-qualified model resolved from a user-facing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub label: &'static str,
    pub provider: Provider,
    pub model: &'static str,
}

impl ModelSpec {
    /// `provider/model` slug, e.g. `openai/gpt-4o-mini`.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.provider.as_str(), self.model)
    }
}

pub const DEFAULT_LABEL: &str = "OpenAI 4o-mini";

static CATALOG: Lazy<Vec<ModelSpec>> = Lazy::new(|| {
    vec![
        ModelSpec {
            label: "OpenAI 4o-mini",
            provider: Provider::OpenAi,
            model: "gpt-4o-mini",
        },
        ModelSpec {
            label: "OpenAI 4o",
            provider: Provider::OpenAi,
            model: "gpt-4o",
        },
        ModelSpec {
            label: "Claude Haiku 3.5",
            provider: Provider::Anthropic,
            model: "claude-3-5-haiku-20241022",
        },
        ModelSpec {
            label: "Claude Sonnet 3.5",
            provider: Provider::Anthropic,
            model: "claude-3-5-sonnet-20241022",
        },
    ]
});

/// All registered models, in display order.
pub fn catalog() -> &'static [ModelSpec] {
    &CATALOG
}

/// User-facing labels for the selector UI.
pub fn labels() -> Vec<&'static str> {
    CATALOG.iter().map(|spec| spec.label).collect()
}

/// Look up a user-facing label. An unregistered label is a configuration
/// error and fails immediately rather than defaulting.
pub fn resolve(label: &str) -> Result<ModelSpec> {
    match CATALOG.iter().find(|spec| spec.label == label) {
        Some(spec) => Ok(*spec),
        None => bail!(
            "unknown model label: {label:?} (known: {})",
            labels().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_openai_mini() {
        let spec = resolve("OpenAI 4o-mini").unwrap();
        assert_eq!(spec.qualified(), "openai/gpt-4o-mini");
        assert_eq!(spec.provider, Provider::OpenAi);
    }

    #[test]
    fn resolves_claude_haiku() {
        let spec = resolve("Claude Haiku 3.5").unwrap();
        assert_eq!(spec.qualified(), "anthropic/claude-3-5-haiku-20241022");
        assert_eq!(spec.provider, Provider::Anthropic);
    }

    #[test]
    fn unknown_label_fails_fast() {
        let err = resolve("GPT-5 Ultra").unwrap_err();
        assert!(err.to_string().contains("unknown model label"));
    }

    #[test]
    fn default_label_is_registered() {
        assert!(resolve(DEFAULT_LABEL).is_ok());
    }
}
