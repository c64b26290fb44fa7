//! Process configuration, built once at startup from environment variables.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::email::EmailConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::prompts;

/// Default poll interval: 2 minutes.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;

pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Everything the responder needs, passed by reference into each component.
#[derive(Debug, Clone)]
pub struct AssistConfig {
    pub email: EmailConfig,
    pub llm: LlmConfig,
    /// Sleep between two polling cycles.
    pub poll_interval: Duration,
    /// System instruction text (rendered `prompts::BANKING` unless overridden).
    pub system_prompt: String,
}

impl AssistConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let address = required(&lookup, "BANK_ASSIST_EMAIL_ADDRESS")?;
        let password = required(&lookup, "BANK_ASSIST_EMAIL_PASSWORD")?;
        let api_key = lookup("BANK_ASSIST_LLM_API_KEY")
            .or_else(|| lookup("GROQ_API_KEY"))
            .ok_or_else(|| ConfigError::MissingEnvVar("BANK_ASSIST_LLM_API_KEY".to_string()))?;

        let email = EmailConfig {
            imap_host: lookup("BANK_ASSIST_IMAP_HOST")
                .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string()),
            imap_port: parsed(&lookup, "BANK_ASSIST_IMAP_PORT", DEFAULT_IMAP_PORT)?,
            smtp_host: lookup("BANK_ASSIST_SMTP_HOST")
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: parsed(&lookup, "BANK_ASSIST_SMTP_PORT", DEFAULT_SMTP_PORT)?,
            address,
            password: SecretString::from(password),
        };

        let poll_interval_secs: u64 = parsed(
            &lookup,
            "BANK_ASSIST_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BANK_ASSIST_POLL_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let temperature: f32 = parsed(&lookup, "BANK_ASSIST_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "BANK_ASSIST_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let max_tokens: u32 = parsed(&lookup, "BANK_ASSIST_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BANK_ASSIST_MAX_TOKENS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let llm = LlmConfig {
            base_url: lookup("BANK_ASSIST_LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            api_key: SecretString::from(api_key),
            model: lookup("BANK_ASSIST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            max_tokens,
        };

        let system_prompt = match lookup("BANK_ASSIST_SYSTEM_PROMPT_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::PromptFile { path, source })?,
            None => prompts::BANKING.render(),
        };

        Ok(Self {
            email,
            llm,
            poll_interval: Duration::from_secs(poll_interval_secs),
            system_prompt,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BANK_ASSIST_EMAIL_ADDRESS", "desk@bank.test"),
        ("BANK_ASSIST_EMAIL_PASSWORD", "app-password"),
        ("BANK_ASSIST_LLM_API_KEY", "gsk-test"),
    ];

    #[test]
    fn defaults_applied_when_only_required_set() {
        let config = AssistConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.email.address, "desk@bank.test");
        assert_eq!(config.email.password.expose_secret(), "app-password");
        assert_eq!(config.email.imap_host, "imap.gmail.com");
        assert_eq!(config.email.imap_port, 993);
        assert_eq!(config.email.smtp_host, "smtp.gmail.com");
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.llm.max_tokens, 500);
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.system_prompt, prompts::BANKING.render());
    }

    #[test]
    fn missing_password_is_reported_by_name() {
        let err = AssistConfig::from_lookup(lookup_from(&[
            ("BANK_ASSIST_EMAIL_ADDRESS", "desk@bank.test"),
            ("BANK_ASSIST_LLM_API_KEY", "gsk-test"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BANK_ASSIST_EMAIL_PASSWORD")
        );
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let err = AssistConfig::from_lookup(lookup_from(&[
            ("BANK_ASSIST_EMAIL_ADDRESS", "   "),
            ("BANK_ASSIST_EMAIL_PASSWORD", "pw"),
            ("BANK_ASSIST_LLM_API_KEY", "gsk-test"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn groq_api_key_is_accepted_as_fallback() {
        let config = AssistConfig::from_lookup(lookup_from(&[
            ("BANK_ASSIST_EMAIL_ADDRESS", "desk@bank.test"),
            ("BANK_ASSIST_EMAIL_PASSWORD", "pw"),
            ("GROQ_API_KEY", "gsk-legacy"),
        ]))
        .unwrap();
        assert_eq!(config.llm.api_key.expose_secret(), "gsk-legacy");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BANK_ASSIST_POLL_INTERVAL_SECS", "30"),
            ("BANK_ASSIST_MODEL", "llama-3.1-8b-instant"),
            ("BANK_ASSIST_TEMPERATURE", "0.2"),
            ("BANK_ASSIST_MAX_TOKENS", "256"),
            ("BANK_ASSIST_SMTP_PORT", "465"),
            ("BANK_ASSIST_IMAP_HOST", "imap.bank.test"),
        ]);
        let config = AssistConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.llm.max_tokens, 256);
        assert_eq!(config.email.smtp_port, 465);
        assert_eq!(config.email.imap_host, "imap.bank.test");
    }

    #[test]
    fn unparsable_port_is_invalid_value() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BANK_ASSIST_IMAP_PORT", "imaps"));
        let err = AssistConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "BANK_ASSIST_IMAP_PORT"
        ));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BANK_ASSIST_POLL_INTERVAL_SECS", "0"));
        assert!(AssistConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BANK_ASSIST_TEMPERATURE", "3.5"));
        assert!(AssistConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn system_prompt_file_replaces_builtin_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Antworte nur auf Bankfragen.").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let mut pairs: Vec<(&str, &str)> = REQUIRED.to_vec();
        pairs.push(("BANK_ASSIST_SYSTEM_PROMPT_FILE", path.as_str()));
        let config = AssistConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.system_prompt, "Antworte nur auf Bankfragen.");
    }

    #[test]
    fn missing_prompt_file_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BANK_ASSIST_SYSTEM_PROMPT_FILE", "/nonexistent/prompt.md"));
        let err = AssistConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::PromptFile { .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AssistConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("app-password"));
        assert!(!debug.contains("gsk-test"));
    }
}
