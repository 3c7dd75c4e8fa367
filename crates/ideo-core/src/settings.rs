use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::ReferenceZone;

/// Hard ceiling on references sent to the model per request.
pub const MAX_REFERENCES: usize = 25;

/// Prompt framing, chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateVariant {
    #[default]
    DirectTopic,
    UsTrendAdaptation,
    NarrativePersonal,
}

impl std::str::FromStr for TemplateVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "direct-topic" => Ok(Self::DirectTopic),
            "us-trend-adaptation" => Ok(Self::UsTrendAdaptation),
            "narrative-personal" => Ok(Self::NarrativePersonal),
            other => Err(format!("unknown template: {other}")),
        }
    }
}

/// Order in which references reach the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceOrder {
    /// Whatever order the store returns (insertion order for PostgREST).
    #[default]
    Store,
    /// Most viewed first.
    ViewsDesc,
}

impl std::str::FromStr for ReferenceOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "store" => Ok(Self::Store),
            "views-desc" => Ok(Self::ViewsDesc),
            other => Err(format!("unknown reference order: {other}")),
        }
    }
}

/// What happens when the usage row cannot be written after a successful
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageCommitPolicy {
    /// Return the idea anyway and accept an undercount.
    #[default]
    BestEffort,
    /// Fail the request.
    Required,
}

impl std::str::FromStr for UsageCommitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "best-effort" => Ok(Self::BestEffort),
            "required" => Ok(Self::Required),
            other => Err(format!("unknown usage commit policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub store_url: String,
    pub store_key: String,
    pub daily_limit: u32,
    pub max_references: usize,
    pub template: TemplateVariant,
    pub reference_order: ReferenceOrder,
    /// Optional secondary column shown next to each title, e.g. "channel".
    pub reference_label: Option<String>,
    pub time_zone: ReferenceZone,
    pub usage_commit: UsageCommitPolicy,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            store_url: String::new(),
            store_key: String::new(),
            daily_limit: 20,
            max_references: MAX_REFERENCES,
            template: TemplateVariant::default(),
            reference_order: ReferenceOrder::default(),
            reference_label: None,
            time_zone: ReferenceZone::default(),
            usage_commit: UsageCommitPolicy::default(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Overlay environment variables. `lookup` is `std::env::var(..).ok()` in
    /// production. Returns one message per value that could not be parsed;
    /// those fields keep their previous value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if let Some(v) = first(&["IDEO_PROVIDER"]) {
            self.provider = v.trim().to_string();
        }
        if let Some(v) = first(&["IDEO_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = v;
        }
        if let Some(v) = first(&["IDEO_MODEL"]) {
            self.model = v.trim().to_string();
        }
        if let Some(v) = first(&["IDEO_STORE_URL", "SUPABASE_URL"]) {
            self.store_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = first(&["IDEO_STORE_KEY", "SUPABASE_KEY"]) {
            self.store_key = v;
        }
        if let Some(v) = first(&["IDEO_REFERENCE_LABEL"]) {
            self.reference_label = Some(v.trim().to_string());
        }

        overlay(
            &mut self.daily_limit,
            first(&["IDEO_DAILY_LIMIT"]),
            "IDEO_DAILY_LIMIT",
            &mut warnings,
        );
        overlay(
            &mut self.max_references,
            first(&["IDEO_MAX_REFERENCES"]),
            "IDEO_MAX_REFERENCES",
            &mut warnings,
        );
        overlay(
            &mut self.template,
            first(&["IDEO_TEMPLATE"]),
            "IDEO_TEMPLATE",
            &mut warnings,
        );
        overlay(
            &mut self.reference_order,
            first(&["IDEO_REFERENCE_ORDER"]),
            "IDEO_REFERENCE_ORDER",
            &mut warnings,
        );
        overlay(
            &mut self.time_zone,
            first(&["IDEO_TIME_ZONE"]),
            "IDEO_TIME_ZONE",
            &mut warnings,
        );
        overlay(
            &mut self.usage_commit,
            first(&["IDEO_USAGE_COMMIT"]),
            "IDEO_USAGE_COMMIT",
            &mut warnings,
        );
        overlay(
            &mut self.request_timeout_secs,
            first(&["IDEO_REQUEST_TIMEOUT_SECS"]),
            "IDEO_REQUEST_TIMEOUT_SECS",
            &mut warnings,
        );

        self.max_references = self.max_references.clamp(1, MAX_REFERENCES);
        warnings
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.daily_limit == 0 {
            return Err("dailyLimit must be a positive integer".to_string());
        }
        if self.store_url.is_empty() {
            return Err("storeUrl is not set (IDEO_STORE_URL or SUPABASE_URL)".to_string());
        }
        if !ai_configured(self) {
            return Err(format!(
                "AI provider '{}' is not configured (model and API key required)",
                self.provider
            ));
        }
        Ok(())
    }

    /// One-line description safe to log: secrets are reduced to set/unset.
    pub fn redacted_summary(&self) -> String {
        format!(
            "provider={} model={} hasKey={} storeUrl={} hasStoreKey={} dailyLimit={} maxReferences={} template={:?} order={:?} timeZone={} usageCommit={:?} timeoutSecs={}",
            self.provider,
            self.model,
            !self.api_key.is_empty(),
            self.store_url,
            !self.store_key.is_empty(),
            self.daily_limit,
            self.max_references,
            self.template,
            self.reference_order,
            String::from(self.time_zone),
            self.usage_commit,
            self.request_timeout_secs,
        )
    }
}

fn overlay<T: std::str::FromStr>(
    field: &mut T,
    raw: Option<String>,
    name: &str,
    warnings: &mut Vec<String>,
) where
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else { return };
    match raw.trim().parse::<T>() {
        Ok(v) => *field = v,
        Err(e) => warnings.push(format!("ignoring {name}={raw}: {e}")),
    }
}

pub fn ai_configured(settings: &Settings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

// --- Settings file ---

/// Resolve the settings directory (~/.ideo/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ideo")
}

pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Read the settings file, falling back to defaults when it is missing or
/// unreadable.
pub fn read_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"model":"gpt-4o-mini","template":"narrative-personal"}"#)
                .unwrap();
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.template, TemplateVariant::NarrativePersonal);
        assert_eq!(settings.daily_limit, 20);
        assert_eq!(settings.max_references, 25);
        assert_eq!(settings.time_zone, ReferenceZone::Local);
    }

    #[test]
    fn env_overrides_and_legacy_names() {
        let mut settings = Settings::default();
        let warnings = settings.apply_env(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SUPABASE_URL", "https://db.example.co/"),
            ("SUPABASE_KEY", "anon"),
            ("IDEO_DAILY_LIMIT", "5"),
            ("IDEO_REFERENCE_ORDER", "views-desc"),
            ("IDEO_TIME_ZONE", "utc"),
        ]));
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.store_url, "https://db.example.co");
        assert_eq!(settings.daily_limit, 5);
        assert_eq!(settings.reference_order, ReferenceOrder::ViewsDesc);
        assert_eq!(settings.time_zone, ReferenceZone::Utc);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn malformed_env_values_are_reported_and_ignored() {
        let mut settings = Settings::default();
        let warnings = settings.apply_env(env(&[
            ("IDEO_DAILY_LIMIT", "lots"),
            ("IDEO_TEMPLATE", "shouting"),
            ("IDEO_MAX_REFERENCES", "500"),
            ("IDEO_TIME_ZONE", "+1é1"),
        ]));
        assert_eq!(warnings.len(), 3);
        assert_eq!(settings.daily_limit, 20);
        assert_eq!(settings.template, TemplateVariant::DirectTopic);
        assert_eq!(settings.max_references, MAX_REFERENCES);
        assert_eq!(settings.time_zone, ReferenceZone::Local);
    }

    #[test]
    fn validate_rejects_zero_limit_and_missing_store() {
        let mut settings = Settings {
            api_key: "k".to_string(),
            store_url: "https://db".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
        settings.daily_limit = 0;
        assert!(settings.validate().is_err());
        settings.daily_limit = 1;
        settings.store_url.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn summary_hides_secrets() {
        let settings = Settings {
            api_key: "sk-very-secret".to_string(),
            store_key: "service-role".to_string(),
            ..Settings::default()
        };
        let summary = settings.redacted_summary();
        assert!(!summary.contains("sk-very-secret"));
        assert!(!summary.contains("service-role"));
        assert!(summary.contains("hasKey=true"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let settings = Settings {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            ..Settings::default()
        };
        assert!(ai_configured(&settings));
        assert!(!ai_configured(&Settings::default()));
    }
}
