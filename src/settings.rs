use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Theme;

/// Host-level defaults that sit beneath the script-tag attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Settings {
    pub api_url: Option<String>,
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub session_ttl_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `SPIQ_*` variables through `lookup`, ignoring unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_url: non_empty("SPIQ_API_URL"),
            theme: non_empty("SPIQ_THEME").and_then(|v| Theme::parse(&v)),
            language: non_empty("SPIQ_LANGUAGE"),
            session_ttl_secs: non_empty("SPIQ_SESSION_TTL_SECS").and_then(|v| v.parse().ok()),
            request_timeout_secs: non_empty("SPIQ_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            data_dir: non_empty("SPIQ_DATA_DIR").map(PathBuf::from),
        }
    }

    /// Layers `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merged_with(&self, overrides: &Settings) -> Settings {
        Settings {
            api_url: overrides.api_url.clone().or_else(|| self.api_url.clone()),
            theme: overrides.theme.or(self.theme),
            language: overrides.language.clone().or_else(|| self.language.clone()),
            session_ttl_secs: overrides.session_ttl_secs.or(self.session_ttl_secs),
            request_timeout_secs: overrides.request_timeout_secs.or(self.request_timeout_secs),
            data_dir: overrides.data_dir.clone().or_else(|| self.data_dir.clone()),
        }
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_known_variables_and_skips_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SPIQ_API_URL", "https://api.example.com/chat"),
            ("SPIQ_THEME", "dark"),
            ("SPIQ_LANGUAGE", " "),
            ("SPIQ_SESSION_TTL_SECS", "3600"),
            ("SPIQ_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.api_url.as_deref(), Some("https://api.example.com/chat"));
        assert_eq!(s.theme, Some(Theme::Dark));
        assert_eq!(s.language, None);
        assert_eq!(s.session_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(s.request_timeout(), None);
    }

    #[test]
    fn overrides_win_over_base() {
        let base = Settings {
            api_url: Some("https://base".into()),
            theme: Some(Theme::Light),
            language: Some("de-DE".into()),
            session_ttl_secs: Some(10),
            request_timeout_secs: None,
            data_dir: None,
        };
        let overrides = Settings {
            theme: Some(Theme::Dark),
            request_timeout_secs: Some(30),
            ..Default::default()
        };
        let eff = base.merged_with(&overrides);
        assert_eq!(eff.api_url.as_deref(), Some("https://base")); // from base
        assert_eq!(eff.theme, Some(Theme::Dark)); // from overrides
        assert_eq!(eff.language.as_deref(), Some("de-DE"));
        assert_eq!(eff.session_ttl_secs, Some(10));
        assert_eq!(eff.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_durations_mean_unset() {
        let s = Settings { session_ttl_secs: Some(0), request_timeout_secs: Some(0), ..Default::default() };
        assert!(s.session_ttl().is_none());
        assert!(s.request_timeout().is_none());
    }
}
