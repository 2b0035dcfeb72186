use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::error::ConfigError;
use crate::settings::Settings;

pub const DEFAULT_AGENT: &str = "default";
pub const DEFAULT_PRIMARY_COLOR: &str = "#6366f1";
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_GREETING: &str = "Hi! How can I help you today?";
pub const DEFAULT_PLACEHOLDER: &str = "Type your message...";

pub const CHAT_PATH: &str = "/api/widget/chat";
pub const PRODUCTION_ORIGIN: &str = "https://smartpromptiq.com";
pub const LOCAL_BACKEND_ORIGIN: &str = "http://localhost:5000";

const PRODUCTION_HOSTS: &[&str] = &["smartpromptiq.com", "www.smartpromptiq.com", "app.smartpromptiq.com"];
const PLATFORM_SUFFIXES: &[&str] = &[".up.railway.app", ".railway.app", ".vercel.app", ".netlify.app", ".onrender.com"];
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("static regex"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "auto" => Some(Theme::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Position {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bottom-right" => Some(Position::BottomRight),
            "bottom-left" => Some(Position::BottomLeft),
            "top-right" => Some(Position::TopRight),
            "top-left" => Some(Position::TopLeft),
            _ => None,
        }
    }

    pub fn is_top(self) -> bool {
        matches!(self, Position::TopRight | Position::TopLeft)
    }

    pub fn is_left(self) -> bool {
        matches!(self, Position::BottomLeft | Position::TopLeft)
    }
}

/// Attributes of the `<script>` element that embeds the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTag {
    attrs: HashMap<String, String>,
}

impl ScriptTag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Returns the attribute value, treating blank values as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// The page the widget is embedded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub url: Url,
    pub title: String,
    pub referrer: String,
}

impl PageContext {
    pub fn new(url: Url) -> Self {
        Self { url, title: String::new(), referrer: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub api_key: String,
    pub agent: String,
    pub theme: Theme,
    pub position: Position,
    pub primary_color: String,
    pub voice_enabled: bool,
    pub language: String,
    pub greeting: String,
    pub placeholder: String,
    pub api_url: Option<String>,
}

impl WidgetConfig {
    pub fn from_script(script: Option<&ScriptTag>, settings: &Settings) -> Result<Self, ConfigError> {
        let script = script.ok_or(ConfigError::MissingScript)?;
        let api_key = script.attr("data-api-key").ok_or(ConfigError::MissingApiKey)?.to_string();

        let theme = match script.attr("data-theme") {
            Some(raw) => Theme::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "unknown data-theme, using default");
                settings.theme.unwrap_or_default()
            }),
            None => settings.theme.unwrap_or_default(),
        };
        let position = match script.attr("data-position") {
            Some(raw) => Position::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "unknown data-position, using default");
                Position::default()
            }),
            None => Position::default(),
        };
        let primary_color = match script.attr("data-primary-color") {
            Some(raw) if HEX_COLOR.is_match(raw) => raw.to_ascii_lowercase(),
            Some(raw) => {
                warn!(value = raw, "data-primary-color is not a hex color, using default");
                DEFAULT_PRIMARY_COLOR.to_string()
            }
            None => DEFAULT_PRIMARY_COLOR.to_string(),
        };

        Ok(Self {
            api_key,
            agent: script.attr("data-agent").unwrap_or(DEFAULT_AGENT).to_string(),
            theme,
            position,
            primary_color,
            voice_enabled: script.attr("data-voice-enabled") == Some("true"),
            language: script
                .attr("data-language")
                .map(str::to_string)
                .or_else(|| settings.language.clone())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            greeting: script.attr("data-greeting").unwrap_or(DEFAULT_GREETING).to_string(),
            placeholder: script.attr("data-placeholder").unwrap_or(DEFAULT_PLACEHOLDER).to_string(),
            api_url: script
                .attr("data-api-url")
                .map(str::to_string)
                .or_else(|| settings.api_url.clone()),
        })
    }

    pub fn api_base(&self, page: &PageContext) -> Url {
        let (base, source) = resolve_api_base(self.api_url.as_deref(), &page.url);
        debug!(base = %base, ?source, "resolved widget api base");
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrlSource {
    Override,
    Production,
    HostingPlatform,
    Localhost,
    SameOrigin,
}

pub fn resolve_api_base(override_url: Option<&str>, page_url: &Url) -> (Url, BaseUrlSource) {
    if let Some(raw) = override_url {
        match Url::parse(raw) {
            Ok(u) => return (u, BaseUrlSource::Override),
            Err(e) => warn!(value = raw, error = %e, "ignoring invalid api url override"),
        }
    }

    let host = page_url.host_str().unwrap_or_default().to_ascii_lowercase();
    let (origin, source) = if PRODUCTION_HOSTS.contains(&host.as_str()) {
        (PRODUCTION_ORIGIN.to_string(), BaseUrlSource::Production)
    } else if PLATFORM_SUFFIXES.iter().any(|s| host.ends_with(s)) {
        (page_url.origin().ascii_serialization(), BaseUrlSource::HostingPlatform)
    } else if LOCAL_HOSTS.contains(&host.as_str()) {
        (LOCAL_BACKEND_ORIGIN.to_string(), BaseUrlSource::Localhost)
    } else {
        (page_url.origin().ascii_serialization(), BaseUrlSource::SameOrigin)
    };

    let joined = format!("{}{}", origin.trim_end_matches('/'), CHAT_PATH);
    match Url::parse(&joined) {
        Ok(u) => (u, source),
        // opaque origins (file:, data:) serialize as "null"
        Err(_) => (
            Url::parse(&format!("{LOCAL_BACKEND_ORIGIN}{CHAT_PATH}")).expect("static url"),
            BaseUrlSource::Localhost,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(u: &str) -> Url {
        Url::parse(u).unwrap()
    }

    #[test]
    fn missing_script_and_key_are_fatal() {
        let settings = Settings::default();
        assert_eq!(WidgetConfig::from_script(None, &settings), Err(ConfigError::MissingScript));
        let tag = ScriptTag::new().with("data-agent", "demo").with("data-api-key", "  ");
        assert_eq!(WidgetConfig::from_script(Some(&tag), &settings), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn attributes_and_defaults() {
        let tag = ScriptTag::new()
            .with("data-api-key", "k-1")
            .with("data-theme", "dark")
            .with("data-position", "top-left")
            .with("data-primary-color", "#FFAA00")
            .with("data-voice-enabled", "yes");
        let cfg = WidgetConfig::from_script(Some(&tag), &Settings::default()).unwrap();
        assert_eq!(cfg.api_key, "k-1");
        assert_eq!(cfg.agent, DEFAULT_AGENT);
        assert_eq!(cfg.theme, Theme::Dark);
        assert_eq!(cfg.position, Position::TopLeft);
        assert_eq!(cfg.primary_color, "#ffaa00");
        assert!(!cfg.voice_enabled, "only the literal \"true\" enables voice");
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);
        assert_eq!(cfg.greeting, DEFAULT_GREETING);
        assert_eq!(cfg.placeholder, DEFAULT_PLACEHOLDER);
        assert_eq!(cfg.api_url, None);
    }

    #[test]
    fn bad_values_fall_back() {
        let tag = ScriptTag::new()
            .with("data-api-key", "k")
            .with("data-theme", "neon")
            .with("data-position", "middle")
            .with("data-primary-color", "red");
        let settings = Settings { theme: Some(Theme::Auto), ..Default::default() };
        let cfg = WidgetConfig::from_script(Some(&tag), &settings).unwrap();
        assert_eq!(cfg.theme, Theme::Auto);
        assert_eq!(cfg.position, Position::BottomRight);
        assert_eq!(cfg.primary_color, DEFAULT_PRIMARY_COLOR);
    }

    #[test]
    fn script_attributes_beat_host_settings() {
        let tag = ScriptTag::new()
            .with("data-api-key", "k")
            .with("data-language", "fr-FR");
        let settings = Settings {
            language: Some("de-DE".into()),
            api_url: Some("https://host.example/chat".into()),
            ..Default::default()
        };
        let cfg = WidgetConfig::from_script(Some(&tag), &settings).unwrap();
        assert_eq!(cfg.language, "fr-FR");
        assert_eq!(cfg.api_url.as_deref(), Some("https://host.example/chat"));
    }

    #[test]
    fn base_url_resolution_order() {
        let (u, s) = resolve_api_base(Some("https://custom.example/v2/chat"), &page("https://smartpromptiq.com/"));
        assert_eq!((u.as_str(), s), ("https://custom.example/v2/chat", BaseUrlSource::Override));

        let (u, s) = resolve_api_base(Some("not a url"), &page("https://www.smartpromptiq.com/pricing"));
        assert_eq!((u.as_str(), s), ("https://smartpromptiq.com/api/widget/chat", BaseUrlSource::Production));

        let (u, s) = resolve_api_base(None, &page("https://my-app.up.railway.app/docs"));
        assert_eq!((u.as_str(), s), ("https://my-app.up.railway.app/api/widget/chat", BaseUrlSource::HostingPlatform));

        let (u, s) = resolve_api_base(None, &page("http://localhost:3000/"));
        assert_eq!((u.as_str(), s), ("http://localhost:5000/api/widget/chat", BaseUrlSource::Localhost));

        let (u, s) = resolve_api_base(None, &page("https://shop.example.org:8443/a/b"));
        assert_eq!((u.as_str(), s), ("https://shop.example.org:8443/api/widget/chat", BaseUrlSource::SameOrigin));
    }
}
