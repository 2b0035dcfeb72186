use std::fmt::Write;

use crate::config::{Position, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Black,
    White,
}

impl TextColor {
    pub fn css(self) -> &'static str {
        match self {
            TextColor::Black => "#000000",
            TextColor::White => "#ffffff",
        }
    }
}

/// Parses `#rgb` or `#rrggbb`.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Perceived brightness in `0.0..=1.0`.
pub fn relative_luminance(hex: &str) -> Option<f64> {
    let (r, g, b) = parse_hex(hex)?;
    Some((0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0)
}

/// Text color readable on top of `background`. Unparsable colors get white.
pub fn contrast_text(background: &str) -> TextColor {
    match relative_luminance(background) {
        Some(l) if l > 0.5 => TextColor::Black,
        _ => TextColor::White,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeVars {
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub border: &'static str,
    pub primary: String,
    pub on_primary: &'static str,
}

impl ThemeVars {
    pub fn light(primary: &str) -> Self {
        Self {
            background: "#ffffff",
            surface: "#f3f4f6",
            text: "#111827",
            muted: "#6b7280",
            border: "#e5e7eb",
            primary: primary.to_string(),
            on_primary: contrast_text(primary).css(),
        }
    }

    pub fn dark(primary: &str) -> Self {
        Self {
            background: "#1f2937",
            surface: "#374151",
            text: "#f9fafb",
            muted: "#9ca3af",
            border: "#4b5563",
            primary: primary.to_string(),
            on_primary: contrast_text(primary).css(),
        }
    }

    /// Base variables for `theme`; `Auto` starts from light.
    pub fn for_theme(theme: Theme, primary: &str) -> Self {
        match theme {
            Theme::Dark => Self::dark(primary),
            Theme::Light | Theme::Auto => Self::light(primary),
        }
    }

    fn declarations(&self) -> String {
        format!(
            "--spiq-bg:{};--spiq-surface:{};--spiq-text:{};--spiq-muted:{};--spiq-border:{};--spiq-primary:{};--spiq-on-primary:{};",
            self.background, self.surface, self.text, self.muted, self.border, self.primary, self.on_primary
        )
    }
}

fn theme_block(scope: &str, theme: Theme, primary: &str) -> String {
    let base = format!("#{scope}{{{}}}\n", ThemeVars::for_theme(theme, primary).declarations());
    if theme != Theme::Auto {
        return base;
    }
    format!(
        "{base}@media (prefers-color-scheme: dark){{#{scope}{{{}}}}}\n",
        ThemeVars::dark(primary).declarations()
    )
}

/// Builds the full stylesheet for one widget instance. Every selector is
/// rooted at `#scope` so several instances can share a page.
pub fn build_stylesheet(scope: &str, theme: Theme, primary: &str, position: Position) -> String {
    let vertical = if position.is_top() { "top" } else { "bottom" };
    let horizontal = if position.is_left() { "left" } else { "right" };
    let window_offset = if position.is_top() { "top:76px" } else { "bottom:76px" };

    let mut css = theme_block(scope, theme, primary);
    let s = scope;
    let _ = write!(
        css,
        "#{s}{{position:fixed;{vertical}:20px;{horizontal}:20px;z-index:2147483000;font-family:system-ui,-apple-system,'Segoe UI',sans-serif;color:var(--spiq-text);}}\n\
#{s} .spiq-bubble{{width:56px;height:56px;border-radius:50%;border:none;cursor:pointer;background:var(--spiq-primary);color:var(--spiq-on-primary);box-shadow:0 4px 12px rgba(0,0,0,.2);position:relative;}}\n\
#{s} .spiq-badge{{position:absolute;top:-2px;right:-2px;width:12px;height:12px;border-radius:50%;background:#ef4444;}}\n\
#{s} .spiq-window{{position:absolute;{window_offset};{horizontal}:0;width:360px;max-height:560px;display:flex;flex-direction:column;background:var(--spiq-bg);border:1px solid var(--spiq-border);border-radius:12px;overflow:hidden;box-shadow:0 10px 30px rgba(0,0,0,.25);}}\n\
#{s} .spiq-window[hidden]{{display:none;}}\n\
#{s} .spiq-header{{display:flex;justify-content:space-between;align-items:center;padding:12px 16px;background:var(--spiq-primary);color:var(--spiq-on-primary);}}\n\
#{s} .spiq-close{{background:transparent;border:none;color:inherit;font-size:20px;cursor:pointer;}}\n\
#{s} .spiq-messages{{flex:1;overflow-y:auto;padding:12px;display:flex;flex-direction:column;gap:8px;}}\n\
#{s} .spiq-welcome{{color:var(--spiq-muted);font-size:14px;}}\n\
#{s} .spiq-msg{{max-width:80%;padding:8px 12px;border-radius:12px;line-height:1.4;font-size:14px;word-wrap:break-word;}}\n\
#{s} .spiq-msg-user{{align-self:flex-end;background:var(--spiq-primary);color:var(--spiq-on-primary);}}\n\
#{s} .spiq-msg-assistant,#{s} .spiq-msg-system{{align-self:flex-start;background:var(--spiq-surface);color:var(--spiq-text);}}\n\
#{s} .spiq-msg a{{color:inherit;text-decoration:underline;}}\n\
#{s} .spiq-suggestions{{display:flex;flex-wrap:wrap;gap:6px;padding:0 12px 8px;}}\n\
#{s} .spiq-suggestion{{border:1px solid var(--spiq-border);background:var(--spiq-surface);color:var(--spiq-text);border-radius:16px;padding:4px 10px;font-size:13px;cursor:pointer;}}\n\
#{s} .spiq-typing{{align-self:flex-start;display:flex;gap:4px;padding:8px 12px;}}\n\
#{s} .spiq-typing span{{width:6px;height:6px;border-radius:50%;background:var(--spiq-muted);animation:spiq-blink 1.2s infinite;}}\n\
#{s} .spiq-input-row{{display:flex;gap:8px;padding:10px;border-top:1px solid var(--spiq-border);}}\n\
#{s} .spiq-input{{flex:1;padding:8px 10px;border:1px solid var(--spiq-border);border-radius:8px;background:var(--spiq-bg);color:var(--spiq-text);}}\n\
#{s} .spiq-send,#{s} .spiq-voice{{border:none;border-radius:8px;padding:8px 12px;background:var(--spiq-primary);color:var(--spiq-on-primary);cursor:pointer;}}\n\
#{s} .spiq-send:disabled{{opacity:.5;cursor:default;}}\n\
@keyframes spiq-blink{{0%,80%,100%{{opacity:.3;}}40%{{opacity:1;}}}}\n"
    );
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contrast_extremes() {
        assert_eq!(contrast_text("#000000"), TextColor::White);
        assert_eq!(contrast_text("#FFFFFF"), TextColor::Black);
        assert_eq!(contrast_text("#fff"), TextColor::Black);
        assert_eq!(contrast_text("nonsense"), TextColor::White);
    }

    #[test]
    fn luminance_threshold() {
        // default indigo is dark enough for white text
        assert!(relative_luminance("#6366f1").unwrap() < 0.5);
        assert_eq!(contrast_text("#6366f1"), TextColor::White);
        // amber crosses the threshold
        assert!(relative_luminance("#fbbf24").unwrap() > 0.5);
        assert_eq!(contrast_text("#fbbf24"), TextColor::Black);
    }

    #[test]
    fn parse_hex_shapes() {
        assert_eq!(parse_hex("#0a0"), Some((0, 0xaa, 0)));
        assert_eq!(parse_hex("#102030"), Some((0x10, 0x20, 0x30)));
        assert_eq!(parse_hex("102030"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#gg0000"), None);
    }

    #[test]
    fn stylesheet_is_scoped_and_positioned() {
        let css = build_stylesheet("spiq-abc", Theme::Light, "#ffffff", Position::TopLeft);
        assert!(css.starts_with("#spiq-abc{--spiq-bg:#ffffff"));
        assert!(css.contains("--spiq-on-primary:#000000"));
        assert!(css.contains("top:20px;left:20px"));
        assert!(!css.contains("prefers-color-scheme"));
        assert!(css.lines().filter(|l| l.starts_with('#')).all(|l| l.starts_with("#spiq-abc")));
    }

    #[test]
    fn auto_theme_adds_dark_media_query() {
        let css = build_stylesheet("w", Theme::Auto, "#6366f1", Position::BottomRight);
        assert!(css.contains("@media (prefers-color-scheme: dark){#w{--spiq-bg:#1f2937"));
        assert!(css.contains("bottom:20px;right:20px"));
    }
}
