use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

use crate::message::Transcript;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("static regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s<]+").expect("static regex"));

/// Everything needed to draw one widget instance.
pub struct View<'a> {
    pub agent_name: &'a str,
    pub welcome: &'a str,
    pub placeholder: &'a str,
    pub suggestions: &'a [String],
    pub show_suggestions: bool,
    pub transcript: &'a Transcript,
    pub open: bool,
    pub unread: bool,
    pub loading: bool,
    /// `None` hides the voice toggle; `Some(muted)` shows it.
    pub voice_muted: Option<bool>,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes message text and applies the light formatting the widget supports.
pub fn format_content(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let linked = LINK.replace_all(&bolded, r#"<a href="$0" target="_blank" rel="noopener noreferrer">$0</a>"#);
    linked.replace('\n', "<br>")
}

pub fn render_container(view: &View<'_>) -> String {
    let mut html = String::new();

    let _ = write!(html, r#"<button class="spiq-bubble" data-action="toggle" aria-label="Open chat">💬"#);
    if view.unread {
        html.push_str(r#"<span class="spiq-badge"></span>"#);
    }
    html.push_str("</button>");

    let hidden = if view.open { "" } else { " hidden" };
    let _ = write!(
        html,
        r#"<div class="spiq-window" role="dialog"{hidden}><div class="spiq-header"><span class="spiq-title">{}</span><button class="spiq-close" data-action="close" aria-label="Close chat">×</button></div>"#,
        escape_html(view.agent_name)
    );

    html.push_str(r#"<div class="spiq-messages">"#);
    let _ = write!(html, r#"<div class="spiq-welcome">{}</div>"#, format_content(view.welcome));
    for msg in view.transcript.iter() {
        let _ = write!(
            html,
            r#"<div class="spiq-msg spiq-msg-{}" data-id="{}">{}</div>"#,
            msg.role.as_str(),
            msg.id,
            format_content(&msg.content)
        );
    }
    if view.loading {
        html.push_str(r#"<div class="spiq-typing"><span></span><span></span><span></span></div>"#);
    }
    html.push_str("</div>");

    if view.show_suggestions && !view.suggestions.is_empty() {
        html.push_str(r#"<div class="spiq-suggestions">"#);
        for (i, q) in view.suggestions.iter().enumerate() {
            let _ = write!(
                html,
                r#"<button class="spiq-suggestion" data-action="suggestion" data-index="{i}">{}</button>"#,
                escape_html(q)
            );
        }
        html.push_str("</div>");
    }

    let disabled = if view.loading { " disabled" } else { "" };
    let _ = write!(
        html,
        r#"<div class="spiq-input-row"><input class="spiq-input" type="text" placeholder="{}"{disabled}>"#,
        escape_html(view.placeholder)
    );
    if let Some(muted) = view.voice_muted {
        let label = if muted { "Unmute voice" } else { "Mute voice" };
        let _ = write!(html, r#"<button class="spiq-voice" data-action="voice" aria-label="{label}">{}</button>"#, if muted { "🔇" } else { "🔊" });
    }
    let _ = write!(html, r#"<button class="spiq-send" data-action="send"{disabled}>Send</button></div></div>"#);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Role};

    fn view<'a>(transcript: &'a Transcript, suggestions: &'a [String]) -> View<'a> {
        View {
            agent_name: "Demo <Bot>",
            welcome: "Hi!",
            placeholder: "Ask \"anything\"",
            suggestions,
            show_suggestions: true,
            transcript,
            open: false,
            unread: false,
            loading: false,
            voice_muted: None,
        }
    }

    #[test]
    fn format_content_escapes_before_formatting() {
        assert_eq!(format_content("<b>x</b>"), "&lt;b&gt;x&lt;/b&gt;");
        assert_eq!(format_content("a **big** deal\nok"), "a <strong>big</strong> deal<br>ok");
        assert_eq!(
            format_content("see https://smartpromptiq.com/academy now"),
            r#"see <a href="https://smartpromptiq.com/academy" target="_blank" rel="noopener noreferrer">https://smartpromptiq.com/academy</a> now"#
        );
    }

    #[test]
    fn closed_widget_hides_window() {
        let t = Transcript::default();
        let html = render_container(&view(&t, &[]));
        assert!(html.contains(r#"<div class="spiq-window" role="dialog" hidden>"#));
        assert!(html.contains("Demo &lt;Bot&gt;"));
        assert!(html.contains(r#"placeholder="Ask &quot;anything&quot;""#));
        assert!(!html.contains("spiq-badge"));
        assert!(!html.contains("spiq-voice"));
        assert!(!html.contains("spiq-suggestions"));
    }

    #[test]
    fn renders_messages_typing_and_suggestions() {
        let mut t = Transcript::default();
        t.push(Message::new(Role::User, "Hello"));
        let suggestions = vec!["What is **SPIQ**?".to_string()];
        let mut v = view(&t, &suggestions);
        v.open = true;
        v.loading = true;
        v.unread = true;
        v.voice_muted = Some(false);
        let html = render_container(&v);
        assert!(html.contains(r#"role="dialog">"#));
        assert!(html.contains("spiq-msg spiq-msg-user"));
        assert!(html.contains("spiq-typing"));
        assert!(html.contains("spiq-badge"));
        assert!(html.contains(r#"data-index="0">What is **SPIQ**?</button>"#));
        assert!(html.contains(r#"aria-label="Mute voice""#));
        assert!(html.contains(r#"data-action="send" disabled>"#));
    }
}
