use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::{AgentInfo, ChatBackend, ChatContext, ChatRequest, HttpChatBackend};
use crate::config::{PageContext, ScriptTag, Theme, WidgetConfig};
use crate::dom::{Document, NodeId};
use crate::error::WidgetError;
use crate::message::{Message, Role, Transcript};
use crate::render::{View, render_container};
use crate::session::{SessionId, SessionStore};
use crate::settings::Settings;
use crate::storage::KeyValueStore;
use crate::style::build_stylesheet;
use crate::voice::{Narrator, speakable};

pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting right now. Please try again later.";
pub const DEFAULT_AGENT_NAME: &str = "AI Assistant";

#[derive(Clone)]
pub struct WidgetDeps {
    pub document: Arc<dyn Document>,
    pub backend: Arc<dyn ChatBackend>,
    pub sessions: SessionStore,
    pub narrator: Arc<dyn Narrator>,
}

/// Host services for [`embed`]; the backend is built from the resolved config.
#[derive(Clone)]
pub struct Host {
    pub document: Arc<dyn Document>,
    pub storage: Arc<dyn KeyValueStore>,
    pub narrator: Arc<dyn Narrator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Bubble,
    Close,
    Send,
    Voice,
    Suggestion(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    Busy,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored(IgnoreReason),
    Delivered,
    /// The backend failed and the fallback reply was shown.
    Failed,
    /// The widget was torn down while the request was in flight.
    Discarded,
}

struct State {
    open: bool,
    loading: bool,
    unread: bool,
    voice_muted: bool,
    destroyed: bool,
    generation: u64,
    input: String,
    theme: Theme,
    agent: AgentInfo,
    welcome: String,
    transcript: Transcript,
}

struct Inner {
    scope: String,
    config: WidgetConfig,
    page: PageContext,
    session_id: SessionId,
    style_node: NodeId,
    container_node: NodeId,
    deps: WidgetDeps,
    state: Mutex<State>,
}

/// Handle to one mounted widget. Clones share the same instance.
#[derive(Clone)]
pub struct Widget {
    inner: Arc<Inner>,
}

/// Resolves config from the embedding script tag and mounts a widget that
/// talks HTTP to the resolved backend.
pub async fn embed(
    script: Option<&ScriptTag>,
    page: PageContext,
    settings: &Settings,
    host: Host,
) -> Result<Widget, WidgetError> {
    let config = WidgetConfig::from_script(script, settings)
        .inspect_err(|e| error!(error = %e, "SmartPromptIQ widget not initialized"))?;
    let base = config.api_base(&page);
    let backend = HttpChatBackend::new(base, config.api_key.clone(), settings.request_timeout())?;
    let deps = WidgetDeps {
        document: host.document,
        backend: Arc::new(backend),
        sessions: SessionStore::new(host.storage).with_ttl(settings.session_ttl()),
        narrator: host.narrator,
    };
    Ok(Widget::mount(config, page, deps).await)
}

impl Widget {
    pub async fn mount(config: WidgetConfig, page: PageContext, deps: WidgetDeps) -> Widget {
        let scope = format!("spiq-{}", Uuid::new_v4().simple());
        let style_node = deps
            .document
            .append_style(&build_stylesheet(&scope, config.theme, &config.primary_color, config.position));

        let mut state = State {
            open: false,
            loading: false,
            unread: false,
            voice_muted: false,
            destroyed: false,
            generation: 0,
            input: String::new(),
            theme: config.theme,
            agent: AgentInfo { name: DEFAULT_AGENT_NAME.into(), welcome_message: None, suggested_queries: Vec::new() },
            welcome: config.greeting.clone(),
            transcript: Transcript::default(),
        };
        let container_node = deps
            .document
            .append_container(&scope, &render_container(&view_of(&state, &config)));

        let session_id = match deps.sessions.get_or_create(&config.agent).await {
            Ok(id) => id,
            Err(e) => {
                warn!(agent = %config.agent, error = %e, "session storage unavailable, using ephemeral session");
                SessionId::generate()
            }
        };

        match deps.backend.fetch_agent().await {
            Ok(info) => {
                if let Some(welcome) = info.welcome_message.as_deref().filter(|w| !w.trim().is_empty()) {
                    state.welcome = welcome.to_string();
                }
                state.agent = AgentInfo {
                    name: if info.name.trim().is_empty() { DEFAULT_AGENT_NAME.into() } else { info.name },
                    ..info
                };
            }
            Err(e) => warn!(agent = %config.agent, error = %e, "could not load agent info, using defaults"),
        }
        deps.document.render(container_node, &render_container(&view_of(&state, &config)));

        info!(scope = %scope, agent = %config.agent, session = %session_id, "widget mounted");
        Widget {
            inner: Arc::new(Inner {
                scope,
                config,
                page,
                session_id,
                style_node,
                container_node,
                deps,
                state: Mutex::new(state),
            }),
        }
    }

    fn redraw(&self, state: &State) {
        let html = render_container(&view_of(state, &self.inner.config));
        self.inner.deps.document.render(self.inner.container_node, &html);
    }

    fn scroll(&self) {
        self.inner.deps.document.scroll_to_bottom(self.inner.container_node);
    }

    pub fn toggle(&self) {
        if self.is_open() { self.close() } else { self.open() }
    }

    pub fn open(&self) {
        let mut st = self.inner.state.lock();
        if st.destroyed {
            return;
        }
        st.open = true;
        st.unread = false;
        self.redraw(&st);
        self.inner.deps.document.focus_input(self.inner.container_node);
        debug!(scope = %self.inner.scope, "widget opened");
    }

    pub fn close(&self) {
        let mut st = self.inner.state.lock();
        if st.destroyed || !st.open {
            return;
        }
        st.open = false;
        self.redraw(&st);
        debug!(scope = %self.inner.scope, "widget closed");
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.state.lock().input = text.into();
    }

    /// Sends whatever is in the input box, clearing it once the send starts.
    pub async fn submit(&self) -> SendOutcome {
        self.send(None).await
    }

    pub async fn send_message(&self, text: &str) -> SendOutcome {
        self.send(Some(text)).await
    }

    pub async fn handle_key(&self, key: Key) -> Option<SendOutcome> {
        match key {
            Key::Escape => {
                self.close();
                None
            }
            Key::Enter => Some(self.submit().await),
        }
    }

    pub async fn click(&self, target: Target) -> Option<SendOutcome> {
        match target {
            Target::Bubble => self.toggle(),
            Target::Close => self.close(),
            Target::Voice => self.toggle_voice(),
            Target::Send => return Some(self.submit().await),
            Target::Suggestion(i) => {
                let query = self.inner.state.lock().agent.suggested_queries.get(i).cloned()?;
                return Some(self.send_message(&query).await);
            }
        }
        None
    }

    async fn send(&self, text: Option<&str>) -> SendOutcome {
        let (request, token) = {
            let mut st = self.inner.state.lock();
            if st.destroyed {
                return SendOutcome::Ignored(IgnoreReason::Destroyed);
            }
            let content = text.unwrap_or(&st.input).trim().to_string();
            if content.is_empty() {
                return SendOutcome::Ignored(IgnoreReason::Empty);
            }
            if st.loading {
                debug!(scope = %self.inner.scope, "send dropped, request already in flight");
                return SendOutcome::Ignored(IgnoreReason::Busy);
            }
            if text.is_none() {
                st.input.clear();
            }
            st.transcript.push(Message::new(Role::User, content.clone()));
            st.loading = true;
            self.redraw(&st);
            self.scroll();
            let request = ChatRequest {
                message: content,
                session_id: self.inner.session_id.to_string(),
                context: ChatContext {
                    page_url: self.inner.page.url.to_string(),
                    page_title: self.inner.page.title.clone(),
                    referrer: self.inner.page.referrer.clone(),
                },
            };
            (request, st.generation)
        };

        let result = self.inner.deps.backend.send(request).await;

        let mut st = self.inner.state.lock();
        if st.destroyed || st.generation != token {
            debug!(scope = %self.inner.scope, "late response dropped after teardown");
            return SendOutcome::Discarded;
        }
        let (reply, outcome) = match result {
            Ok(reply) => (reply, SendOutcome::Delivered),
            Err(e) => {
                error!(scope = %self.inner.scope, error = %e, "chat request failed");
                (FALLBACK_REPLY.to_string(), SendOutcome::Failed)
            }
        };
        st.loading = false;
        st.transcript.push(Message::new(Role::Assistant, reply.clone()));
        if !st.open {
            st.unread = true;
        }
        self.redraw(&st);
        self.scroll();
        let narrate = outcome == SendOutcome::Delivered && self.inner.config.voice_enabled && !st.voice_muted;
        drop(st);

        if narrate {
            self.inner.deps.narrator.speak(&speakable(&reply), &self.inner.config.language);
        }
        outcome
    }

    pub fn toggle_voice(&self) {
        if !self.inner.config.voice_enabled {
            return;
        }
        let mut st = self.inner.state.lock();
        if st.destroyed {
            return;
        }
        st.voice_muted = !st.voice_muted;
        self.redraw(&st);
    }

    /// Swaps theme variables in the existing style node.
    pub fn set_theme(&self, theme: Theme) -> Result<(), WidgetError> {
        let mut st = self.inner.state.lock();
        if st.destroyed {
            return Err(WidgetError::Destroyed);
        }
        let cfg = &self.inner.config;
        let css = build_stylesheet(&self.inner.scope, theme, &cfg.primary_color, cfg.position);
        if !self.inner.deps.document.update_style(self.inner.style_node, &css) {
            warn!(scope = %self.inner.scope, "style node missing, theme not applied");
            return Err(WidgetError::StyleMissing);
        }
        st.theme = theme;
        Ok(())
    }

    /// Removes the widget's nodes and invalidates in-flight requests.
    /// Returns `false` if it was already destroyed.
    pub fn destroy(&self) -> bool {
        let mut st = self.inner.state.lock();
        if st.destroyed {
            return false;
        }
        st.destroyed = true;
        st.generation += 1;
        st.loading = false;
        let doc = &self.inner.deps.document;
        doc.remove(self.inner.container_node);
        doc.remove(self.inner.style_node);
        info!(scope = %self.inner.scope, "widget destroyed");
        true
    }

    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.inner.config
    }

    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    pub fn style_node(&self) -> NodeId {
        self.inner.style_node
    }

    pub fn container_node(&self) -> NodeId {
        self.inner.container_node
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().transcript.to_vec()
    }

    pub fn agent(&self) -> AgentInfo {
        self.inner.state.lock().agent.clone()
    }

    pub fn welcome(&self) -> String {
        self.inner.state.lock().welcome.clone()
    }

    pub fn input(&self) -> String {
        self.inner.state.lock().input.clone()
    }

    pub fn theme(&self) -> Theme {
        self.inner.state.lock().theme
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.lock().open
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    pub fn has_unread(&self) -> bool {
        self.inner.state.lock().unread
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    pub fn voice_muted(&self) -> bool {
        self.inner.state.lock().voice_muted
    }

    pub fn suggestions_visible(&self) -> bool {
        let st = self.inner.state.lock();
        !st.transcript.has_user_message() && !st.agent.suggested_queries.is_empty()
    }
}

fn view_of<'a>(state: &'a State, config: &'a WidgetConfig) -> View<'a> {
    View {
        agent_name: &state.agent.name,
        welcome: &state.welcome,
        placeholder: &config.placeholder,
        suggestions: &state.agent.suggested_queries,
        show_suggestions: !state.transcript.has_user_message(),
        transcript: &state.transcript,
        open: state.open,
        unread: state.unread,
        loading: state.loading,
        voice_muted: config.voice_enabled.then_some(state.voice_muted),
    }
}
