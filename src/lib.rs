pub mod api;
pub mod config;
pub mod dom;
pub mod error;
pub mod message;
pub mod render;
pub mod session;
pub mod settings;
pub mod storage;
pub mod stub;
pub mod style;
pub mod voice;
pub mod widget;

pub use config::{PageContext, ScriptTag, Theme, WidgetConfig};
pub use widget::{Host, SendOutcome, Widget, WidgetDeps, embed};
