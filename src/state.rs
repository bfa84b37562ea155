use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::SiteConfig;
use crate::content_loader::SiteContent;
use crate::markdown::MarkdownRenderer;

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub content: RwLock<SiteContent>,
    pub config: SiteConfig,
    pub renderer: MarkdownRenderer,
}

impl AppState {
    pub fn new(content: SiteContent, config: SiteConfig, renderer: MarkdownRenderer) -> Self {
        Self {
            content: RwLock::new(content),
            config,
            renderer,
        }
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
