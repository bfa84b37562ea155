use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::Html,
    routing::{get, get_service},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::debug;

use crate::content_loader::SiteContent;
use crate::hot_reload::ws_handler;
use crate::pages::{self, Page};
use crate::state::{AppState, RouterState};

/// The development preview. `/ws` only exists when hot reload is on.
pub fn build_router(state: RouterState) -> Router {
    let static_root = state.app_state.config.content_dir.join("static");
    let static_dir = get_service(ServeDir::new(&static_root));
    let favicon_ico = get_service(ServeFile::new(static_root.join("favicon.ico")));
    let favicon_png = get_service(ServeFile::new(static_root.join("favicon.png")));

    let mut app = Router::new()
        .route("/", get(homepage))
        .route("/blog", get(blog))
        .route("/posts/{slug}", get(render_post))
        .nest_service("/static", static_dir)
        .route_service("/favicon.ico", favicon_ico)
        .route_service("/favicon.png", favicon_png)
        .fallback(not_found);

    if state.app_state.config.is_development {
        app = app.route("/ws", get(ws_handler));
    }

    app.with_state(state)
}

async fn render_page(state: &AppState, page: impl FnOnce(&SiteContent) -> Page) -> String {
    let content = state.content.read().await;
    let page = page(&content);
    pages::render_with_layout(&content, &page, state.config.is_development)
}

async fn homepage(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_page(&state, |content| pages::home_page(content, &state.config)).await)
}

async fn blog(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(
        render_page(&state, |content| {
            pages::blog_page(content, &state.config, &state.renderer)
        })
        .await,
    )
}

async fn render_post(
    Path(slug): Path<String>,
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Html<String>) {
    let content = state.content.read().await;
    let (status, page) = match content.find_post(&slug) {
        Some(post) => (
            StatusCode::OK,
            pages::post_page(post, &state.config, &state.renderer),
        ),
        None => {
            debug!("No post matches slug {}", slug);
            (
                StatusCode::NOT_FOUND,
                pages::not_found_page(&content, &state.config, &slug),
            )
        }
    };
    let html = pages::render_with_layout(&content, &page, state.config.is_development);
    (status, Html(html))
}

async fn not_found(State(state): State<Arc<AppState>>, uri: Uri) -> (StatusCode, Html<String>) {
    let requested = uri.path().trim_start_matches('/').to_string();
    let html = render_page(&state, |content| {
        pages::not_found_page(content, &state.config, &requested)
    })
    .await;
    (StatusCode::NOT_FOUND, Html(html))
}
