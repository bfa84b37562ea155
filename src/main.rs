mod config;
mod content_loader;
mod error;
mod export;
mod highlight;
mod hot_reload;
mod image_size;
mod markdown;
mod models;
mod pages;
mod routes;
mod slug;
mod state;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SiteConfig;
use crate::content_loader::load_content;
use crate::highlight::CodeHighlighter;
use crate::markdown::MarkdownRenderer;
use crate::state::{AppState, RouterState};

#[derive(Parser, Debug)]
#[command(version, about = "Portfolio and blog site: static export and live preview")]
struct Cli {
    /// Site configuration file. Missing file means defaults.
    #[arg(long, default_value = "site.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render pages on request, with hot reload when RUST_ENV=development.
    Serve,
    /// Write the whole site as static files.
    Build {
        /// Output directory, overriding `output_dir` from the config.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SiteConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!("RUST_ENV is set to development: {}", config.is_development);

    let highlighter = CodeHighlighter::new(config.highlight_languages.iter().cloned());
    let renderer = MarkdownRenderer::new(highlighter);
    let content = load_content(&config, &renderer)
        .await
        .context("Failed to load initial content files")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Build { out } => {
            let out_dir = out.unwrap_or_else(|| config.output_dir.clone());
            let summary = export::export_site(&config, &content, &renderer, &out_dir).await?;
            info!(
                skipped = summary.skipped_posts,
                highlighted_blocks = renderer.highlighter().cached_blocks(),
                "Build finished"
            );
            Ok(())
        }
        Command::Serve => serve(config, content, renderer).await,
    }
}

async fn serve(
    config: SiteConfig,
    content: content_loader::SiteContent,
    renderer: MarkdownRenderer,
) -> anyhow::Result<()> {
    let port = config.port;
    let is_development = config.is_development;
    let state = Arc::new(AppState::new(content, config, renderer));

    // Hot-reload setup
    let (tx, _rx) = broadcast::channel(1);
    if is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        hot_reload::start_content_watcher(tx.clone(), state.clone());
    }

    let app = routes::build_router(RouterState {
        app_state: state,
        broadcaster: tx,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
