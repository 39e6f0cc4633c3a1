mod handlers;
mod middleware;

use std::path::PathBuf;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::{
    layer::util::{Identity, Stack},
    ServiceBuilder,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::deck::{Deck, Segmenter};
use crate::proxy::UpstreamProxy;
use crate::render::Renderer;
use crate::store::{SlideStore, StoreError, WELCOME_DOCUMENT};
use crate::supervisor::Supervisor;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the markdown file.
pub const UPLOAD_FIELD: &str = "file";

/// Shared state for the in-process rendering mode.
#[derive(Clone)]
pub struct StaticState {
    pub store: SlideStore,
    pub segmenter: Segmenter,
    pub renderer: Renderer,
}

impl StaticState {
    pub fn new(store: SlideStore) -> Self {
        Self {
            store,
            segmenter: Segmenter::default(),
            renderer: Renderer::new(),
        }
    }

    /// Segment and render `markdown`, then persist both the document and
    /// the page. Returns the rendered deck.
    pub fn publish(&self, markdown: &str) -> Result<Deck, StoreError> {
        let deck = self.segmenter.segment(markdown);
        let page = self.renderer.page(&deck);
        self.store.save_document(markdown.as_bytes())?;
        self.store.save_page(&page)?;
        Ok(deck)
    }

    /// Create the static directory and publish the welcome deck if no page
    /// has been generated yet.
    pub fn prepare(&self) -> Result<(), StoreError> {
        self.store.ensure_dir()?;
        if !self.store.has_page() {
            self.publish(WELCOME_DOCUMENT)?;
            tracing::info!("Published welcome deck to {}", self.store.page_path().display());
        }
        Ok(())
    }
}

/// Shared state for the delegated rendering mode.
#[derive(Clone)]
pub struct ProxyState {
    pub store: SlideStore,
    pub supervisor: Supervisor,
    pub proxy: UpstreamProxy,
}

impl ProxyState {
    pub fn new(store: SlideStore, supervisor: Supervisor, proxy: UpstreamProxy) -> Self {
        Self {
            store,
            supervisor,
            proxy,
        }
    }

    /// Create the slides directory and seed the welcome document. Returns
    /// the path the rendering server should be pointed at.
    pub fn prepare(&self) -> Result<PathBuf, StoreError> {
        self.store.ensure_dir()?;
        self.store.seed_document()?;
        Ok(self.store.document_path())
    }
}

/// Body limit and CORS policy shared by both upload endpoints.
fn upload_layers() -> ServiceBuilder<Stack<CorsLayer, Stack<DefaultBodyLimit, Identity>>> {
    ServiceBuilder::new()
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::upload_cors())
}

pub fn create_static_router(state: StaticState) -> Router {
    let serve = ServeDir::new(state.store.dir());

    Router::new()
        .route(
            "/upload",
            post(handlers::upload_static)
                .fallback(handlers::method_not_allowed)
                .layer(upload_layers()),
        )
        .route("/health", get(handlers::health))
        .fallback_service(serve)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn create_proxy_router(state: ProxyState) -> Router {
    Router::new()
        .route(
            "/upload",
            post(handlers::upload_proxy)
                .fallback(handlers::method_not_allowed)
                .layer(upload_layers()),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
