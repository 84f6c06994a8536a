//! Blog server with on-demand generation
//!
//! Pages are served from the [`PageCache`]. A post that was never generated
//! gets the loading placeholder while it is built in the background; a post
//! past its revalidate interval is served stale while one background task
//! regenerates it.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::{Lookup, PageBody, PageCache};
use crate::cms::CmsError;
use crate::generator::Generator;
use crate::helpers::post_route;
use crate::templates::asset;
use crate::Blog;

/// Server state
pub struct ServerState {
    generator: Arc<Generator>,
    cache: Arc<PageCache>,
    public_dir: PathBuf,
    /// Site root without the trailing slash, empty when serving at `/`
    root: String,
}

impl ServerState {
    pub fn new(generator: Generator, cache: PageCache, public_dir: PathBuf, root: &str) -> Self {
        Self {
            generator: Arc::new(generator),
            cache: Arc::new(cache),
            public_dir,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }
}

#[derive(Debug, Deserialize)]
struct PostQuery {
    #[serde(rename = "ref")]
    preview_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CursorQuery {
    cursor: Option<String>,
}

/// Build the application router, with every route under the site root
pub fn router(state: Arc<ServerState>) -> Router {
    let root = state.root.clone();
    Router::new()
        .route(&format!("{}/", root), get(index_handler))
        .route(&format!("{}/post/:uid", root), get(post_handler))
        .route(&format!("{}/api/posts", root), get(api_posts_handler))
        .fallback(static_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the server
pub async fn start(blog: &Blog, ip: &str, port: u16) -> Result<()> {
    let generator = Generator::new(blog, blog.source()?)?;
    let cache = PageCache::new();

    match generator.prerender(&cache).await {
        Ok(count) => tracing::info!("Pre-rendered {} pages", count),
        Err(e) => tracing::warn!("Pre-rendering failed, pages will be built on demand: {:#}", e),
    }

    let state = Arc::new(ServerState::new(
        generator,
        cache,
        blog.public_dir.clone(),
        &blog.config.root,
    ));
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}{}", ip, port, blog.config.root);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    let route = "/";
    if let Lookup::Hit { body, .. } = state.cache.lookup(route, SystemTime::now()) {
        return page_response(body);
    }

    match state.generator.build_index().await {
        Ok(html) => {
            let body = PageBody::Html(html);
            state
                .cache
                .store(route, body.clone(), None, SystemTime::now());
            page_response(body)
        }
        Err(e) => {
            state.cache.abandon(route);
            tracing::error!("Failed to build index: {:#}", e);
            (StatusCode::BAD_GATEWAY, "Failed to load posts").into_response()
        }
    }
}

async fn post_handler(
    State(state): State<Arc<ServerState>>,
    Path(uid): Path<String>,
    Query(query): Query<PostQuery>,
) -> Response {
    if let Some(preview_ref) = query.preview_ref.as_deref() {
        return match state.generator.build_post(&uid, Some(preview_ref)).await {
            Ok(body) => no_store(page_response(body)),
            Err(e) => {
                tracing::error!("Failed to build preview of {:?}: {:#}", uid, e);
                (StatusCode::BAD_GATEWAY, "Failed to load preview").into_response()
            }
        };
    }

    let route = post_route(&uid);
    match state.cache.lookup(&route, SystemTime::now()) {
        Lookup::Hit { body, revalidate } => {
            if revalidate {
                regenerate(state.clone(), uid, route);
            }
            page_response(body)
        }
        Lookup::Miss { generate } => {
            if generate {
                regenerate(state.clone(), uid, route);
            }
            match state.generator.render_fallback() {
                Ok(html) => no_store(Html(html).into_response()),
                Err(e) => {
                    tracing::error!("Failed to render fallback: {:#}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    }
}

/// Build a post page in the background and store it in the cache
fn regenerate(state: Arc<ServerState>, uid: String, route: String) {
    tokio::spawn(async move {
        tracing::debug!("Generating {}", route);
        match state.generator.build_post(&uid, None).await {
            Ok(body) => state.cache.store(
                &route,
                body,
                Some(state.generator.revalidate()),
                SystemTime::now(),
            ),
            Err(e) => {
                tracing::warn!("Failed to generate {}: {:#}", route, e);
                state.cache.abandon(&route);
            }
        }
    });
}

async fn api_posts_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<CursorQuery>,
) -> Response {
    let posts = match query.cursor.as_deref() {
        Some(cursor) => state.generator.next_posts(cursor).await,
        None => state.generator.initial_posts().await,
    };

    match posts {
        Ok(posts) => {
            let next_url = state.generator.api_next_url(&posts);
            no_store(Json(state.generator.list_data(&posts, next_url)).into_response())
        }
        Err(CmsError::InvalidCursor(cursor)) => {
            tracing::debug!("Rejected cursor {:?}", cursor);
            (StatusCode::BAD_REQUEST, "Invalid cursor").into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to load more posts: {}", e);
            (StatusCode::BAD_GATEWAY, "Failed to load posts").into_response()
        }
    }
}

/// Serve embedded assets, then files from the public directory
async fn static_handler(
    State(state): State<Arc<ServerState>>,
    mut request: Request<Body>,
) -> Response {
    let Some(path) = strip_root(&state.root, request.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some((content_type, content)) = asset(&path) {
        return ([(header::CONTENT_TYPE, content_type)], content).into_response();
    }

    let uri = match request.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    match uri.parse() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    let mut service = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Request path relative to the site root
fn strip_root(root: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

fn page_response(body: PageBody) -> Response {
    match body {
        PageBody::Html(html) => Html(html).into_response(),
        PageBody::Redirect(to) => Redirect::temporary(&to).into_response(),
    }
}

fn no_store(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}
