//! Route handlers and router assembly.
//!
//! The HTTP layer is thin glue: it parses the `queries` parameter, calls
//! into [`crate::updates`], and serializes the result. Errors surface as
//! 5xx responses through [`MazurkaError`]'s `IntoResponse`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::MazurkaError;
use crate::models::{Fortune, World, random_world_id};
use crate::perf;
use crate::storage::WorldStore;
use crate::updates::{parse_queries, select_random_worlds, update_random_worlds};

static SERVER_NAME: HeaderValue = HeaderValue::from_static("mazurka");

/// Shared application state available in all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorldStore>,
}

/// Build the full benchmark router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/json", get(json))
        .route("/plaintext", get(plaintext))
        .route("/db", get(db))
        .route("/queries", get(queries))
        .route("/updates", get(updates))
        .route("/fortunes", get(fortunes))
        .layer(middleware::from_fn(common_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Add the `Server` and cached `Date` headers to every response.
async fn common_headers(req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(header::SERVER, SERVER_NAME.clone());
    headers.insert(header::DATE, perf::cached_date_header());
    res
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

async fn json() -> Json<Message> {
    Json(Message {
        message: "Hello, World!",
    })
}

async fn plaintext() -> &'static str {
    "Hello, World!"
}

async fn db(State(state): State<AppState>) -> Result<Json<World>, MazurkaError> {
    let world = state.store.find_world(random_world_id()).await?;
    Ok(Json(world))
}

async fn queries(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<World>>, MazurkaError> {
    let n = parse_queries(params.get("queries").map(String::as_str));
    let worlds = select_random_worlds(state.store.as_ref(), n).await?;
    Ok(Json(worlds))
}

async fn updates(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<World>>, MazurkaError> {
    let n = parse_queries(params.get("queries").map(String::as_str));
    let worlds = update_random_worlds(state.store.as_ref(), n).await?;
    Ok(Json(worlds))
}

async fn fortunes(State(state): State<AppState>) -> Result<Html<String>, MazurkaError> {
    let mut fortunes = state.store.list_fortunes().await?;
    fortunes.push(Fortune {
        id: 0,
        message: "Additional fortune added at request time.".to_string(),
    });
    fortunes.sort_by(|a, b| a.message.cmp(&b.message));
    Ok(Html(render_fortunes(&fortunes)))
}

/// Render the fortunes table. Messages are user data and must be escaped.
fn render_fortunes(fortunes: &[Fortune]) -> String {
    use std::fmt::Write as _;

    let mut html = String::with_capacity(512 + fortunes.len() * 64);
    html.push_str(
        "<!DOCTYPE html><html><head><title>Fortunes</title></head>\
         <body><table><tr><th>id</th><th>message</th></tr>",
    );
    for f in fortunes {
        let _ = write!(html, "<tr><td>{}</td><td>", f.id);
        escape_html_into(&mut html, &f.message);
        html.push_str("</td></tr>");
    }
    html.push_str("</table></body></html>");
    html
}

fn escape_html_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
