use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Json, Router};
use index_core::search::rank;
use index_core::{Normalizer, SearchResult, SharedIndex};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SharedIndex>,
    pub normalizer: Arc<dyn Normalizer>,
}

impl AppState {
    pub fn new(index: Arc<SharedIndex>, normalizer: Arc<dyn Normalizer>) -> Self { Self { index, normalizer } }

    /// Ranked results for a raw query line; empty when nothing survives normalization.
    pub fn search(&self, line: &str, exact: bool) -> Vec<SearchResult> {
        match index_core::Query::parse(line, self.normalizer.as_ref()) {
            Some(query) => rank(&self.index, &query, exact),
            None => Vec::new(),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub exact: bool,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/", get(form_page).post(results_page))
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

const SEARCH_FORM: &str = r#"<form method="POST" action="/">
<p><input type="text" placeholder="Search.." name="query" id="query" maxlength="100" size="60"></p>
<p><input type="submit" value="Search"></p>
</form>"#;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    ))
}

pub async fn form_page() -> Html<String> { page("Search Engine", SEARCH_FORM) }

/// Partial search for the submitted query, one link per matching location.
pub async fn results_page(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Html<String> {
    let results = state.search(&form.query, false);
    tracing::debug!(query = %form.query, hits = results.len(), "form search");

    let mut body = String::from(SEARCH_FORM);
    body.push_str("\n<ol>\n");
    for result in &results {
        let href = escape_html(&result.location);
        let _ = writeln!(body, "<li><a href=\"{href}\">{href}</a></li>");
    }
    body.push_str("</ol>");
    page("Results", &body)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = Instant::now();
    let results = state.search(&params.q, params.exact);
    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: results.len(), results })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_html;

    #[test]
    fn escapes_markup_in_locations() {
        assert_eq!(escape_html("http://a.test/?x=1&y=<b>\"'"), "http://a.test/?x=1&amp;y=&lt;b&gt;&quot;&#39;");
    }
}
