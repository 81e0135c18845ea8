//! Browser UI shell. The page is static; every action goes through the JSON API.

use axum::response::Html;

/// Single-page UI served at `/`.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Serve the UI shell.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
