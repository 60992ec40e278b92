//! Static browser frontend

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Serve the interactive extraction page
#[utoipa::path(
    get,
    path = "/",
    tag = "frontend",
    responses(
        (status = 200, description = "HTML page", content_type = "text/html")
    )
)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
