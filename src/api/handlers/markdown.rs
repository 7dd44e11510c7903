use axum::Json;

use crate::api::types::{MarkdownPreviewRequest, MarkdownPreviewResponse};
use crate::markdown::render_markdown;

/// Render markdown the way policies and training modules are displayed.
///
/// POST /api/markdown/preview
#[utoipa::path(
    post,
    path = "/api/markdown/preview",
    request_body = MarkdownPreviewRequest,
    responses(
        (status = 200, description = "Rendered HTML", body = MarkdownPreviewResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "markdown"
)]
pub async fn preview_markdown(
    Json(request): Json<MarkdownPreviewRequest>,
) -> Json<MarkdownPreviewResponse> {
    Json(MarkdownPreviewResponse {
        html: render_markdown(&request.markdown),
    })
}
