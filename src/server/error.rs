use crate::error::StudioError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// Handler failures, rendered as an inline error fragment so the page can
/// swap it in place of the control that failed.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Studio(#[from] StudioError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Setup(#[from] anyhow::Error),

    #[error("render failed: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Studio(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn escape(text: &str) -> String {
    handlebars::html_escape(text)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!("request failed ({}): {}", status.as_u16(), self);
        let body = format!("<div class=\"error\">Error: {}</div>", escape(&self.to_string()));
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        let err = ServerError::from(StudioError::IndexOutOfRange { index: 9, len: 2 });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = ServerError::from(StudioError::MissingPath("video record"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_renders_as_400() {
        let resp = ServerError::BadRequest("<b>".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
