use std::path::PathBuf;

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::response::Response;

use satchel_core::Envelope;

use crate::errors::{failure_response, json_response};
use crate::forms::{FormEncoding, FormError, FormOptions, FormRequest};

/// Directory uploads are written to.
#[derive(Debug, Clone)]
pub struct UploadDir(pub PathBuf);

/// Store the multipart file field `file`; an optional `title` field is echoed.
pub async fn upload(Extension(UploadDir(dir)): Extension<UploadDir>, req: Request) -> Response {
    let mut form = FormRequest::new(req);

    let saved = form
        .get_and_save_file(&dir, "file", FormOptions::fatal(FormEncoding::Multipart))
        .await
        .and_then(|saved| saved.ok_or_else(|| FormError::MissingFile("file".to_string())));
    let path = match saved {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "upload rejected");
            return failure_response(e);
        }
    };

    let title = form
        .get_param(
            "title",
            FormOptions::silent(FormEncoding::Multipart).already_parsed(),
        )
        .await
        .ok()
        .flatten();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(file = %file_name, "upload stored");

    let mut envelope = Envelope::new().authorized(true);
    envelope.set("saved", file_name);
    if let Some(title) = title {
        envelope.set("title", title);
    }
    envelope.mark_success();

    json_response(StatusCode::OK, envelope.to_json())
}
