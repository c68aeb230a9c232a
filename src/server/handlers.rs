//! Endpoint handlers
//!
//! Each handler turns its outcome into a complete response; errors never
//! escape past this layer.

use super::response;
use super::AppState;
use crate::auth::{AuthError, AuthRequest};
use crate::config::{API_VERSION, SERVICE_NAME};
use crate::upload::{DirectUploadForm, UploadError, UploadRequestBody, UploadResult, UploadedFile};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use serde_json::json;
use tracing::{info, warn};

/// Ceiling for each text field of a multipart form
const MAX_FORM_FIELD_BYTES: u64 = 64 * 1024;

/// Name of the multipart part that carries the file
const FILE_FIELD: &str = "file";

pub fn health() -> Response<String> {
    response::json(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": API_VERSION,
        }),
    )
}

pub fn root() -> Response<String> {
    response::json(
        StatusCode::OK,
        &json!({
            "message": format!("Welcome to the {} API", SERVICE_NAME),
            "docs_url": "/docs",
        }),
    )
}

/// `GET /R2api/token`
pub async fn get_token(state: &AppState) -> Response<String> {
    let info = state.tokens.describe().await;
    response::json(
        StatusCode::OK,
        &json!({
            "status": "success",
            "token": info.token,
            "is_permanent": info.is_permanent,
        }),
    )
}

/// `POST /R2api/init-token`
pub async fn init_token(state: &AppState) -> Response<String> {
    match state.tokens.issue_default().await {
        Ok(token) => response::json(
            StatusCode::OK,
            &json!({
                "status": "success",
                "message": "API token initialized",
                "token": token.as_str(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Failed to initialize API token");
            response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate token: {}", e),
            )
        }
    }
}

/// `POST /R2api/reset-token`
pub async fn reset_token(state: &AppState) -> Response<String> {
    match state.tokens.reset().await {
        Ok(token) => response::json(
            StatusCode::OK,
            &json!({
                "status": "success",
                "message": "API token reset successfully",
                "token": token.as_str(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Failed to reset API token");
            response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to reset token: {}", e),
            )
        }
    }
}

/// Run the bearer check for a protected route
///
/// Returns the rejection response when the request may not proceed.
pub async fn authorize(state: &AppState, parts: &Parts) -> Result<(), Response<String>> {
    let auth_request = AuthRequest::from_parts(parts);

    match state.authenticator.authenticate(&auth_request).await {
        Ok(result) => {
            info!(subject = %result.subject, "Request authenticated");
            Ok(())
        }
        Err(e @ AuthError::Verification(_)) => {
            warn!(error = %e, path = %auth_request.path, "Token verification failed");
            Err(response::error(e.status_code(), e.to_string()))
        }
        Err(e) => {
            warn!(error = %e, path = %auth_request.path, "Authentication rejected");
            Err(response::unauthorized(e.to_string()))
        }
    }
}

/// `POST /R2api/upload`
pub async fn upload(state: &AppState, body: Incoming) -> Response<String> {
    let result: Result<UploadResult, UploadError> = async {
        let bytes = Limited::new(body, state.config.upload.max_json_body)
            .collect()
            .await
            .map_err(|e| UploadError::Validation(format!("unable to read request body: {}", e)))?
            .to_bytes();

        let request: UploadRequestBody = serde_json::from_slice(&bytes)
            .map_err(|e| UploadError::Validation(e.to_string()))?;

        state.ingest.upload_from_url(request.validate()?).await
    }
    .await;

    upload_response(result)
}

/// `POST /R2api/upload-direct`
pub async fn upload_direct(state: &AppState, parts: &Parts, body: Incoming) -> Response<String> {
    let result: Result<UploadResult, UploadError> = async {
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| UploadError::Validation("multipart/form-data body required".into()))?;
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| UploadError::Validation(format!("invalid multipart request: {}", e)))?;

        // The file part is bounded by the ingest buffer, not by multer
        let constraints = Constraints::new().size_limit(
            SizeLimit::new()
                .per_field(MAX_FORM_FIELD_BYTES)
                .for_field(FILE_FIELD, u64::MAX),
        );
        let mut multipart =
            Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

        let mut form = DirectUploadForm::default();
        let mut file = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|m| m.to_string());
                let bytes = state.ingest.read_direct_file(field).await?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                if !form.set_field(&name, value) {
                    tracing::debug!(field = %name, "Ignoring unknown form field");
                }
            }
        }

        state.ingest.upload_direct(form.validate(file)?).await
    }
    .await;

    upload_response(result)
}

fn multipart_error(e: multer::Error) -> UploadError {
    UploadError::Validation(format!("invalid multipart request: {}", e))
}

fn upload_response(result: Result<UploadResult, UploadError>) -> Response<String> {
    match result {
        Ok(data) => response::json(
            StatusCode::OK,
            &json!({
                "status": "success",
                "message": "File uploaded successfully",
                "data": data,
            }),
        ),
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Upload request failed");
            response::error(e.status_code(), e.to_string())
        }
    }
}
