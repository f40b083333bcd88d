//! Bulk data handlers: import, export, counts and purge

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::SecondsFormat;
use std::str::FromStr;
use tracing::{debug, info, warn};

use core_kernel::OperationMetadata;
use domain_claims::{
    export_claims, import_claims, DataCounts, FileFormat, ImportFile, ImportMode, ImportReport,
    ImportRequest,
};

use crate::auth::Claims;
use crate::dto::data::{ExportParams, ImportForm, PurgeResponse};
use crate::middleware::REQUEST_ID_HEADER;
use crate::{error::ApiError, AppState};

/// Export timestamp header
pub const EXPORT_TIMESTAMP_HEADER: &str = "x-export-timestamp";
/// Number of exported claims header
pub const RECORD_COUNT_HEADER: &str = "x-record-count";

/// Imports claims from a multipart upload
///
/// Form fields: `file` (required), `details_file`, `mode` (`add` or
/// `overwrite`, default `add`) and `format` (`csv` or `json`, detected when
/// absent).
pub async fn import_data(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let mut claims_file: Option<ImportFile> = None;
    let mut details_file: Option<ImportFile> = None;
    let mut form = ImportForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "details_file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|f| !f.is_empty());
                let bytes = field.bytes().await?;
                // Browsers send an empty part for an unset file input
                if bytes.is_empty() && filename.is_none() {
                    continue;
                }
                let mut file = ImportFile::new(bytes.to_vec());
                if let Some(filename) = filename {
                    file = file.with_filename(filename);
                }
                if name == "file" {
                    claims_file = Some(file);
                } else {
                    details_file = Some(file);
                }
            }
            "mode" => form.mode = Some(field.text().await?),
            "format" => form.format = Some(field.text().await?),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let claims_file = claims_file.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded. Use 'file' field in multipart form".to_string())
    })?;

    let mode = match form.mode.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        Some(mode) => ImportMode::from_str(mode).map_err(ApiError::BadRequest)?,
        None => ImportMode::default(),
    };

    let mut metadata = OperationMetadata::default().initiated_by(user.sub.clone());
    if let Some(request_id) = headers.get(REQUEST_ID_HEADER).and_then(|h| h.to_str().ok()) {
        metadata.correlation_id = Some(request_id.to_string());
    }

    let mut request = ImportRequest::new(claims_file, mode)
        .with_limits(state.config.import_limits())
        .with_metadata(metadata);
    if let Some(format) = form.format.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        request = request.with_format(FileFormat::from_str(format)?);
    }
    if let Some(details) = details_file {
        request = request.with_details(details);
    }

    info!(user = %user.sub, mode = %mode, "Import requested");
    let report = import_claims(&*state.store, request).await?;
    Ok(Json(report))
}

/// Exports claims as a downloadable file
pub async fn export_data(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format = params.file_format()?;
    let filter = params.filter()?;

    let file = export_claims(&*state.store, format, &filter).await?;
    info!(
        user = %user.sub,
        format = %format,
        records = file.record_count,
        "Export downloaded"
    );

    let headers = [
        (header::CONTENT_TYPE, file.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.filename),
        ),
        (
            HeaderName::from_static(EXPORT_TIMESTAMP_HEADER),
            file.exported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            HeaderName::from_static(RECORD_COUNT_HEADER),
            file.record_count.to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, file.body).into_response())
}

/// Row counts per table
pub async fn data_stats(State(state): State<AppState>) -> Result<Json<DataCounts>, ApiError> {
    Ok(Json(state.store.data_counts().await?))
}

/// Deletes all claims data
pub async fn purge_data(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let deleted = state.store.purge().await?;
    warn!(
        user = %user.sub,
        claims = deleted.claims,
        details = deleted.details,
        flags = deleted.flags,
        notes = deleted.notes,
        "All claims data purged"
    );
    Ok(Json(PurgeResponse { deleted }))
}
