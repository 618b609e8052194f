use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::ProviderSettings;
use crate::models::settings::{ResumeMeta, SyncSettings};
use crate::scoring::validation::{validate_settings, verify_enabled_keys, verify_provider_key};
use crate::state::AppState;
use crate::store;

/// Multipart field names accepted for the resume file.
const RESUME_FIELDS: [&str; 2] = ["file", "resume"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeUploadResponse {
    pub meta: ResumeMeta,
    pub text_chars: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSettingsParams {
    /// Also test every enabled provider's API key against the provider before saving.
    #[serde(default)]
    pub validate_key: bool,
}

#[derive(Debug, Serialize)]
pub struct KeyCheckResponse {
    pub valid: bool,
    pub provider: &'static str,
}

/// GET /api/v1/settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
) -> Result<Json<SyncSettings>, AppError> {
    Ok(Json(store::load_settings(state.store.as_ref()).await?))
}

/// PUT /api/v1/settings
///
/// The resume is managed through its own endpoint; stored resume fields are
/// kept regardless of what the body carries.
pub async fn handle_put_settings(
    State(state): State<AppState>,
    Query(params): Query<PutSettingsParams>,
    Json(mut incoming): Json<SyncSettings>,
) -> Result<Json<SyncSettings>, AppError> {
    let kv = state.store.as_ref();
    let stored = store::load_settings(kv).await?;
    incoming.resume_meta = stored.resume_meta;
    incoming.resume_text = stored.resume_text;

    validate_settings(&incoming)?;
    if params.validate_key {
        verify_enabled_keys(state.llm.as_ref(), &incoming).await?;
    }
    store::save_settings(kv, &incoming).await?;
    info!(
        scoring_enabled = incoming.scoring_settings.enabled,
        download_option = ?incoming.download_option,
        "settings saved"
    );
    Ok(Json(incoming))
}

/// POST /api/v1/settings/validate-key
///
/// Tests one provider's credentials without saving anything.
pub async fn handle_validate_key(
    State(state): State<AppState>,
    Json(settings): Json<ProviderSettings>,
) -> Result<Json<KeyCheckResponse>, AppError> {
    verify_provider_key(state.llm.as_ref(), "apiKey", &settings).await?;
    Ok(Json(KeyCheckResponse {
        valid: true,
        provider: settings.provider.as_str(),
    }))
}

/// POST /api/v1/settings/resume
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ResumeUploadResponse>, AppError> {
    let mut upload: Option<(String, Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if !field.name().is_some_and(|n| RESUME_FIELDS.contains(&n)) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;
        upload = Some((file_name, content_type, data));
        break;
    }
    let (file_name, content_type, data) = upload
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;

    let text = resume_text(&file_name, content_type.as_deref(), data.clone()).await?;
    let meta = ResumeMeta {
        file_name,
        size_bytes: data.len() as u64,
        uploaded_at: Utc::now(),
    };
    store::save_resume(state.store.as_ref(), Some(&meta), Some(&text)).await?;
    info!(file = %meta.file_name, bytes = meta.size_bytes, chars = text.chars().count(), "resume stored");

    Ok(Json(ResumeUploadResponse {
        text_chars: text.chars().count(),
        meta,
    }))
}

/// DELETE /api/v1/settings/resume
pub async fn handle_delete_resume(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    store::save_resume(state.store.as_ref(), None, None).await?;
    info!("resume removed");
    Ok(StatusCode::NO_CONTENT)
}

fn is_pdf(file_name: &str, content_type: Option<&str>, data: &[u8]) -> bool {
    file_name.to_lowercase().ends_with(".pdf")
        || content_type == Some("application/pdf")
        || data.starts_with(b"%PDF")
}

async fn resume_text(
    file_name: &str,
    content_type: Option<&str>,
    data: Bytes,
) -> Result<String, AppError> {
    let text = if is_pdf(file_name, content_type, &data) {
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
            .map_err(|e| {
                warn!("PDF text extraction failed: {e}");
                AppError::Validation(format!("could not read text from PDF: {e}"))
            })?
    } else {
        String::from_utf8(data.to_vec())
            .map_err(|_| AppError::Validation("resume must be a PDF or UTF-8 text".to_string()))?
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation("resume contains no text".to_string()));
    }
    Ok(text)
}
