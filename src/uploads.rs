//! Multipart uploads and image storage

use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::{AppError, AppResult};

/// URL prefix the upload directory is served under
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Rejects declared types other than `image/*` and `application/octet-stream`.
    /// A missing content type is accepted; decoding decides.
    pub fn check_content_type(&self) -> AppResult<()> {
        match self.content_type.as_deref() {
            None => Ok(()),
            Some(ct) if ct.starts_with("image/") || ct == "application/octet-stream" => Ok(()),
            Some(ct) => Err(AppError::ValidationError(format!(
                "File must be an image (got {})",
                ct
            ))),
        }
    }
}

/// The `file` part plus every text field of a multipart body
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile { filename, content_type, bytes });
            } else if !name.is_empty() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// The uploaded file, rejecting a missing or empty part
    pub fn require_file(&mut self) -> AppResult<UploadedFile> {
        match self.file.take() {
            Some(file) if !file.bytes.is_empty() => Ok(file),
            _ => Err(AppError::ValidationError("No file uploaded".to_string())),
        }
    }

    /// A non-blank text field
    pub fn require_field(&self, name: &str) -> AppResult<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::ValidationError(format!("Missing field: {}", name)))
    }
}

/// Store image bytes under `<upload_dir>/<subdir>/<uuid>.<ext>` and return
/// the public URL path (`uploads/<subdir>/<file>`)
pub async fn save_image(upload_dir: &Path, subdir: &str, bytes: &[u8]) -> AppResult<String> {
    let format = image::guess_format(bytes)
        .map_err(|_| AppError::ValidationError("Uploaded file is not a recognised image".to_string()))?;
    let extension = format.extensions_str().first().copied().unwrap_or("img");

    let dir = upload_dir.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let filename = format!("{}.{}", uuid::Uuid::new_v4(), extension);
    tokio::fs::write(dir.join(&filename), bytes).await?;

    tracing::debug!("Stored {} byte upload as {}/{}", bytes.len(), subdir, filename);

    Ok(format!("{}/{}/{}", UPLOADS_ROUTE.trim_start_matches('/'), subdir, filename))
}
