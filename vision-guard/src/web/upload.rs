use crate::web::error::AppError;
use actix_multipart::Multipart;
use futures::TryStreamExt;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Sorted, as listed on the dashboard.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpeg", "jpg", "png"];
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["avi", "mkv", "mov", "mp4"];

pub fn allowed_file(filename: &str, allowed: &[&str]) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| allowed.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Reduce a client supplied name to a safe flat file name.
///
/// The name is NFKD-normalised so accented letters keep their base letter,
/// then remaining non-ASCII characters are dropped, path separators become spaces, whitespace
/// runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing `.`/`_` are stripped. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let ascii = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect::<String>();

    ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Upload {
    /// No file in the expected field, or an empty file name.
    Missing,
    Unsupported,
    Saved { path: PathBuf, filename: String },
}

/// Stream the file in `field_name` into `dir` as `<uuid>_<secure name>`.
pub async fn save_upload(
    mut payload: Multipart,
    field_name: &str,
    allowed: &[&str],
    dir: &Path,
) -> Result<Upload, AppError> {
    while let Some(mut field) = payload.try_next().await? {
        let (name, client_filename) = match field.content_disposition() {
            Some(disposition) => (
                disposition.get_name().map(str::to_string),
                disposition.get_filename().map(str::to_string),
            ),
            None => (None, None),
        };

        if name.as_deref() != Some(field_name) {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let client_filename = match client_filename {
            Some(filename) if !filename.is_empty() => filename,
            _ => return Ok(Upload::Missing),
        };
        if !allowed_file(&client_filename, allowed) {
            debug!("Rejected upload {client_filename:?}");
            return Ok(Upload::Unsupported);
        }

        let mut filename = secure_filename(&client_filename);
        if filename.is_empty() {
            filename = "upload".to_string();
        }

        let path = dir.join(format!("{}_{filename}", Uuid::new_v4().simple()));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written = 0usize;
        while let Some(chunk) = field.try_next().await? {
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Saved upload {filename} ({written} bytes) to {}", path.display());
        return Ok(Upload::Saved { path, filename });
    }

    Ok(Upload::Missing)
}
