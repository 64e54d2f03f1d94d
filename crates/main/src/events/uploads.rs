use std::path::Path;

use rocket::fs::TempFile;

use crate::{error::ApiError, util::short_random};

pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Moves an uploaded file under `root` with a generated name and returns the
/// public path it will be served from.
pub async fn store(
    root: &Path,
    file: &mut TempFile<'_>,
    label: &str,
) -> Result<String, ApiError> {
    rocket::tokio::fs::create_dir_all(root).await?;

    let extension = file
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|ext| ext.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    let name = format!(
        "{label}-{}-{}.{extension}",
        chrono::Utc::now().timestamp_millis(),
        short_random(12)
    );

    file.move_copy_to(root.join(&name)).await?;
    Ok(format!("{PUBLIC_PREFIX}{name}"))
}

/// Deletes a previously stored upload. Used to clean up after an operation
/// that stored files and then failed.
pub async fn discard(root: &Path, public_path: &str) {
    let Some(name) = public_path.strip_prefix(PUBLIC_PREFIX) else {
        return;
    };
    if name.contains('/') || name.contains("..") {
        return;
    }
    if let Err(e) = rocket::tokio::fs::remove_file(root.join(name)).await {
        tracing::warn!("Could not remove upload {public_path}: {e}");
    }
}
