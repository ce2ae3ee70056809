//! Media store and the `thumbnail` entry point.
//!
//! Incoming images arrive as base64 text on the WebSocket.  They are
//! decoded, re-encoded as JPEG at a fixed quality to cap storage and
//! bandwidth, written under the media directory, and exposed through a
//! stable public URL (the server serves the directory at `/media`).

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::render;
use crate::state::{AppState, SessionCtx};

/// JPEG quality for recompressed uploads.
const JPEG_QUALITY: u8 = 30;

/// Filesystem-backed image store returning stable public URLs.
#[derive(Debug)]
pub struct MediaStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, public_base_url: String) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Media(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store a profile thumbnail for `username`, returning its public URL.
    pub async fn put_thumbnail(&self, username: &str, data: &[u8]) -> Result<String, ServerError> {
        self.put(&["thumbnails", username], username, data).await
    }

    /// Store a message image attachment, returning its public URL.
    pub async fn put_message_image(
        &self,
        username: &str,
        data: &[u8],
    ) -> Result<String, ServerError> {
        self.put(&["messages", username], username, data).await
    }

    async fn put(
        &self,
        subdirs: &[&str],
        username: &str,
        data: &[u8],
    ) -> Result<String, ServerError> {
        let jpeg = recompress(data)?;
        let filename = format!("{}_{}.jpg", Utc::now().timestamp(), username);

        let dir = self.safe_subpath(subdirs)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            ServerError::Media(format!("Failed to create '{}': {}", dir.display(), e))
        })?;

        let file_path = dir.join(&filename);
        fs::write(&file_path, &jpeg).await.map_err(|e| {
            ServerError::Media(format!("Failed to write '{}': {}", file_path.display(), e))
        })?;

        debug!(path = %file_path.display(), size = jpeg.len(), "Stored media file");

        let url_path: Vec<&str> = subdirs.iter().copied().chain([filename.as_str()]).collect();
        Ok(format!(
            "{}/media/{}",
            self.public_base_url,
            url_path.join("/")
        ))
    }

    /// Build a path under the base directory, rejecting traversal
    /// characters in any component.
    fn safe_subpath(&self, components: &[&str]) -> Result<PathBuf, ServerError> {
        let mut path = self.base_path.clone();
        for component in components {
            if component.is_empty()
                || component.contains('/')
                || component.contains('\\')
                || component.contains("..")
            {
                return Err(ServerError::Media("Path traversal detected".to_string()));
            }
            path.push(component);
        }
        Ok(path)
    }
}

/// Decode any supported image format and re-encode as JPEG.
fn recompress(data: &[u8]) -> Result<Vec<u8>, ServerError> {
    let img = image::load_from_memory(data)
        .map_err(|e| ServerError::Media(format!("Invalid image payload: {e}")))?;

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| ServerError::Media(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Gateway entry point
// ---------------------------------------------------------------------------

/// `thumbnail`: store a new profile picture and push the refreshed identity
/// to every one of the caller's devices.
pub async fn thumbnail(
    state: &AppState,
    ctx: &SessionCtx,
    base64_payload: &str,
    filename: &str,
) -> crate::error::Result<()> {
    let bytes = match BASE64.decode(base64_payload.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(user = %ctx.user.username, error = %e, "thumbnail payload is not valid base64");
            return Ok(());
        }
    };

    debug!(
        user = %ctx.user.username,
        filename = filename,
        size = bytes.len(),
        "processing thumbnail upload"
    );

    let url = state.media.put_thumbnail(&ctx.user.username, &bytes).await?;

    let updated = {
        let db = state.db.lock().await;
        db.set_thumbnail_url(ctx.user.id, &url)?;
        db.get_user(ctx.user.id)?
    };

    state
        .router
        .send(&ctx.user.username, "thumbnail", &render::user(&updated));
    Ok(())
}
