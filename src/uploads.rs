//! Property photos go to an object store keyed by owner and entity. Nothing
//! ever deletes an object, so images dropped from a property stay behind.

use std::future::Future;
use std::path::{Component, Path, PathBuf};

use infer::Infer;
use mime_guess::MimeGuess;
use tracing::info;

use crate::error::codes;
use crate::id::random_suffix;
use crate::mutation::{MutationPipeline, SubmitError, WriteAction};
use crate::repo::properties;
use crate::session::OwnerId;
use crate::store::DocumentStore;
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const IMAGES_ROOT: &str = "images";

pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` and return the URL it is served from.
    fn put(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl Future<Output = AppResult<String>> + Send;
}

/// Objects as plain files under `root`, served from `public_base_url`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(AppError::new("OBJECTS/INVALID_PATH", "Object path must be relative")
                .with_context("path", path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> AppResult<String> {
        let target = self.resolve(path)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        info!(
            target: "landlord",
            event = "object_put",
            path,
            content_type,
            size_bytes = bytes.len()
        );
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            path
        ))
    }
}

/// `images/{owner}/{entity}/{timestamp}-{random}.{ext}`
pub fn image_object_path(owner: &OwnerId, entity_id: &str, ext: &str) -> String {
    object_path_at(owner, entity_id, now_ms(), &random_suffix(), ext)
}

fn object_path_at(owner: &OwnerId, entity_id: &str, ts_ms: i64, suffix: &str, ext: &str) -> String {
    format!("{IMAGES_ROOT}/{owner}/{entity_id}/{ts_ms}-{suffix}.{ext}")
}

/// Content type and extension for an upload, sniffed from the bytes first and
/// the file name second. Anything that is not an image is refused.
pub fn detect_image(bytes: &[u8], file_name: &str) -> AppResult<(String, String)> {
    let sniffed = Infer::new()
        .get(bytes)
        .map(|kind| (kind.mime_type().to_string(), kind.extension().to_string()));
    let detected = sniffed.or_else(|| {
        let guess = MimeGuess::from_path(file_name).first()?;
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        Some((guess.essence_str().to_string(), ext))
    });
    match detected {
        Some((mime, ext)) if mime.starts_with("image/") => Ok((mime, ext)),
        other => Err(AppError::new(codes::UNSUPPORTED_UPLOAD, "Only image files can be uploaded.")
            .with_context("file", file_name.to_string())
            .with_context(
                "mime",
                other.map(|(mime, _)| mime).unwrap_or_else(|| "unknown".into()),
            )),
    }
}

/// Store an image for a property and append its URL to the property.
pub async fn upload_property_image<S, O>(
    pipeline: &MutationPipeline<S>,
    objects: &O,
    owner: &OwnerId,
    property_id: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, SubmitError>
where
    S: DocumentStore,
    O: ObjectStore,
{
    let doc = crate::repo::located(
        crate::locator::property(Some(owner), Some(property_id)),
        "property",
        property_id,
    )?;
    let action = WriteAction::Update(doc, serde_json::Map::new());
    let (mime, ext) = match detect_image(bytes, file_name) {
        Ok(found) => found,
        Err(err) => return Err(pipeline.fail("property_image_upload", &action, err)),
    };
    let path = image_object_path(owner, property_id, &ext);
    let url = match objects.put(&path, bytes, &mime).await {
        Ok(url) => url,
        Err(err) => return Err(pipeline.fail("property_image_upload", &action, err)),
    };
    properties::add_image_url(pipeline, owner, property_id, &url).await?;
    Ok(url)
}
