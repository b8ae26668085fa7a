//! Pipeline artifacts: the job's artifact descriptors, the store they are
//! fetched from, and unpacking of the source bundle.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

pub const SOURCE_BUNDLE: &str = "SourceBundle";
pub const IMAGE_NAME_TAG: &str = "ImageNameTag";

// ---------------------------------------------------------------------------
// Artifact descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub bucket_name: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub s3_location: S3Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub revision: Option<String>,
    pub location: ArtifactLocation,
}

impl Artifact {
    pub fn s3(&self) -> &S3Location {
        &self.location.s3_location
    }
}

/// Find the artifact called `name`; its absence is a configuration error.
pub fn find<'a>(artifacts: &'a [Artifact], name: &str) -> Result<&'a Artifact> {
    artifacts.iter().find(|a| a.name == name).ok_or_else(|| {
        DeployError::config(format!(
            "input artifact '{name}' is required ({SOURCE_BUNDLE} and {IMAGE_NAME_TAG} must both be provided)"
        ))
    })
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

pub trait ArtifactStore {
    /// Fetch the object at `location` into the file `dest`.
    fn download(&self, location: &S3Location, dest: &Path) -> Result<()>;
}

/// The two inputs a deployment needs, resolved from the pipeline artifacts.
#[derive(Debug, Clone)]
pub struct DeploymentInputs {
    pub template_body: String,
    pub image: String,
}

/// Download the source bundle and image tag, unpack the bundle, and read the
/// template at `template_path` (relative to the bundle root).
pub fn fetch_inputs<S: ArtifactStore>(
    store: &S,
    bundle: &Artifact,
    image_tag: &Artifact,
    template_path: &Path,
) -> Result<DeploymentInputs> {
    let template_path = bundle_relative(template_path)?;
    let work = TempDir::new()?;

    let bundle_file = work.path().join("bundle.zip");
    tracing::info!(bucket = %bundle.s3().bucket_name, key = %bundle.s3().object_key, "downloading source bundle");
    store.download(bundle.s3(), &bundle_file)?;

    let image_file = work.path().join("image-name-tag");
    tracing::info!(bucket = %image_tag.s3().bucket_name, key = %image_tag.s3().object_key, "downloading image name tag");
    store.download(image_tag.s3(), &image_file)?;

    let unpacked = work.path().join("bundle");
    unpack_bundle(&bundle_file, &unpacked)?;

    let template_file = unpacked.join(&template_path);
    if !template_file.is_file() {
        return Err(DeployError::config(format!(
            "template '{}' not found in {SOURCE_BUNDLE}",
            template_path.display()
        )));
    }
    let template_body = std::fs::read_to_string(&template_file)?;
    tracing::info!(template = %template_path.display(), bytes = template_body.len(), "template loaded");

    let image = read_image_tag(&image_file)?;
    tracing::info!(image = %image, "image resolved");

    Ok(DeploymentInputs {
        template_body,
        image,
    })
}

/// Extract a zip bundle into `dest`, creating it if needed.
pub fn unpack_bundle(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    Ok(())
}

/// Read the image reference, dropping newlines and surrounding whitespace.
pub fn read_image_tag(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)?;
    let image = raw.replace(['\r', '\n'], "").trim().to_string();
    if image.is_empty() {
        return Err(DeployError::config(format!(
            "{IMAGE_NAME_TAG} artifact is empty"
        )));
    }
    Ok(image)
}

/// The template path must stay inside the unpacked bundle.
fn bundle_relative(path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DeployError::config(format!(
                    "template path '{}' must be relative to the bundle root",
                    path.display()
                )))
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(DeployError::config("template path is empty"));
    }
    Ok(clean)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
