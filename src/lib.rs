//! Build Salesforce `package.xml` manifests, either for every supported
//! metadata type or for the components touched between two git revisions.
//!
//! ```no_run
//! use sfpkg::git::GitCli;
//!
//! let git = GitCli::new(".");
//! let resolution = sfpkg::diff_package(&git, "main", "HEAD", "58.0").unwrap();
//! for warning in &resolution.warnings {
//!     eprintln!("{warning}");
//! }
//! sfpkg::write_manifest(&resolution.manifest, "package.xml".as_ref()).unwrap();
//! ```

use error_set::error_set;
use std::io::Write;
use std::path::Path;

pub mod classify;
pub mod git;
pub mod manifest;
pub mod metadata;
pub mod resolve;

pub use classify::{ChangeBuckets, METADATA_ROOT, classify, classify_changes};
pub use git::{ChangeSource, DiffExecutionError, GitCli};
pub use manifest::{EncodingError, Manifest, ParseError};
pub use metadata::MetadataType;
pub use resolve::{Resolution, UnmappedBucket, full_package, resolve};

error_set! {
    /// Top-level error for manifest generation
    SfpkgError := {
        #[display("Failed to write manifest to {path}: {message}")]
        WriteFailed { path: String, message: String },
        #[display("Failed to read manifest from {path}: {message}")]
        ReadFailed { path: String, message: String },
        DiffExecutionError(DiffExecutionError),
        EncodingError(EncodingError),
        ParseError(ParseError),
    }
}

/// Build a manifest of the components changed between `from` and `to`.
///
/// # Errors
///
/// Returns [`DiffExecutionError`] if the changes cannot be listed.
pub fn diff_package<S>(
    source: &S,
    from: &str,
    to: &str,
    api_version: &str,
) -> Result<Resolution, DiffExecutionError>
where
    S: ChangeSource + ?Sized,
{
    Ok(resolve(&classify_changes(source, from, to)?, api_version))
}

/// Serialize `manifest` and write it to `path`, returning the document.
///
/// The document goes to a temporary file next to `path` that replaces
/// `path` only once fully written, so a failure never leaves partial output.
///
/// # Errors
///
/// Returns [`SfpkgError::EncodingError`] before touching the filesystem if
/// the manifest cannot be serialized, or [`SfpkgError::WriteFailed`].
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<String, SfpkgError> {
    let xml = manifest.to_xml()?;

    let write_failed = |message: String| SfpkgError::WriteFailed {
        path: path.display().to_string(),
        message,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_failed(e.to_string()))?;
    file.write_all(xml.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| write_failed(e.to_string()))?;
    file.persist(path).map_err(|e| write_failed(e.error.to_string()))?;

    tracing::info!(path = %path.display(), "wrote manifest");
    Ok(xml)
}

/// Read and parse the manifest stored at `path`.
///
/// # Errors
///
/// Returns [`SfpkgError::ReadFailed`] if the file cannot be read as text, or
/// [`SfpkgError::ParseError`] if it is not a manifest.
pub fn read_manifest(path: &Path) -> Result<Manifest, SfpkgError> {
    let text = std::fs::read_to_string(path).map_err(|e| SfpkgError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Manifest::from_xml(&text)?)
}
