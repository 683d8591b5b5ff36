use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::ArtefactLoadError;

/// File-based artefact, optionally pinned to a SHA-256 checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artefact {
    /// Location of the artefact on disk.
    pub path: PathBuf,
    /// Expected SHA-256 checksum expressed as hexadecimal. Unpinned
    /// artefacts are loaded without verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl Artefact {
    /// Creates an unpinned artefact.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sha256: None,
        }
    }

    /// Pins the artefact to `sha256`.
    #[must_use]
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Verifies the artefact checksum against the expected digest.
    ///
    /// Succeeds without reading the file when no checksum is pinned.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` when the computed digest does not match
    /// `sha256` and propagates I/O errors while reading the file.
    pub fn verify(&self) -> Result<(), ArtefactLoadError> {
        let Some(expected) = self.sha256.as_deref().map(normalise_hex) else {
            return Ok(());
        };
        let actual = compute_sha256(&self.path)?;
        if actual == expected {
            debug!(path = %self.path.display(), "artefact checksum verified");
            Ok(())
        } else {
            Err(ArtefactLoadError::ChecksumMismatch {
                path: self.path.clone(),
                expected,
                actual,
            })
        }
    }
}

/// Computes the SHA-256 digest of the file at `path`.
///
/// The file handle is released when the reader drops, on success or error.
///
/// # Errors
///
/// Returns I/O errors from opening or reading the file.
pub fn compute_sha256(path: &Path) -> Result<String, ArtefactLoadError> {
    let io_error = |source| ArtefactLoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).ok_or_else(|| {
            io_error(std::io::Error::other(
                "read reported bytes beyond buffer length",
            ))
        })?;
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
