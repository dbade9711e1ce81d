//! Software package lookup

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::UpgradeError;
use crate::filesys::file::File;

/// A local software package that passed the pre-flight check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    path: PathBuf,
    file_name: String,
}

impl Package {
    /// Local path as supplied by the caller
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used when staging the package on the device
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Location of the package once staged in `remote_dir`
    pub fn staged_path(&self, remote_dir: &str) -> String {
        let dir = remote_dir.trim_end_matches('/');
        if dir.is_empty() {
            format!("/{}", self.file_name)
        } else {
            format!("{}/{}", dir, self.file_name)
        }
    }
}

/// Check that `path` names an existing regular file
///
/// This only inspects the local filesystem. The file can still disappear
/// before it is copied, which then shows up as an install failure.
pub async fn locate(path: impl AsRef<Path>) -> Result<Package, UpgradeError> {
    let file = File::new(path.as_ref());

    if !file.is_file().await {
        return Err(UpgradeError::PackageNotFound(file.path().to_path_buf()));
    }

    let file_name = file
        .name()
        .map(str::to_string)
        .ok_or_else(|| UpgradeError::PackageNotFound(file.path().to_path_buf()))?;

    Ok(Package {
        path: file.path().to_path_buf(),
        file_name,
    })
}
