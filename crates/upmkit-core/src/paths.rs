use crate::error::Error;
use crate::pkg::manifest::MANIFEST_PATH;
use std::path::{Path, PathBuf};

/// Resolve the project directory the CLI operates on.
///
/// `chdir` is taken relative to `cwd`. The result is canonicalized.
pub fn project_dir(cwd: &Path, chdir: Option<&Path>) -> Result<PathBuf, Error> {
    let dir = chdir.map_or_else(|| cwd.to_path_buf(), |p| cwd.join(p));

    if !dir.is_dir() {
        return Err(Error::CwdNotFound { path: dir });
    }

    dunce::canonicalize(&dir).map_err(|_| Error::CwdNotFound { path: dir })
}

/// Path of the project manifest under `project_dir`.
#[must_use]
pub fn manifest_path(project_dir: &Path) -> PathBuf {
    project_dir.join(MANIFEST_PATH)
}
