use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::drive::ResourceIdentifier;
use crate::error::{FetchError, FetchResult};

/// Name used in a directory destination when neither the host nor the
/// identifier yields a usable file name.
pub(crate) const FALLBACK_FILE_NAME: &str = "download";

/// Last path component of `name`, or `None` if that is empty, `.` or `..`.
pub(crate) fn file_name_component(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => None,
        n => Some(n.to_string()),
    }
}

/// A destination naming a directory takes the host's advertised file name,
/// or the identifier when the host gives none. Either is reduced to a single
/// path component so the file stays inside the directory.
pub fn resolve_destination(
    destination: &Path,
    advertised: Option<&str>,
    identifier: &ResourceIdentifier,
) -> PathBuf {
    let names_dir = destination.is_dir()
        || destination
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::is_separator);
    if names_dir {
        let name = advertised
            .and_then(file_name_component)
            .or_else(|| file_name_component(identifier.as_str()))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
        destination.join(name)
    } else {
        destination.to_path_buf()
    }
}

/// Hidden `.part` file next to `destination`, removed on drop unless persisted.
pub fn staging_file(destination: &Path) -> FetchResult<NamedTempFile> {
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| FetchError::io(dir, e))?;
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| FetchError::io(dir, e))
}

/// Renames the staged file over `destination`, replacing any existing file.
pub fn persist(staged: NamedTempFile, destination: &Path) -> FetchResult<()> {
    staged
        .persist(destination)
        .map(|_| ())
        .map_err(|e| FetchError::io(destination, e.error))
}
