use std::path::{Component, Path, PathBuf};

/// Rejection reasons for a caller-supplied path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathGuardError {
    #[error("path escapes the working root: {0}")]
    Escapes(String),
    #[error("absolute path outside the working root: {0}")]
    AbsoluteOutsideRoot(String),
}

/// Resolve a caller-supplied path and confirm it stays inside `root`.
///
/// The check is purely lexical: `.` and `..` components are normalized
/// without touching the filesystem, so a hostile path is rejected before
/// anything is read. Absolute paths are accepted only when they already sit
/// under `root`; relative paths are joined onto `root` and must not traverse
/// above it.
pub fn resolve_within(root: &Path, candidate: &str) -> Result<PathBuf, PathGuardError> {
    let candidate_path = Path::new(candidate);

    let relative = if candidate_path.is_absolute() {
        match candidate_path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => {
                return Err(PathGuardError::AbsoluteOutsideRoot(candidate.to_string()));
            }
        }
    } else {
        candidate_path
    };

    let mut resolved = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root means the path escaped.
                if !resolved.pop() {
                    return Err(PathGuardError::Escapes(candidate.to_string()));
                }
            }
            // Prefix/RootDir cannot occur in a stripped or relative path,
            // but a Windows-style prefix smuggled into a "relative" string
            // is still a rejection.
            Component::Prefix(_) | Component::RootDir => {
                return Err(PathGuardError::AbsoluteOutsideRoot(candidate.to_string()));
            }
        }
    }

    Ok(root.join(resolved))
}
