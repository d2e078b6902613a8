//! Filesystem-backed script resolution.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use flowrun_engine::{ScriptError, ScriptLocator};
use flowrun_types::ScriptFile;
use tracing::debug;

/// Resolves scripts on the local filesystem.
///
/// Relative paths are taken relative to `base_dir`, which is normally the
/// launch directory. Symlinks are resolved so the reported path is canonical.
#[derive(Debug, Clone)]
pub struct FsScriptLocator {
    base_dir: PathBuf,
}

impl FsScriptLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }
}

impl ScriptLocator for FsScriptLocator {
    fn resolve(&self, path: &Path) -> Result<ScriptFile, ScriptError> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };

        let absolute_path = fs::canonicalize(&candidate).map_err(|source| io_to_script_error(&candidate, source))?;
        if absolute_path.is_dir() {
            return Err(ScriptError::Unreadable {
                path: absolute_path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "path is a directory"),
            });
        }
        let content = fs::read(&absolute_path).map_err(|source| io_to_script_error(&absolute_path, source))?;
        let name = absolute_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(script = %absolute_path.display(), bytes = content.len(), "script resolved");
        Ok(ScriptFile {
            absolute_path,
            name,
            content,
        })
    }
}

fn io_to_script_error(path: &Path, source: io::Error) -> ScriptError {
    match source.kind() {
        io::ErrorKind::NotFound => ScriptError::NotFound { path: path.to_path_buf() },
        _ => ScriptError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_against_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("main.nf"), "println 'Hello world'").expect("write script");

        let script = FsScriptLocator::new(dir.path())
            .resolve(Path::new("main.nf"))
            .expect("resolve script");

        assert_eq!(script.name, "main.nf");
        assert_eq!(script.content, b"println 'Hello world'");
        assert!(script.absolute_path.is_absolute());
        assert_eq!(script.absolute_path, fs::canonicalize(dir.path().join("main.nf")).expect("canonical"));
    }

    #[test]
    fn missing_script_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");

        let result = FsScriptLocator::new(dir.path()).resolve(Path::new("absent.nf"));

        assert!(matches!(result, Err(ScriptError::NotFound { .. })));
    }

    #[test]
    fn directory_is_unreadable() {
        let dir = tempfile::tempdir().expect("tempdir");

        let result = FsScriptLocator::new(dir.path()).resolve(dir.path());

        assert!(matches!(result, Err(ScriptError::Unreadable { .. })));
    }
}
