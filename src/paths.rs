//! Host path conventions and project-root scoping

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ToolError};

/// How paths must be spelled for the shell that runs toolchain commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostShell {
    /// Paths are passed through unchanged
    Native,
    /// A Unix-like shell (Git Bash / MSYS) on a Windows host: `E:/a` is `/e/a`
    PosixOnWindows,
}

impl HostShell {
    pub fn detect() -> Self {
        if cfg!(windows) {
            HostShell::PosixOnWindows
        } else {
            HostShell::Native
        }
    }
}

/// Rewrite a caller-supplied path into the host shell's convention.
///
/// Only absolute drive-letter paths are touched in `PosixOnWindows` mode.
/// Relative paths and already-normalized paths come back unchanged, so the
/// function is idempotent.
pub fn normalize(path: &str, shell: HostShell) -> String {
    if shell == HostShell::Native {
        return path.to_string();
    }

    let bytes = path.as_bytes();
    let is_drive_absolute = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\');

    if !is_drive_absolute {
        return path.to_string();
    }

    let drive = (bytes[0] as char).to_ascii_lowercase();
    let rest = path[2..].replace('\\', "/");
    format!("/{}{}", drive, rest)
}

/// Normalize a filesystem path for use inside the host shell
pub fn normalize_path(path: &Path, shell: HostShell) -> String {
    normalize(&path.to_string_lossy(), shell)
}

/// Resolve `relative` against `root`, rejecting anything that lands outside it.
///
/// `..` segments are resolved lexically; absolute inputs are accepted only if
/// they already point inside the root. When the target (or its nearest
/// existing ancestor) exists, symlinks are resolved and re-checked.
pub fn scoped_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|e| {
        ToolError::validation(
            "project_path",
            format!("cannot access {}: {}", root.display(), e),
        )
    })?;

    let requested = Path::new(relative);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let lexical = lexical_normalize(&joined);
    if !lexical.starts_with(&root) {
        return Err(escape_error(relative));
    }

    check_resolved(&root, &lexical, relative, MAX_LINK_HOPS)?;
    Ok(lexical)
}

/// Dangling links followed before a path is given up on
const MAX_LINK_HOPS: usize = 40;

/// Resolve the deepest entry of `path` that is on disk and require it to stay
/// under `root`. Dangling symlinks count as entries; their link text is
/// followed, since writing through one creates the target.
fn check_resolved(root: &Path, path: &Path, relative: &str, hops: usize) -> Result<()> {
    let mut entry = path;
    while fs::symlink_metadata(entry).is_err() {
        match entry.parent() {
            Some(parent) => entry = parent,
            None => return Ok(()),
        }
    }

    match entry.canonicalize() {
        Ok(real) if real.starts_with(root) => Ok(()),
        Ok(_) => Err(escape_error(relative)),
        Err(_) => {
            let link = fs::read_link(entry).map_err(|_| escape_error(relative))?;
            let base = entry
                .parent()
                .and_then(|p| p.canonicalize().ok())
                .ok_or_else(|| escape_error(relative))?;
            let rest = path.strip_prefix(entry).unwrap_or(Path::new(""));
            let target = lexical_normalize(&base.join(link)).join(rest);
            if hops == 0 || !target.starts_with(root) {
                return Err(escape_error(relative));
            }
            check_resolved(root, &target, relative, hops - 1)
        }
    }
}

fn escape_error(relative: &str) -> ToolError {
    ToolError::validation("path", format!("'{}' escapes the project root", relative))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const POSIX: HostShell = HostShell::PosixOnWindows;

    #[test]
    fn test_drive_letter_rewritten() {
        assert_eq!(normalize("E:/project/app", POSIX), "/e/project/app");
        assert_eq!(normalize("C:\\esp\\esp-idf", POSIX), "/c/esp/esp-idf");
        assert_eq!(normalize("D:", POSIX), "/d");
    }

    #[test]
    fn test_normalized_path_unchanged() {
        assert_eq!(normalize("/e/project/app", POSIX), "/e/project/app");
    }

    #[test]
    fn test_idempotent() {
        for p in ["E:/project/app", "c:\\x\\y", "/e/a", "rel/a", "E:rel", "", "Z:"] {
            let once = normalize(p, POSIX);
            assert_eq!(normalize(&once, POSIX), once, "not idempotent for {:?}", p);
        }
    }

    #[test]
    fn test_relative_paths_untouched() {
        assert_eq!(normalize("main\\app.c", POSIX), "main\\app.c");
        assert_eq!(normalize("E:relative", POSIX), "E:relative");
        assert_eq!(normalize("./build", POSIX), "./build");
    }

    #[test]
    fn test_native_is_identity() {
        assert_eq!(normalize("E:/project/app", HostShell::Native), "E:/project/app");
    }

    #[test]
    fn test_scoped_path_inside_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("main")).unwrap();
        let resolved = scoped_path(tmp.path(), "main/../main/app.c").unwrap();
        assert!(resolved.ends_with("main/app.c"));
    }

    #[test]
    fn test_scoped_path_rejects_parent_escape() {
        let tmp = TempDir::new().unwrap();
        let err = scoped_path(tmp.path(), "../outside.txt").unwrap_err();
        assert!(matches!(err, ToolError::Validation { ref field, .. } if field == "path"));
    }

    #[test]
    fn test_scoped_path_rejects_absolute_outside() {
        let tmp = TempDir::new().unwrap();
        assert!(scoped_path(tmp.path(), "/etc/passwd").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_scoped_path_rejects_symlink_escape() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        assert!(scoped_path(tmp.path(), "link/secret.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_scoped_path_rejects_dangling_symlink_escape() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, tmp.path().join("evil")).unwrap();
        assert!(scoped_path(tmp.path(), "evil").is_err());
        assert!(scoped_path(tmp.path(), "evil/nested.txt").is_err());
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_scoped_path_allows_dangling_symlink_inside() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("main/app.c", tmp.path().join("app")).unwrap();
        assert!(scoped_path(tmp.path(), "app").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_scoped_path_rejects_symlink_loop() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("b", tmp.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", tmp.path().join("b")).unwrap();
        assert!(scoped_path(tmp.path(), "a").is_err());
    }
}
