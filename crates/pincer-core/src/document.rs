//! On-disk document conventions.
//!
//! One interface owns two documents in a config directory: a human-editable
//! YAML config at `<name>.yml` and a machine-managed JSON secret at
//! `<name>_secret.json`. Both are written with owner-only permissions, and
//! the secret refuses to load when its mode grants group/other access.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Mode applied to both documents on write.
const DOCUMENT_MODE: u32 = 0o600;

/// Path of the config document for `interface` under `dir`.
#[must_use]
pub fn config_path(dir: &Path, interface: &str) -> PathBuf {
    dir.join(format!("{interface}.yml"))
}

/// Path of the secret document for `interface` under `dir`.
#[must_use]
pub fn secret_path(dir: &Path, interface: &str) -> PathBuf {
    dir.join(format!("{interface}_secret.json"))
}

/// Makes sure `path` is a writable regular file with owner-only mode.
///
/// Missing files are created; existing files are refused unless
/// `overwrite` is set, and their mode is tightened to 0o600.
///
/// # Errors
///
/// [`Error::NotAFile`] if the path exists but is not a regular file,
/// [`Error::ForceRequired`] if it exists and `overwrite` is false, or an
/// I/O error.
pub fn ensure_file(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }
        if !overwrite {
            return Err(Error::ForceRequired {
                operation: format!("overwrite '{}'", path.display()),
            });
        }
        set_owner_only(path)?;
    } else {
        create_owner_only(path)?;
    }
    Ok(())
}

/// Fails when `path` is readable or writable by group or other.
///
/// Only meaningful on Unix; elsewhere this is a no-op.
///
/// # Errors
///
/// [`Error::InsecurePermissions`] naming the path and its mode bits.
#[cfg(unix)]
pub fn check_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;
    let mode = fs::metadata(path)?.mode();
    if mode & 0o077 != 0 {
        return Err(Error::InsecurePermissions {
            path: path.to_path_buf(),
            mode: mode & 0o777,
        });
    }
    Ok(())
}

/// Fails when `path` is readable or writable by group or other.
///
/// Only meaningful on Unix; elsewhere this is a no-op.
#[cfg(not(unix))]
pub fn check_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(DOCUMENT_MODE)
        .open(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_owner_only(path: &Path) -> Result<()> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(DOCUMENT_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

/// Writes `contents` to `path` after [`ensure_file`].
///
/// # Errors
///
/// Propagates [`ensure_file`] failures and I/O errors.
pub fn write_document(path: &Path, contents: &str, overwrite: bool) -> Result<()> {
    debug!(path = %path.display(), "writing document");
    ensure_file(path, overwrite)?;
    fs::write(path, contents)?;
    Ok(())
}
