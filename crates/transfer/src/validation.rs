use std::path::{Component, Path, PathBuf};

use crate::TransferError;

/// Validates a remote-supplied file name.
///
/// The sender names the file, so the name must be a single normal path
/// component. Rejects:
/// - Empty names and `.`/`..`
/// - Any separator (`/`, and `\` on every platform)
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidPath(format!(
            "file name must not contain separators: {name:?}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => {
            return Err(TransferError::InvalidPath(format!(
                "not a plain file name: {name:?}"
            )));
        }
    }

    // `C:` parses as a normal component outside Windows.
    if name.len() >= 2 && name.as_bytes()[1] == b':' && name.as_bytes()[0].is_ascii_alphabetic()
    {
        return Err(TransferError::InvalidPath(format!(
            "drive prefix not allowed: {name:?}"
        )));
    }

    Ok(())
}

/// Resolves where a received file is written.
///
/// - `output` is an existing directory: `output/name`
/// - `output` is anything else: exactly `output`
/// - no `output`: `name` in the current directory
///
/// `name` is validated in every case, since it is remote input even when the
/// caller picked the exact path.
pub fn resolve_destination(output: Option<&Path>, name: &str) -> Result<PathBuf, TransferError> {
    validate_file_name(name)?;

    match output {
        Some(output) if output.as_os_str().is_empty() => Ok(std::env::current_dir()?.join(name)),
        Some(output) if output.is_dir() => Ok(output.join(name)),
        Some(output) => Ok(output.to_path_buf()),
        None => Ok(std::env::current_dir()?.join(name)),
    }
}
