use std::env;
use std::path::PathBuf;

use anyhow::{Error, Result};

/// Directory containing the running executable.
pub(crate) fn executable_dir() -> Result<PathBuf> {
    let exe = env::current_exe()?;
    let exe = dunce::canonicalize(&exe).unwrap_or(exe);
    match exe.parent() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Err(Error::msg("unable to get executable directory")),
    }
}

/// Makes a relative path absolute using the current working directory.
pub(crate) fn absolute_path(path: PathBuf) -> Result<PathBuf> {
    let path = if path.is_relative() {
        env::current_dir()?.join(path)
    } else {
        path
    };
    Ok(dunce::canonicalize(&path).unwrap_or(path))
}
