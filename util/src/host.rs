//! Host platform utility functions

use std::path::PathBuf;

/// Get the root directory of the software from the `TALOS_SW_ROOT`
/// environment variable.
///
/// Parameter files and session directories are resolved relative to this
/// root.
pub fn get_talos_sw_root() -> Result<PathBuf, std::env::VarError> {
    let root = std::env::var("TALOS_SW_ROOT")?;
    Ok(PathBuf::from(root))
}
