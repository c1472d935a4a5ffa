use std::path::{Path, PathBuf};

use crate::media::Resolution;

/// Resolve a media reference against the configured root
///
/// Absolute references are used as-is.
pub fn resolve_media_path(root: &Path, reference: &Path) -> PathBuf {
    if reference.is_absolute() {
        reference.to_path_buf()
    } else {
        root.join(reference)
    }
}

/// Parse a `WxH` resolution argument, rejecting zero dimensions
pub fn parse_resolution(arg: &str) -> Result<Resolution, String> {
    let res: Resolution = arg.parse()?;
    if res.width == 0 || res.height == 0 {
        return Err(format!("resolution must be positive, got {res}"));
    }
    Ok(res)
}
