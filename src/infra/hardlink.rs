use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    Hardlink,
    Copy,
}

/// Hardlinks `src` to `dst` through a temporary sibling, creating parent
/// directories. With `fallback_copy`, a blocked link becomes a copy.
pub fn link_atomic(src: &Path, dst: &Path, fallback_copy: bool) -> io::Result<LinkMethod> {
    let tmp = temp_sibling(dst)?;
    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent)?;
    }
    if tmp.symlink_metadata().is_ok() {
        fs::remove_file(&tmp)?;
    }

    let method = match fs::hard_link(src, &tmp) {
        Ok(()) => LinkMethod::Hardlink,
        Err(e) if fallback_copy && is_link_blocked(&e) => {
            tracing::debug!("hardlink blocked ({e}), copying {src:?}");
            fs::copy(src, &tmp)?;
            LinkMethod::Copy
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(method)
}

pub fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == ErrorKind::CrossesDevices
}

fn is_link_blocked(e: &io::Error) -> bool {
    is_cross_device(e) || e.kind() == ErrorKind::PermissionDenied
}

fn temp_sibling(dst: &Path) -> io::Result<PathBuf> {
    let name = dst.file_name().ok_or_else(|| {
        io::Error::new(ErrorKind::InvalidInput, format!("no file name in {dst:?}"))
    })?;
    let mut tmp_name = std::ffi::OsString::from(".tmp_link_");
    tmp_name.push(name);
    Ok(dst.with_file_name(tmp_name))
}
