//! Stand-in encoders for process tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Executable shell script at `dir/name` running `body`.
pub(crate) fn shell_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Writes one byte to its last argument, the way an encoder writes its
/// output file.
pub(crate) fn writing_encoder(dir: &Path) -> PathBuf {
    shell_script(
        dir,
        "fake-ffmpeg.sh",
        "for last; do :; done\nprintf x > \"$last\"",
    )
}
