//! Fake helper used in place of psexec.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tempfile::TempDir;

/// Picks its behavior from the last argument, which is the command.
const FAKE_HELPER: &str = r#"#!/bin/sh
for last; do :; done
case "$last" in
  echo-args|whoami)
    for arg in "$@"; do echo "$arg"; done
    ;;
  ok)
    echo "line one"
    echo "warning" >&2
    echo "line two"
    ;;
  fail)
    echo "partial"
    echo "  access denied  " >&2
    exit 3
    ;;
  crlf)
    printf 'Host Name\r\n\r\nOS Version\r\n'
    ;;
  hang)
    exec sleep 30
    ;;
  hang-child)
    echo "started"
    sleep 30
    echo "never"
    ;;
  *)
    echo "unknown command: $last" >&2
    exit 64
    ;;
esac
"#;

static FIXTURE: OnceLock<(TempDir, PathBuf)> = OnceLock::new();

/// Path to an executable fake helper script.
#[cfg(unix)]
pub fn fake_helper() -> &'static Path {
    let (_, path) = FIXTURE.get_or_init(|| {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("psexec.py");
        std::fs::write(&path, FAKE_HELPER).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}
