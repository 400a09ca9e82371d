//! Stand-in converters for tests that spawn real processes.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
    sync::OnceLock,
};

/// Copies its last argument (input) to the second-to-last (output).
pub(crate) const COPY_TOOL: &str = "fake-ogr2ogr";

/// Writes an error line to stderr and exits with status 3.
pub(crate) const FAILING_TOOL: &str = "failing-ogr2ogr";

/// Copies like [`COPY_TOOL`] but fails for inputs whose name contains "bad".
pub(crate) const PICKY_TOOL: &str = "picky-ogr2ogr";

/// Kills itself with SIGKILL, so it never reports an exit code.
pub(crate) const KILLED_TOOL: &str = "killed-ogr2ogr";

/// Writes the `PATH` it was started with to stderr and succeeds.
pub(crate) const PATH_TOOL: &str = "path-ogr2ogr";

const COPY_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do out="$in"; in="$arg"; done
cp "$in" "$out"
"#;

const FAILING_SCRIPT: &str = r#"#!/bin/sh
echo "ERROR 1: unable to open datasource" >&2
exit 3
"#;

const PICKY_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do out="$in"; in="$arg"; done
case "$(basename "$in")" in
  *bad*) echo "ERROR 1: corrupt input" >&2; exit 1 ;;
esac
cp "$in" "$out"
"#;

const KILLED_SCRIPT: &str = r#"#!/bin/sh
kill -9 $$
"#;

const PATH_SCRIPT: &str = r#"#!/bin/sh
echo "$PATH" >&2
"#;

/// Directory holding the stand-in converters, written once per test binary.
///
/// Writing the scripts once keeps their files closed long before any test
/// executes them.
pub(crate) fn fake_tools() -> &'static Path {
    static TOOLS: OnceLock<assert_fs::TempDir> = OnceLock::new();

    TOOLS
        .get_or_init(|| {
            let dir = assert_fs::TempDir::new().unwrap();
            for (name, body) in [
                (COPY_TOOL, COPY_SCRIPT),
                (FAILING_TOOL, FAILING_SCRIPT),
                (PICKY_TOOL, PICKY_SCRIPT),
                (KILLED_TOOL, KILLED_SCRIPT),
                (PATH_TOOL, PATH_SCRIPT),
            ] {
                let path = dir.path().join(name);
                fs::write(&path, body).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }
            dir
        })
        .path()
}
