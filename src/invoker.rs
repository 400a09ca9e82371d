use crate::error::{Error, Result};
use std::{
    env,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};
use tracing::{debug, warn};

/// What came back from one converter process.
#[derive(Debug)]
pub(crate) struct Invocation {
    /// Exit status of the child
    pub(crate) status: ExitStatus,

    /// Last non-empty line the child wrote to stderr
    pub(crate) stderr_tail: Option<String>,
}

/// Runs the external converter.
///
/// The executable is resolved once, up front, so a missing converter is a
/// setup error rather than a failure repeated for every file.
#[derive(Debug, Clone)]
pub(crate) struct Invoker {
    program: PathBuf,
    search_path: Option<OsString>,
}

impl Invoker {
    /// Locates `program`, searching `tool_dir` before the process search path.
    ///
    /// A `tool_dir` that does not exist is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConverterNotFound`] if the program cannot be found.
    pub(crate) fn locate(program: &str, tool_dir: Option<&Path>) -> Result<Self> {
        let search_path = match tool_dir {
            Some(dir) if dir.is_dir() => Some(prepend_search_path(dir)?),
            Some(dir) => {
                warn!("Tool directory does not exist, ignoring: {}", dir.display());
                None
            }
            None => None,
        };

        let resolved = match &search_path {
            Some(paths) => {
                let cwd = env::current_dir().map_err(|e| Error::io(".", e))?;
                which::which_in(program, Some(paths), cwd)
            }
            None => which::which(program),
        };

        let program_path = resolved.map_err(|_| {
            Error::converter_not_found(
                program,
                "Install GDAL or pass --tool-dir pointing at the directory that contains it.",
            )
        })?;

        debug!("Using converter at {}", program_path.display());

        Ok(Self {
            program: program_path,
            search_path,
        })
    }

    /// Wraps an already-resolved executable path.
    #[cfg(test)]
    pub(crate) const fn at(program: PathBuf) -> Self {
        Self {
            program,
            search_path: None,
        }
    }

    /// Path of the resolved converter executable.
    pub(crate) fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the converter with `args` and blocks until it exits.
    ///
    /// No timeout is applied: a converter that never exits blocks the
    /// calling worker.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the process cannot be spawned or
    /// waited on.
    pub(crate) fn invoke(&self, args: &[OsString]) -> io::Result<Invocation> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if let Some(paths) = &self.search_path {
            command.env("PATH", paths);
        }

        let output = command.output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_tail = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToString::to_string);

        Ok(Invocation {
            status: output.status,
            stderr_tail,
        })
    }
}

/// Builds a search path with `dir` ahead of the inherited `PATH`.
fn prepend_search_path(dir: &Path) -> Result<OsString> {
    let inherited = env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(dir.to_path_buf()).chain(env::split_paths(&inherited));

    env::join_paths(paths).map_err(|e| {
        Error::config(format!(
            "Tool directory cannot be added to the search path: {} ({e})",
            dir.display()
        ))
    })
}
