//! Exec dispatcher
//!
//! Replaces the current process with the extracted interpreter. There is no
//! success value: on success this function does not return, so the only
//! thing it can hand back is the error.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use crate::cache::Executable;
use crate::error::BundleError;

/// Exec `interpreter script args...` in place of the current process.
///
/// Environment and standard streams are inherited untouched. The launched
/// interpreter owns the pid, signals and exit status from here on.
pub fn replace_process<I>(interpreter: &Executable, script: &Path, args: I) -> BundleError
where
    I: IntoIterator<Item = OsString>,
{
    let path = interpreter.exec_path();
    let mut command = Command::new(&path);
    command.arg(script).args(args);

    tracing::debug!(interpreter = %path.display(), script = %script.display(), "exec");

    let source = exec(&mut command);
    BundleError::Exec { path, source }
}

#[cfg(unix)]
fn exec(command: &mut Command) -> std::io::Error {
    use std::os::unix::process::CommandExt;
    command.exec()
}

/// No exec on this platform: run the interpreter as a child and mirror its
/// exit status.
#[cfg(not(unix))]
fn exec(command: &mut Command) -> std::io::Error {
    match command.status() {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(e) => e,
    }
}
