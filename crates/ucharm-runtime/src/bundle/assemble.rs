//! Binary assembler
//!
//! Writes `stub ++ interpreter ++ script ++ trailer` to a temporary file next
//! to the output, marks it executable, then renames it into place. A failed
//! or interrupted build never leaves a truncated artifact at `output`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::format::Trailer;
use crate::error::BundleError;

/// One assembler input: a reader plus its exact length.
struct Part<R> {
    name: &'static str,
    reader: R,
    len: u64,
}

/// Assemble a bundle from in-memory parts.
pub fn assemble(stub: &[u8], interpreter: &[u8], script: &[u8], output: &Path) -> Result<Trailer, BundleError> {
    write_bundle(
        Part { name: "stub", reader: stub, len: stub.len() as u64 },
        Part { name: "interpreter", reader: interpreter, len: interpreter.len() as u64 },
        Part { name: "script", reader: script, len: script.len() as u64 },
        output,
    )
}

/// Assemble a bundle by streaming the three inputs from disk.
pub fn assemble_files(stub: &Path, interpreter: &Path, script: &Path, output: &Path) -> Result<Trailer, BundleError> {
    let open = |name: &'static str, path: &Path| -> Result<Part<File>, BundleError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Part { name, reader: file, len })
    };
    write_bundle(
        open("stub", stub)?,
        open("interpreter", interpreter)?,
        open("script", script)?,
        output,
    )
}

fn write_bundle<A: Read, B: Read, C: Read>(
    stub: Part<A>,
    interpreter: Part<B>,
    script: Part<C>,
    output: &Path,
) -> Result<Trailer, BundleError> {
    for (name, len) in [
        (stub.name, stub.len),
        (interpreter.name, interpreter.len),
        (script.name, script.len),
    ] {
        if len == 0 {
            return Err(BundleError::EmptyPayload { which: name });
        }
    }

    let trailer = Trailer::for_layout(stub.len, interpreter.len, script.len);
    let tmp_path = temp_path_for(output);

    let result = (|| -> Result<(), BundleError> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        copy_exact(stub, &mut writer)?;
        copy_exact(interpreter, &mut writer)?;
        copy_exact(script, &mut writer)?;
        trailer.write_to(&mut writer)?;

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        set_executable(&file)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, output)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    tracing::debug!(output = %output.display(), ?trailer, "assembled bundle");
    Ok(trailer)
}

/// Copy a part and fail if it produced fewer or more bytes than declared.
fn copy_exact<R: Read, W: Write>(part: Part<R>, writer: &mut W) -> io::Result<()> {
    let copied = io::copy(&mut part.reader.take(part.len), writer)?;
    if copied != part.len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} changed while reading: {} of {} bytes", part.name, copied, part.len),
        ));
    }
    Ok(())
}

fn temp_path_for(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    output.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}

#[cfg(unix)]
pub(crate) fn set_executable(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub(crate) fn set_executable(_file: &File) -> io::Result<()> {
    Ok(())
}
