//! `ucharm inspect` — Show the trailer and cache key of a built artifact.

use anyhow::Context;
use std::path::Path;

use crate::output::StyledOutput;
use ucharm_runtime::bundle;

pub fn execute(binary: &Path, out: &mut StyledOutput) -> anyhow::Result<()> {
    let (trailer, key) = bundle::inspect(binary)
        .with_context(|| format!("{} is not a valid ucharm bundle", binary.display()))?;
    let size = std::fs::metadata(binary)?.len();

    out.field("File:", &binary.display().to_string());
    out.field("Size:", &format!("{} bytes", size));
    out.field("Stub:", &format!("{} bytes", trailer.interpreter_offset));
    out.field(
        "Interpreter:",
        &format!("offset {} size {}", trailer.interpreter_offset, trailer.interpreter_size),
    );
    out.field(
        "Script:",
        &format!("offset {} size {}", trailer.script_offset, trailer.script_size),
    );
    out.field("Cache key:", &key.to_hex());
    out.bold(&format!("{:<20}", "Valid:"));
    out.success("yes");
    out.newline();
    Ok(())
}
