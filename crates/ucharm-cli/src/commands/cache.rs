//! `ucharm cache` — Locate the extraction cache.
//!
//! Entries are never removed by ucharm; there is deliberately no `clean`.

use anyhow::Context;
use std::path::Path;

use crate::output::StyledOutput;
use ucharm_runtime::{bundle, Cache};

/// Print the cache root, or the entry directory `binary` would use.
pub fn path(binary: Option<&Path>, cache: &Cache, out: &mut StyledOutput) -> anyhow::Result<()> {
    let target = match binary {
        None => cache.root().to_path_buf(),
        Some(binary) => {
            let (_, key) = bundle::inspect(binary)
                .with_context(|| format!("{} is not a valid ucharm bundle", binary.display()))?;
            cache.entry_dir(&key)
        }
    };
    out.plain(&target.display().to_string());
    out.newline();
    Ok(())
}
