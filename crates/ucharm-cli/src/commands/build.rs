//! `ucharm build` — Create a standalone executable.
//!
//! Concatenates the loader stub, the interpreter and the script into one
//! file. The script must already be a single self-contained source file.

use anyhow::{anyhow, bail, Context};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::output::StyledOutput;
use ucharm_runtime::bundle;

/// Interpreter looked up on `PATH` when none is configured.
const DEFAULT_INTERPRETER: &str = "micropython";

pub struct BuildArgs {
    pub script: PathBuf,
    pub output: Option<PathBuf>,
    pub interpreter: Option<PathBuf>,
    pub stub: Option<PathBuf>,
}

/// Fully resolved inputs for one build.
#[derive(Debug, PartialEq)]
pub struct BuildPlan {
    pub script: PathBuf,
    pub output: PathBuf,
    pub interpreter: PathBuf,
    pub stub: PathBuf,
}

impl BuildPlan {
    /// Flags first, then `ucharm.toml`, then built-in defaults.
    pub fn resolve(args: BuildArgs, config: &BuildConfig) -> anyhow::Result<Self> {
        if !args.script.is_file() {
            bail!("Script not found: {}", args.script.display());
        }

        let output = match args.output.or_else(|| config.output.clone()) {
            Some(output) => output,
            None => default_output(&args.script)?,
        };

        let interpreter = args
            .interpreter
            .or_else(|| config.interpreter.clone())
            .or_else(|| find_in_path(DEFAULT_INTERPRETER))
            .ok_or_else(|| {
                anyhow!(
                    "No interpreter found. Pass --interpreter, set [build].interpreter in ucharm.toml, \
                     or put {} on PATH.",
                    DEFAULT_INTERPRETER
                )
            })?;

        let stub = args
            .stub
            .or_else(|| config.stub.clone())
            .or_else(default_stub)
            .ok_or_else(|| anyhow!("No loader stub found. Pass --stub or set [build].stub in ucharm.toml."))?;

        Ok(Self { script: args.script, output, interpreter, stub })
    }
}

pub fn execute(args: BuildArgs, config: &BuildConfig, out: &mut StyledOutput) -> anyhow::Result<()> {
    let plan = BuildPlan::resolve(args, config)?;
    tracing::debug!(?plan, "resolved build");

    out.info("Building ");
    out.plain(&plan.script.display().to_string());
    out.newline();

    if plan.output.exists() && same_file(&plan.output, &plan.script) {
        bail!("Output would overwrite the script: {}", plan.output.display());
    }

    let trailer = bundle::assemble_files(&plan.stub, &plan.interpreter, &plan.script, &plan.output)
        .with_context(|| format!("Failed to build {}", plan.output.display()))?;
    let (_, key) = bundle::inspect(&plan.output)?;

    let total = trailer.script_offset + trailer.script_size + ucharm_runtime::TRAILER_SIZE as u64;
    out.success("Created ");
    out.plain(&format!("{} ({} bytes)", plan.output.display(), total));
    out.newline();
    out.field("  Interpreter:", &plan.interpreter.display().to_string());
    out.field("  Cache key:", &key.to_hex());
    Ok(())
}

fn default_output(script: &Path) -> anyhow::Result<PathBuf> {
    let stem = script
        .file_stem()
        .ok_or_else(|| anyhow!("Cannot derive output name from {}", script.display()))?;
    Ok(PathBuf::from(stem).with_extension(std::env::consts::EXE_EXTENSION))
}

/// `ucharm-stub` installed next to the running `ucharm`.
fn default_stub() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let stub = exe
        .parent()?
        .join(format!("ucharm-stub{}", std::env::consts::EXE_SUFFIX));
    stub.is_file().then_some(stub)
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
        .find(|candidate| candidate.is_file())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
