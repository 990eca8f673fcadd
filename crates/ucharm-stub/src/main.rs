//! ucharm loader stub
//!
//! Prepended to every shipped application. Reads its own trailer,
//! materializes the interpreter and script in the cache, and execs the
//! interpreter. Installs no log subscriber and reads no configuration, so
//! the environment reaches the interpreter untouched.

use ucharm_runtime::bundle::loader;
use ucharm_runtime::Cache;

fn main() {
    let cache = Cache::user_default();
    let err = loader::run(&cache, std::env::args_os().skip(1));
    eprintln!("ucharm: {}", err);
    std::process::exit(err.exit_code());
}
