use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{debug, info};

/// Location of the P-CLHT example binary inside a RECIPE checkout.
pub fn example_binary(base: &Path, checkout: &str) -> PathBuf {
    base.join(checkout)
        .join("P-CLHT")
        .join("build")
        .join("example")
}

/// Remove a file or a directory tree. A path that does not exist is not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    debug!("Removing {}", path.display());
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

pub fn time<T>(t: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let r = f();
    let elapsed = start.elapsed();
    info!("{t}: Elapsed: {:?}", elapsed);
    r
}

/// Log to stderr. `verbosity` 0 shows only errors, 1 adds warnings, 2 info, 3 debug.
pub fn init_trace(verbosity: usize, quiet: bool) -> Result<(), log::SetLoggerError> {
    stderrlog::new()
        .color(stderrlog::ColorChoice::Auto)
        .verbosity(verbosity)
        .quiet(quiet)
        .show_level(true)
        .init()
}
