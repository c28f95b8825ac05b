//! Standard-library path resolution (spec §6): `SNOW_LIB` env var, a
//! `snow.lib` property file, the nearest ancestor `lib/` directory of the
//! source root, or `SNOW_HOME/lib`, tried in that order.
//!
//! Mirrors `seen_cli::config`'s layered-resolution shape (env var beats
//! project file beats installation default) generalized to the stdlib
//! lookup this CLI needs instead of a build-profile toggle.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use snow_common::{SnowError, SnowResult};

/// The `snow.lib` project file: a single `lib = "path"` property, TOML-
/// encoded like every other config surface in this workspace.
#[derive(Debug, Deserialize)]
struct LibProperty {
    lib: PathBuf,
}

/// Resolves the standard-library directory used to satisfy `import:`
/// entries that aren't among the modules passed on the command line.
///
/// `source_root` is the directory import resolution treats as the project
/// root (the common ancestor of every explicit source path).
pub fn resolve_stdlib(source_root: &Path) -> SnowResult<PathBuf> {
    if let Ok(path) = env::var("SNOW_LIB") {
        log::debug!("stdlib resolved from SNOW_LIB={}", path);
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = read_lib_property(source_root)? {
        log::debug!("stdlib resolved from snow.lib property: {}", path.display());
        return Ok(path);
    }

    if let Some(path) = nearest_ancestor_lib(source_root) {
        log::debug!("stdlib resolved from nearest ancestor lib/: {}", path.display());
        return Ok(path);
    }

    if let Ok(home) = env::var("SNOW_HOME") {
        let path = PathBuf::from(home).join("lib");
        log::debug!("stdlib resolved from SNOW_HOME/lib: {}", path.display());
        return Ok(path);
    }

    Err(SnowError::config_error(
        "no standard library found: set SNOW_LIB, add a snow.lib file, place a lib/ directory above the source root, or set SNOW_HOME",
    ))
}

/// Walks from `source_root` up to the filesystem root looking for a
/// `snow.lib` file, reading its `lib` property if found.
fn read_lib_property(source_root: &Path) -> SnowResult<Option<PathBuf>> {
    for dir in source_root.ancestors() {
        let candidate = dir.join("snow.lib");
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate)?;
            let property: LibProperty = toml::from_str(&text)
                .map_err(|e| SnowError::config_error(format!("{}: {}", candidate.display(), e)))?;
            let lib = if property.lib.is_absolute() { property.lib } else { dir.join(property.lib) };
            return Ok(Some(lib));
        }
    }
    Ok(None)
}

/// Walks from `source_root` up to the filesystem root looking for a
/// sibling `lib/` directory.
fn nearest_ancestor_lib(source_root: &Path) -> Option<PathBuf> {
    for dir in source_root.ancestors() {
        let candidate = dir.join("lib");
        if candidate.is_dir() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn snow_lib_env_var_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SNOW_LIB", "/opt/snow/lib");
        let resolved = resolve_stdlib(Path::new("/tmp/does-not-matter")).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/snow/lib"));
        env::remove_var("SNOW_LIB");
    }

    #[test]
    fn nearest_ancestor_lib_dir_found() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("SNOW_LIB");
        env::remove_var("SNOW_HOME");
        let tmp = tempfile::tempdir().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir(&lib).unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        let resolved = resolve_stdlib(&src).unwrap();
        assert_eq!(resolved, lib);
    }

    #[test]
    fn missing_stdlib_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("SNOW_LIB");
        env::remove_var("SNOW_HOME");
        let tmp = tempfile::tempdir().unwrap();
        assert!(resolve_stdlib(tmp.path()).is_err());
    }
}
