//! Source discovery and `module:`/`import:` resolution (spec §6, "Source →
//! IR import resolution"): turns the command line's source paths and `-d`
//! directories into a [`snow_ast::Program`] whose `modules` list is exactly
//! the transitive closure of standard-library modules reached from them.
//!
//! Each `.snow` file is a `module: Name` header, an optional `import: A,
//! B.C, …` header (only the last segment of each dotted entry names the
//! simple module it refers to, per spec §6), and a body. Turning that body's
//! declaration syntax into [`snow_ast::Item`]s is the lexer/parser's job,
//! which is an external collaborator out of scope here (spec §1) — so the
//! body is read as its already-lowered form, a JSON array of `Item`, the
//! same shape `seen_cli::project`'s project-file reader expects its inputs
//! pre-shaped into before handing them to the typechecker.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use snow_ast::{Item, Module, Program};
use snow_common::{Position, Span, SnowError, SnowResult};
use walkdir::WalkDir;

use crate::config;

/// Collects `.snow` files from explicit paths plus every `-d` directory
/// (recursing through each), de-duplicated and in a stable order.
pub fn discover_sources(explicit: &[PathBuf], dirs: &[PathBuf]) -> SnowResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in explicit {
        if !path.is_file() {
            return Err(SnowError::config_error(format!("source file not found: {}", path.display())));
        }
        files.push(path.clone());
    }
    for dir in dirs {
        if !dir.is_dir() {
            return Err(SnowError::config_error(format!("-d directory not found: {}", dir.display())));
        }
        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "snow"))
            .collect();
        found.sort();
        files.extend(found);
    }
    files.dedup();
    if files.is_empty() {
        return Err(SnowError::config_error("no .snow source files given"));
    }
    Ok(files)
}

/// The directory import resolution treats as the project root: the deepest
/// common ancestor of every discovered source file.
pub fn source_root(files: &[PathBuf]) -> PathBuf {
    let mut root = files[0].parent().unwrap_or(Path::new(".")).to_path_buf();
    for file in &files[1..] {
        let parent = file.parent().unwrap_or(Path::new("."));
        root = common_ancestor(&root, parent);
    }
    root
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    let a_components: Vec<_> = a.components().collect();
    let b_components: Vec<_> = b.components().collect();
    let mut out = PathBuf::new();
    for (x, y) in a_components.iter().zip(b_components.iter()) {
        if x == y {
            out.push(x);
        } else {
            break;
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Only the last segment of a dotted import entry names the simple module
/// (spec §6).
fn simple_name(entry: &str) -> String {
    entry.rsplit('.').next().unwrap_or(entry).to_string()
}

fn parse_header(text: &str, file_id: u32, path: &Path) -> SnowResult<(Module, usize)> {
    let mut name = None;
    let mut imports = Vec::new();
    let mut body_line = text.lines().count();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("module:") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("import:") {
            imports.extend(rest.split(',').map(str::trim).filter(|s| !s.is_empty()).map(simple_name));
        } else {
            body_line = lineno;
            break;
        }
    }
    let name = name.ok_or_else(|| SnowError::parse_error(format!("{}: missing `module:` header", path.display())))?;
    let module =
        Module { name, imports, items: Vec::new(), span: Span::single(Position::start(), file_id) };
    Ok((module, body_line))
}

/// Parses one `.snow` file into a [`Module`], including its declaration body.
fn parse_module_file(path: &Path, file_id: u32) -> SnowResult<Module> {
    let text = fs::read_to_string(path).map_err(|e| SnowError::io_error(format!("{}: {}", path.display(), e)))?;
    let (mut module, body_line) = parse_header(&text, file_id, path)?;
    let body_text: String = text.lines().skip(body_line).collect::<Vec<_>>().join("\n");
    let items: Vec<Item> = if body_text.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&body_text)
            .map_err(|e| SnowError::parse_error(format!("{}: declaration body is not valid AST JSON: {}", path.display(), e)))?
    };
    module.items = items;
    Ok(module)
}

/// Parses every explicit source file, then resolves each `import:` entry
/// not already present among them against the standard-library directory,
/// recursively, until the import closure is dry (spec §6: "only the
/// transitive closure of imported standard-library modules is compiled").
pub fn build_program(files: &[PathBuf]) -> SnowResult<Program> {
    let root = source_root(files);
    let mut modules: HashMap<String, Module> = HashMap::new();
    let mut pending: VecDeque<String> = VecDeque::new();

    for (i, file) in files.iter().enumerate() {
        let module = parse_module_file(file, i as u32)?;
        pending.extend(module.imports.iter().cloned());
        modules.insert(module.name.clone(), module);
    }

    let mut stdlib_dir: Option<PathBuf> = None;
    let mut next_file_id = files.len() as u32;
    while let Some(name) = pending.pop_front() {
        if modules.contains_key(&name) {
            continue;
        }
        let dir = match &stdlib_dir {
            Some(dir) => dir.clone(),
            None => {
                let resolved = config::resolve_stdlib(&root)?;
                stdlib_dir = Some(resolved.clone());
                resolved
            }
        };
        let candidate = dir.join(format!("{}.snow", name));
        if !candidate.is_file() {
            return Err(SnowError::build_error(format!("unresolved import `{}` (looked in {})", name, dir.display())));
        }
        let module = parse_module_file(&candidate, next_file_id)?;
        next_file_id += 1;
        pending.extend(module.imports.iter().cloned());
        modules.insert(name, module);
    }

    let mut modules: Vec<Module> = modules.into_values().collect();
    modules.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Program { modules })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_takes_last_dotted_segment() {
        assert_eq!(simple_name("A.B.C"), "C");
        assert_eq!(simple_name("Math"), "Math");
    }

    #[test]
    fn header_parses_module_and_imports() {
        let text = "module: Math\nimport: Std.Io, Collections.List\n[]";
        let (module, body_line) = parse_header(text, 0, Path::new("math.snow")).unwrap();
        assert_eq!(module.name, "Math");
        assert_eq!(module.imports, vec!["Io".to_string(), "List".to_string()]);
        assert_eq!(body_line, 2);
    }

    #[test]
    fn missing_module_header_is_a_parse_error() {
        assert!(parse_header("import: Foo\n[]", 0, Path::new("x.snow")).is_err());
    }
}
