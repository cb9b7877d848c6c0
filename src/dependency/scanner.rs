// Static scanning of Python source for import statements

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{EnvironmentError, Result};

/// Line-anchored `import X[, Y]` or `from X import ...`
static IMPORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:import[ \t]+([^\n#;]+)|from[ \t]+(\S+)[ \t]+import\b)")
        .expect("import pattern must compile")
});

/// Read `script` and collect the top-level modules it imports
pub fn scan_script(script: &Path) -> Result<BTreeSet<String>> {
    let source = std::fs::read_to_string(script).map_err(|e| EnvironmentError::ScriptUnreadable {
        path: script.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(scan_source(&source))
}

/// Collect the top-level module names referenced by import statements.
///
/// `import a.b, c as d` yields `a` and `c`; `from x.y import z` yields `x`.
/// Relative imports (`from . import x`, `from .pkg import y`) name local code
/// and are skipped.
pub fn scan_source(source: &str) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    for captures in IMPORT_PATTERN.captures_iter(source) {
        if let Some(list) = captures.get(1) {
            for entry in list.as_str().split(',') {
                if let Some(module) = entry.split_whitespace().next().and_then(top_level) {
                    modules.insert(module.to_string());
                }
            }
        } else if let Some(from) = captures.get(2) {
            if let Some(module) = top_level(from.as_str()) {
                modules.insert(module.to_string());
            }
        }
    }

    modules
}

/// `os.path` -> `os`; `None` for relative or malformed names
fn top_level(dotted: &str) -> Option<&str> {
    let dotted = dotted.trim_end_matches('\\').trim();
    if dotted.starts_with('.') {
        return None;
    }
    let head = dotted.split('.').next()?;
    is_identifier(head).then_some(head)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}

/// Whether `module` resolves to a file or package next to the script
pub fn is_local_module(script_dir: &Path, module: &str) -> bool {
    script_dir.join(format!("{module}.py")).is_file()
        || script_dir.join(module).join("__init__.py").is_file()
}
