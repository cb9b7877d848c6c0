// Import name -> installable package name

use std::collections::{BTreeMap, HashMap};

/// Imports whose package is published under a different name
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("dotenv", "python-dotenv"),
    ("yaml", "PyYAML"),
    ("PIL", "Pillow"),
    ("cv2", "opencv-python"),
    ("sklearn", "scikit-learn"),
    ("bs4", "beautifulsoup4"),
];

#[derive(Debug, Clone)]
pub struct PackageAliases {
    table: HashMap<String, String>,
}

impl Default for PackageAliases {
    fn default() -> Self {
        Self {
            table: BUILTIN_ALIASES
                .iter()
                .map(|(module, package)| (module.to_string(), package.to_string()))
                .collect(),
        }
    }
}

impl PackageAliases {
    /// Built-in table extended (or overridden) by `extra`
    pub fn with_overrides(extra: &BTreeMap<String, String>) -> Self {
        let mut aliases = Self::default();
        for (module, package) in extra {
            aliases.table.insert(module.clone(), package.clone());
        }
        aliases
    }

    /// Package name to hand to the installer for `module`
    pub fn resolve<'a>(&'a self, module: &'a str) -> &'a str {
        self.table.get(module).map(String::as_str).unwrap_or(module)
    }
}
