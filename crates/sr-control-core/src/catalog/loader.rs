//! Library catalog loader.
//!
//! Loads library definitions from a JSON file or from every JSON file in a
//! directory.

use super::schema::LibraryDefinition;
use crate::config::PathsConfig;
use crate::error::{ControlError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A catalog file holds one definition or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Many(Vec<LibraryDefinition>),
    One(LibraryDefinition),
}

/// Loads library definitions from disk.
pub struct CatalogLoader;

impl CatalogLoader {
    /// Load definitions from `path`.
    ///
    /// A file is parsed strictly. In a directory, files that fail to parse
    /// are skipped with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<LibraryDefinition>> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    /// Load a single catalog file.
    pub fn load_file(path: &Path) -> Result<Vec<LibraryDefinition>> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ControlError::io_with_path(e, path))?;

        let parsed: CatalogFile =
            serde_json::from_str(&content).map_err(|e| ControlError::Json {
                message: format!("Failed to parse catalog {}: {}", path.display(), e),
                source: Some(e),
            })?;

        let definitions = match parsed {
            CatalogFile::Many(defs) => defs,
            CatalogFile::One(def) => vec![def],
        };

        if let Some(def) = definitions.iter().find(|d| d.name.trim().is_empty()) {
            return Err(ControlError::Config {
                message: format!(
                    "Library in {} has an empty name (start command {:?})",
                    path.display(),
                    def.start_cmd
                ),
            });
        }

        debug!(
            "Loaded {} library definitions from {}",
            definitions.len(),
            path.display()
        );
        Ok(definitions)
    }

    fn load_dir(dir: &Path) -> Result<Vec<LibraryDefinition>> {
        let entries = std::fs::read_dir(dir).map_err(|e| ControlError::io_with_path(e, dir))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext == PathsConfig::CATALOG_EXTENSION)
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut definitions = Vec::new();
        let mut seen = HashSet::new();
        for file in files {
            match Self::load_file(&file) {
                Ok(defs) => {
                    for def in defs {
                        if !seen.insert(def.name.clone()) {
                            warn!(
                                "Library {} in {} overrides an earlier definition",
                                def.name,
                                file.display()
                            );
                            definitions.retain(|d: &LibraryDefinition| d.name != def.name);
                        }
                        definitions.push(def);
                    }
                }
                Err(e) => {
                    warn!("Skipping catalog file {}: {}", file.display(), e);
                }
            }
        }

        info!(
            "Loaded {} library definitions from {}",
            definitions.len(),
            dir.display()
        );
        Ok(definitions)
    }
}
