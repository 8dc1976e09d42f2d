//! Loading of mapping specifications
//!
//! Each (dialect, record kind) pair has one mapping file named
//! `<dialect>/<kind>.json` (for example `enterprise/person.json`). The crate
//! ships a built-in set; a directory given in configuration overrides the
//! built-in file for every pair it provides.

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::MappingSpec;
use crate::dialect::Dialect;
use crate::error::{Result, SyncError};
use crate::record::RecordKind;

/// Built-in mapping files, embedded at compile time
const BUILTIN: &[(Dialect, RecordKind, &str)] = &[
    (
        Dialect::Enterprise,
        RecordKind::Term,
        include_str!("../../mappings/enterprise/term.json"),
    ),
    (
        Dialect::Enterprise,
        RecordKind::Section,
        include_str!("../../mappings/enterprise/section.json"),
    ),
    (
        Dialect::Enterprise,
        RecordKind::Person,
        include_str!("../../mappings/enterprise/person.json"),
    ),
    (
        Dialect::Enterprise,
        RecordKind::PersonMember,
        include_str!("../../mappings/enterprise/person_member.json"),
    ),
    (
        Dialect::Enterprise,
        RecordKind::Crosslist,
        include_str!("../../mappings/enterprise/crosslist.json"),
    ),
    (
        Dialect::Enterprise,
        RecordKind::CrosslistMember,
        include_str!("../../mappings/enterprise/crosslist_member.json"),
    ),
    (
        Dialect::Lis2,
        RecordKind::Term,
        include_str!("../../mappings/lis2/term.json"),
    ),
    (
        Dialect::Lis2,
        RecordKind::Section,
        include_str!("../../mappings/lis2/section.json"),
    ),
    (
        Dialect::Lis2,
        RecordKind::Person,
        include_str!("../../mappings/lis2/person.json"),
    ),
    (
        Dialect::Lis2,
        RecordKind::PersonMember,
        include_str!("../../mappings/lis2/person_member.json"),
    ),
    (
        Dialect::Lis2,
        RecordKind::Crosslist,
        include_str!("../../mappings/lis2/crosslist.json"),
    ),
];

/// All mapping specifications available to a processor
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    specs: IndexMap<(Dialect, RecordKind), MappingSpec>,
}

impl MappingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mappings shipped with the crate
    pub fn builtin() -> Result<Self> {
        let mut set = Self::new();
        for (dialect, kind, json) in BUILTIN {
            let spec = MappingSpec::from_json_str(json).map_err(|e| {
                SyncError::mapping(format!("built-in {dialect}/{kind} mapping: {e}"))
            })?;
            set.insert(*dialect, *kind, spec);
        }
        Ok(set)
    }

    pub fn insert(&mut self, dialect: Dialect, kind: RecordKind, spec: MappingSpec) {
        self.specs.insert((dialect, kind), spec);
    }

    pub fn get(&self, dialect: Dialect, kind: RecordKind) -> Option<&MappingSpec> {
        self.specs.get(&(dialect, kind))
    }

    /// Specification for a pair, or a mapping error naming it
    pub fn require(&self, dialect: Dialect, kind: RecordKind) -> Result<&MappingSpec> {
        self.get(dialect, kind)
            .ok_or_else(|| SyncError::mapping(format!("no {dialect} mapping for {kind} records")))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Details about a mapping file that failed to load
#[derive(Debug, Clone)]
pub struct LoadError {
    pub file_path: PathBuf,
    pub error_message: String,
}

/// Statistics about a loading operation
#[derive(Debug, Clone)]
pub struct LoadStats {
    pub loaded: usize,
    pub errors: usize,
    pub error_details: Vec<LoadError>,
}

/// Loads mapping files from a directory into a [`MappingSet`]
pub struct MappingLoader {
    loaded_count: usize,
    error_count: usize,
    errors: Vec<LoadError>,
}

impl MappingLoader {
    pub fn new() -> Self {
        Self {
            loaded_count: 0,
            error_count: 0,
            errors: Vec::new(),
        }
    }

    /// Load every `<dialect>/<kind>.json` found under `root` into `set`
    ///
    /// Unknown dialect directories and unknown kind names are skipped with a
    /// warning. A file that fails to parse is recorded in the stats and the
    /// built-in specification for that pair stays in place.
    pub fn load_into_set(&mut self, root: &Path, set: &mut MappingSet) -> Result<LoadStats> {
        if !root.is_dir() {
            return Err(SyncError::Config {
                message: format!("mapping directory not found: {}", root.display()),
            });
        }

        for dialect in Dialect::ALL {
            let dir = root.join(dialect.as_str());
            if !dir.is_dir() {
                debug!("No {} mappings under {}", dialect, root.display());
                continue;
            }
            self.load_dialect_directory(dialect, &dir, set)?;
        }

        info!(
            "Loaded {} mapping file(s) from {} ({} error(s))",
            self.loaded_count,
            root.display(),
            self.error_count
        );

        Ok(self.stats())
    }

    fn load_dialect_directory(
        &mut self,
        dialect: Dialect,
        dir: &Path,
        set: &mut MappingSet,
    ) -> Result<()> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for path in entries {
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                debug!("Skipping non-JSON file: {}", path.display());
                continue;
            }

            let Some(kind) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(RecordKind::from_name)
            else {
                warn!("Skipping mapping for unknown record kind: {}", path.display());
                continue;
            };

            match MappingSpec::from_file(&path) {
                Ok(spec) => {
                    debug!("Loaded {}/{} mapping from {}", dialect, kind, path.display());
                    set.insert(dialect, kind, spec);
                    self.loaded_count += 1;
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", path.display(), e);
                    self.error_count += 1;
                    self.errors.push(LoadError {
                        file_path: path.clone(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn stats(&self) -> LoadStats {
        LoadStats {
            loaded: self.loaded_count,
            errors: self.error_count,
            error_details: self.errors.clone(),
        }
    }
}

impl Default for MappingLoader {
    fn default() -> Self {
        Self::new()
    }
}
