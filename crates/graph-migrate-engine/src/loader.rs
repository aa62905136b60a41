//! Migration loader for discovering migrations from the filesystem.
//!
//! The [`MigrationLoader`] expands a set of glob patterns under a root
//! directory, classifies every match into a migration identity, and returns a
//! deduplicated [`Discovery`] sorted by identity. Files whose path does not
//! follow the `.../migrations/<name>.<ext>` layout, or that cannot be read, are
//! skipped with a warning; two files claiming the same identity abort the run.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use graph_migrate_core::{MigrateError, Settings};

use crate::descriptor::{checksum, parse_identity, MigrationDescriptor};

/// A file matched by a pattern but left out of the discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// The matched path.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub reason: String,
}

/// The result of a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Discovered migrations, sorted by identity.
    pub descriptors: Vec<MigrationDescriptor>,
    /// Files that matched but were not usable as migrations.
    pub skipped: Vec<SkippedFile>,
}

impl Discovery {
    /// Returns the number of discovered migrations.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns whether no migrations were discovered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Looks up a descriptor by identity.
    pub fn get(&self, identity: &str) -> Option<&MigrationDescriptor> {
        self.descriptors
            .binary_search_by(|d| d.identity.as_str().cmp(identity))
            .ok()
            .map(|idx| &self.descriptors[idx])
    }

    /// Returns the descriptors belonging to `scope`, or all of them.
    pub fn scoped(&self, scope: Option<&str>) -> Vec<&MigrationDescriptor> {
        self.descriptors.iter().filter(|d| d.in_scope(scope)).collect()
    }
}

/// Discovers migration files from the filesystem.
///
/// The loader expects a directory structure like:
/// ```text
/// root/
///   migrations/
///     001_init.cypher
///   core/identity/migrations/
///     001_user_schema.cypher
///   twitter/tweet/migrations/
///     001_schema.cypher
/// ```
///
/// Patterns are relative to the root; the default is `**/migrations/*.cypher`.
#[derive(Debug, Clone)]
pub struct MigrationLoader {
    /// The directory identities are computed relative to.
    root: PathBuf,
    /// Glob patterns, relative to `root`.
    patterns: Vec<String>,
}

impl MigrationLoader {
    /// Creates a new loader for the given root and patterns.
    pub fn new<I, S>(root: impl Into<PathBuf>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a loader from the `root` and `patterns` settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.root.clone(), settings.patterns.iter().cloned())
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the glob patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Scans the filesystem for migration files.
    ///
    /// Running discovery twice over an unchanged tree yields identical results.
    pub fn discover(&self) -> Result<Discovery, MigrateError> {
        let canonical_root = self.root.canonicalize().ok();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut by_identity: BTreeMap<String, MigrationDescriptor> = BTreeMap::new();
        let (paths, mut skipped) = self.matches()?;

        for path in paths {
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !seen.insert(canonical.clone()) {
                continue;
            }

            let Some((domain_app, name)) = self.classify(&path, &canonical, canonical_root.as_deref())
            else {
                tracing::warn!(path = %path.display(), "Skipping file outside the migrations layout");
                skipped.push(SkippedFile {
                    path,
                    reason: "path does not match <domain>/<app>/migrations/<name>".into(),
                });
                continue;
            };

            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(source) => {
                    let err = MigrateError::Read {
                        path: path.clone(),
                        source,
                    };
                    tracing::warn!("{err}");
                    skipped.push(SkippedFile {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let descriptor = MigrationDescriptor::new(domain_app, name, path, checksum(&bytes));
            if let Some(existing) = by_identity.get(&descriptor.identity) {
                return Err(MigrateError::DuplicateIdentity {
                    identity: descriptor.identity,
                    first: existing.path.clone(),
                    second: descriptor.path,
                });
            }
            by_identity.insert(descriptor.identity.clone(), descriptor);
        }

        let descriptors: Vec<_> = by_identity.into_values().collect();
        tracing::debug!(
            root = %self.root.display(),
            found = descriptors.len(),
            skipped = skipped.len(),
            "Discovery complete"
        );
        Ok(Discovery {
            descriptors,
            skipped,
        })
    }

    /// Expands every pattern and returns the candidate files matched, in
    /// pattern order, plus the matches that cannot be migrations.
    ///
    /// Directories are ignored. Paths whose metadata cannot be read (such as
    /// dangling symlinks) are kept as candidates so the read failure is
    /// reported like any other unreadable file.
    fn matches(&self) -> Result<(Vec<PathBuf>, Vec<SkippedFile>), MigrateError> {
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for pattern in &self.patterns {
            let full = self.root.join(pattern);
            let full = full.to_str().ok_or_else(|| {
                MigrateError::Configuration(format!(
                    "Migration pattern is not valid UTF-8: {}",
                    full.display()
                ))
            })?;
            let entries = glob::glob(full).map_err(|e| {
                MigrateError::Configuration(format!("Invalid migration pattern '{pattern}': {e}"))
            })?;

            for entry in entries {
                match entry {
                    Ok(path) => match std::fs::metadata(&path) {
                        Ok(meta) if meta.is_dir() => {}
                        Ok(meta) if !meta.is_file() => {
                            tracing::warn!(
                                path = %path.display(),
                                "Skipping match that is not a regular file"
                            );
                            skipped.push(SkippedFile {
                                path,
                                reason: "not a regular file".into(),
                            });
                        }
                        _ => files.push(path),
                    },
                    Err(e) => {
                        tracing::warn!("Skipping unreadable path during discovery: {e}");
                        skipped.push(SkippedFile {
                            path: e.path().to_path_buf(),
                            reason: e.error().to_string(),
                        });
                    }
                }
            }
        }
        Ok((files, skipped))
    }

    /// Derives `(domain_app, name)` for a matched file.
    ///
    /// Prefers the canonical path so `./` prefixes and symlinked roots do not
    /// matter, and falls back to the path as matched.
    fn classify(
        &self,
        path: &Path,
        canonical: &Path,
        canonical_root: Option<&Path>,
    ) -> Option<(String, String)> {
        canonical_root
            .and_then(|root| canonical.strip_prefix(root).ok())
            .and_then(parse_identity)
            .or_else(|| {
                path.strip_prefix(&self.root)
                    .ok()
                    .and_then(parse_identity)
            })
    }
}
