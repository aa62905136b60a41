//! Migration descriptors and identity rules.
//!
//! A [`MigrationDescriptor`] is built fresh for every discovered file on each
//! run. Its identity comes from where the file sits relative to the discovery
//! root:
//!
//! ```text
//! migrations/001_init.cypher                    -> core/001_init
//! billing/migrations/001_invoices.cypher        -> billing/001_invoices
//! core/identity/migrations/001_user_schema.cypher -> core/identity/001_user_schema
//! apps/twitter/tweet/migrations/001_schema.cypher -> twitter/tweet/001_schema
//! ```

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// The directory name every migration file must live in.
pub const MIGRATIONS_DIR: &str = "migrations";

/// The `domain_app` given to files in a top-level `migrations/` directory.
pub const CORE_DOMAIN: &str = "core";

/// A migration file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationDescriptor {
    /// Globally unique identity: `{domain_app}/{name}`.
    pub identity: String,
    /// The `{domain}/{app}`, `{domain}`, or `core` part of the identity.
    pub domain_app: String,
    /// The file stem.
    pub name: String,
    /// Where the file lives.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file's bytes at discovery time.
    pub checksum: String,
}

impl MigrationDescriptor {
    /// Creates a descriptor, deriving `identity` from `domain_app` and `name`.
    pub fn new(
        domain_app: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        checksum: impl Into<String>,
    ) -> Self {
        let domain_app = domain_app.into();
        let name = name.into();
        Self {
            identity: format!("{domain_app}/{name}"),
            domain_app,
            name,
            path: path.into(),
            checksum: checksum.into(),
        }
    }

    /// Returns `true` if no scope is given or the descriptor belongs to it.
    pub fn in_scope(&self, scope: Option<&str>) -> bool {
        scope.map_or(true, |s| self.domain_app == s)
    }
}

/// Computes the lowercase hex SHA-256 digest of `bytes`.
///
/// # Examples
///
/// ```
/// use graph_migrate_engine::descriptor::checksum;
///
/// assert_eq!(
///     checksum(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Returns the `domain_app` part of an identity (everything before the last `/`).
pub fn domain_app_of(identity: &str) -> &str {
    identity.rsplit_once('/').map_or("", |(domain_app, _)| domain_app)
}

/// Returns `true` if `identity` belongs to `scope`, or if there is no scope.
pub fn identity_in_scope(identity: &str, scope: Option<&str>) -> bool {
    scope.map_or(true, |s| domain_app_of(identity) == s)
}

/// Derives `(domain_app, name)` from a file path relative to the discovery root.
///
/// Returns `None` when the path does not follow the layout: the parent
/// directory must be `migrations`, every segment must be plain UTF-8, and the
/// stem must be non-empty and must not start with `.`.
pub fn parse_identity(relative: &Path) -> Option<(String, String)> {
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()?;

    let (file_name, dirs) = segments.split_last()?;
    let (parent, prefix) = dirs.split_last()?;
    if *parent != MIGRATIONS_DIR || prefix.iter().any(|s| s.is_empty()) {
        return None;
    }

    let name = Path::new(file_name).file_stem()?.to_str()?;
    if name.is_empty() || name.starts_with('.') {
        return None;
    }

    let domain_app = match prefix {
        [] => CORE_DOMAIN.to_string(),
        [domain] => (*domain).to_string(),
        [.., domain, app] => format!("{domain}/{app}"),
    };
    Some((domain_app, name.to_string()))
}
