//! Creation of new, empty migration files.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use graph_migrate_core::MigrateError;

use crate::descriptor::MIGRATIONS_DIR;

/// Writes a new numbered migration for `app` under `root` and returns its path.
///
/// The file lands in `{root}/{app}/migrations/{NNN}_{slug}.{extension}`, where
/// `NNN` follows the highest numeric prefix already in that directory. The
/// template holds only comment lines, so applying it runs no statements.
/// Existing files are never overwritten.
pub fn create_skeleton(
    root: &Path,
    app: &str,
    name: &str,
    extension: &str,
) -> Result<PathBuf, MigrateError> {
    validate_app(app)?;
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::Configuration(format!(
            "Migration name '{name}' has no usable characters"
        )));
    }
    let extension = extension.trim_start_matches('.');

    let dir = root.join(app).join(MIGRATIONS_DIR);
    std::fs::create_dir_all(&dir)?;

    let stem = format!("{:03}_{slug}", next_migration_number(&dir));
    let path = dir.join(format!("{stem}.{extension}"));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                MigrateError::Configuration(format!(
                    "Refusing to overwrite existing migration {}",
                    path.display()
                ))
            } else {
                MigrateError::Io(e)
            }
        })?;
    file.write_all(template(&format!("{app}/{stem}")).as_bytes())?;

    tracing::info!(path = %path.display(), "Created migration");
    Ok(path)
}

/// Determines the next migration number by scanning the files in `dir`.
///
/// Only the leading digits of each file name count: `007_add_index` -> 7.
pub fn next_migration_number(dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 1;
    };

    let max_num = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        })
        .max()
        .unwrap_or(0);

    max_num + 1
}

/// Lowercases `name` and collapses every run of non-alphanumeric characters
/// into a single `_`.
///
/// ```
/// use graph_migrate_engine::skeleton::slugify;
///
/// assert_eq!(slugify("Add user email index!"), "add_user_email_index");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

fn validate_app(app: &str) -> Result<(), MigrateError> {
    let segments: Vec<&str> = app.split('/').collect();
    let valid = (1..=2).contains(&segments.len())
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        })
        && !segments.contains(&MIGRATIONS_DIR);
    if valid {
        Ok(())
    } else {
        Err(MigrateError::Configuration(format!(
            "Invalid app '{app}': expected 'domain' or 'domain/app' using [a-z0-9_-]"
        )))
    }
}

fn template(identity: &str) -> String {
    format!(
        "// Migration: {identity}\n\
         // Created: {created}\n\
         //\n\
         // End each statement with ';' at the end of a line. Lines starting\n\
         // with '//' are comments. Statements must be safe to run again\n\
         // (prefer IF NOT EXISTS and MERGE).\n",
        created = Utc::now().to_rfc3339()
    )
}
