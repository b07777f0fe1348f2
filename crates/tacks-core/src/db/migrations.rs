//! Boot-time schema migrations.
//!
//! The migration directory holds plain `.sql` files applied in lexicographic
//! filename order, each file executed as one batch. Numbered prefixes
//! (`0001_init.sql`, `0002_...`) give deterministic ordering. Any failure is
//! fatal at boot; there is no partial-application bookkeeping because every
//! statement is written `IF NOT EXISTS`-safe.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

/// Apply every `.sql` file under `dir` in lexicographic order.
///
/// Returns the number of files applied. Non-`.sql` entries are ignored.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, a file cannot be
/// loaded, or any batch fails to execute.
pub fn run(conn: &Connection, dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read migration directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("list migration directory {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sql = std::fs::read_to_string(path)
            .with_context(|| format!("read migration file {name}"))?;
        conn.execute_batch(&sql)
            .with_context(|| format!("apply migration {name}"))?;
        info!(migration = %name, "applied migration");
    }

    Ok(paths.len())
}
