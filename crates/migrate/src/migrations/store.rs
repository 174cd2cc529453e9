//! Migration File Store - Filesystem side of the migration system
//!
//! Lists, validates and reads `<version>.up.sql` / `<version>.down.sql`
//! pairs from a single directory. The file store is the source of truth for
//! "what migrations exist".

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};

use super::definitions::{MigrationVersion, DOWN_SUFFIX, UP_SUFFIX};

/// Directory of paired migration files
#[derive(Debug, Clone)]
pub struct MigrationFileStore {
    dir: PathBuf,
}

impl MigrationFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Every up-file name, sorted lexicographically (which is chronological).
    /// A missing directory yields an empty list.
    pub fn list_up_files(&self) -> MigrateResult<Vec<String>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| MigrateError::io(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrateError::io(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(UP_SUFFIX) {
                files.push(name);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Whether a file name matches `^\d{14}_[a-z0-9_]+\.up\.sql$`
    pub fn validate_name(filename: &str) -> bool {
        MigrationVersion::from_up_filename(filename).is_ok()
    }

    /// Versions for every listed file; the first invalid name aborts
    pub fn parse_versions(filenames: &[String]) -> MigrateResult<Vec<MigrationVersion>> {
        filenames
            .iter()
            .map(|filename| MigrationVersion::from_up_filename(filename))
            .collect()
    }

    /// Timestamps shared by more than one file, with the files sharing them
    pub fn find_duplicate_versions(filenames: &[String]) -> Vec<(String, Vec<String>)> {
        let mut by_timestamp: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for filename in filenames {
            let version = filename.strip_suffix(UP_SUFFIX).unwrap_or(filename);
            let timestamp = version.split('_').next().unwrap_or(version);
            by_timestamp
                .entry(timestamp.to_string())
                .or_default()
                .push(filename.clone());
        }

        by_timestamp
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .collect()
    }

    /// List, validate and de-duplicate in one step
    pub fn load_versions(&self) -> MigrateResult<Vec<MigrationVersion>> {
        let files = self.list_up_files()?;
        let versions = Self::parse_versions(&files)?;

        let duplicates = Self::find_duplicate_versions(&files);
        if !duplicates.is_empty() {
            return Err(MigrateError::DuplicateVersions { duplicates });
        }

        Ok(versions)
    }

    pub fn up_path(&self, version: &MigrationVersion) -> PathBuf {
        self.dir.join(version.up_filename())
    }

    pub fn down_path(&self, version: &str) -> PathBuf {
        self.dir.join(format!("{}{}", version, DOWN_SUFFIX))
    }

    pub fn read(&self, path: &Path) -> MigrateResult<String> {
        fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))
    }

    /// Create the directory (and parents) if absent
    pub fn ensure_dir(&self) -> MigrateResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| MigrateError::io(&self.dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "SELECT 1;").unwrap();
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = MigrationFileStore::new(temp_dir.path().join("migrations"));

        assert!(!store.exists());
        assert!(store.list_up_files().unwrap().is_empty());
    }

    #[test]
    fn test_lists_only_up_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "20240201000000_b.up.sql");
        touch(temp_dir.path(), "20240101000000_a.up.sql");
        touch(temp_dir.path(), "20240101000000_a.down.sql");
        touch(temp_dir.path(), "README.md");

        let store = MigrationFileStore::new(temp_dir.path());
        assert_eq!(
            store.list_up_files().unwrap(),
            vec!["20240101000000_a.up.sql", "20240201000000_b.up.sql"]
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(MigrationFileStore::validate_name("20240601120000_create_foo.up.sql"));
        assert!(!MigrationFileStore::validate_name("abc_bad.up.sql"));
        assert!(!MigrationFileStore::validate_name("20240601120000_CreateFoo.up.sql"));
    }

    #[test]
    fn test_invalid_name_aborts_parse() {
        let files = vec![
            "20240101000000_a.up.sql".to_string(),
            "abc_bad.up.sql".to_string(),
        ];
        let err = MigrationFileStore::parse_versions(&files).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidFilename { ref filename } if filename == "abc_bad.up.sql"));
    }

    #[test]
    fn test_duplicate_timestamps_are_reported() {
        let files = vec![
            "20240101000000_a.up.sql".to_string(),
            "20240101000000_b.up.sql".to_string(),
            "20240102000000_c.up.sql".to_string(),
        ];

        let duplicates = MigrationFileStore::find_duplicate_versions(&files);
        assert_eq!(
            duplicates,
            vec![(
                "20240101000000".to_string(),
                vec![
                    "20240101000000_a.up.sql".to_string(),
                    "20240101000000_b.up.sql".to_string()
                ]
            )]
        );
    }

    #[test]
    fn test_load_versions_rejects_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "20240101000000_a.up.sql");
        touch(temp_dir.path(), "20240101000000_b.up.sql");

        let store = MigrationFileStore::new(temp_dir.path());
        assert!(matches!(
            store.load_versions().unwrap_err(),
            MigrateError::DuplicateVersions { .. }
        ));
    }

    #[test]
    fn test_paths() {
        let store = MigrationFileStore::new("migrations");
        let version = MigrationVersion::parse("20240601120000_create_foo").unwrap();
        assert_eq!(
            store.up_path(&version),
            PathBuf::from("migrations/20240601120000_create_foo.up.sql")
        );
        assert_eq!(
            store.down_path(version.as_str()),
            PathBuf::from("migrations/20240601120000_create_foo.down.sql")
        );
    }
}
