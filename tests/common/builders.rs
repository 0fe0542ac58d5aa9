//! Builders for throwaway stores

use tempfile::TempDir;
use weighit::store::{LogStore, SchemaScript};

/// A store on a fresh database file that lives as long as this value
pub struct TestStore {
    pub store: LogStore,
    dir: TempDir,
}

impl TestStore {
    /// Fresh database with the bundled schema and seed data
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store =
            LogStore::init_for_test(dir.path().join("weigh.db"), SchemaScript::Bundled).unwrap();
        Self { store, dir }
    }

    /// Append each `(weight, source, type)` without temperatures
    pub fn with_entries(self, entries: &[(f64, &str, &str)]) -> Self {
        for (weight, source, food_type) in entries {
            self.store
                .append(*weight, source, food_type, None, None)
                .unwrap();
        }
        self
    }

    /// Directory holding the database file
    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl std::ops::Deref for TestStore {
    type Target = LogStore;

    fn deref(&self) -> &LogStore {
        &self.store
    }
}
