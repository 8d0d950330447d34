/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: isolated in-memory databases wrapped
/// in the facade, with an optional standard schema and sample data.

use crate::config::{Config, OptionValue};
use crate::core::db::Database;
use crate::core::Result;

/// Builds a config for the sqlite driver pointing at `dbname`.
pub fn sqlite_config(dbname: &str) -> Config {
    let mut config = Config::default();
    config
        .apply([
            ("driver", OptionValue::from("sqlite")),
            ("dbname", OptionValue::from(dbname)),
        ])
        .expect("valid test options");
    config
}

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub db: Database,
}

impl DatabaseFixture {
    /// Create a new in-memory database with the standard schema
    pub fn new() -> Result<Self> {
        let db = Database::connect(sqlite_config(":memory:"))?;
        let mut fixture = DatabaseFixture { db };
        fixture.setup_standard_schema()?;
        Ok(fixture)
    }

    /// Create fixture with sample data
    pub fn with_sample_data() -> Result<Self> {
        let mut fixture = Self::new()?;
        fixture.populate_sample_data()?;
        Ok(fixture)
    }

    /// Set up standard test schema
    pub fn setup_standard_schema(&mut self) -> Result<()> {
        for ddl in [
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                active TEXT NOT NULL DEFAULT 'true',
                profile_data TEXT,
                preferences TEXT
            )",
            "CREATE TABLE tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
        ] {
            self.db.insert(ddl, crate::core::db::Insert::Exec)?;
        }
        Ok(())
    }

    /// Populate with sample data
    pub fn populate_sample_data(&mut self) -> Result<()> {
        use crate::core::db::{Insert, Params};

        let users = vec![
            ("alice", "true", r#"{"location": "New York", "age": 28}"#, "a:1:{s:5:\"theme\";s:4:\"dark\";}"),
            ("bob", "false", r#"{"location": "San Francisco", "age": 32}"#, "b:0;"),
            ("charlie", "yes", r#"{"location": "London", "age": 25}"#, "N;"),
        ];

        let batch = users
            .into_iter()
            .map(|(username, active, profile, prefs)| {
                Params::positional([
                    username.to_string(),
                    active.to_string(),
                    profile.to_string(),
                    prefs.to_string(),
                ])
            })
            .collect();

        self.db.insert(
            "INSERT INTO users (username, active, profile_data, preferences) VALUES (?, ?, ?, ?)",
            Insert::Multiple(batch),
        )?;
        Ok(())
    }

    /// Number of rows in `table`
    pub fn count(&self, table: &str) -> i64 {
        self.db
            .get_var(&format!("SELECT COUNT(*) FROM {}", table), None, crate::core::db::DbType::Number)
            .expect("count query")
            .and_then(|scalar| scalar.as_i64())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_fixture_creation() {
        let fixture = DatabaseFixture::new().unwrap();
        assert!(fixture.db.is_connected());
        assert_eq!(fixture.count("users"), 0);
    }

    #[test]
    fn test_sample_data_fixture() {
        let fixture = DatabaseFixture::with_sample_data().unwrap();
        assert_eq!(fixture.count("users"), 3);
    }
}
