//! Lifecycle tests for the process-wide instance.
//!
//! The instance is global to this test binary, so every test holds
//! `SERIAL` for its whole duration and starts from `db::reset()`.

#[cfg(test)]
mod singleton_tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tbdb::core::db;
    use tbdb::{Config, DbType, Insert, OptionValue, Params, Scalar, TbdbError};
    use tempfile::NamedTempFile;

    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        db::reset().unwrap();
        guard
    }

    fn init_memory_sqlite() {
        db::init([
            ("driver", OptionValue::from("sqlite")),
            ("dbname", OptionValue::from(":memory:")),
        ])
        .unwrap();
    }

    #[test]
    fn test_unknown_option_applies_nothing() {
        let _guard = serial();

        let result = db::init([
            ("host", OptionValue::from("db.internal")),
            ("socket", OptionValue::from("/tmp/db.sock")),
            ("user", OptionValue::from("app")),
        ]);
        assert!(matches!(result, Err(TbdbError::InvalidOption(_))));
        assert_eq!(db::current_config().unwrap(), Config::default());
    }

    #[test]
    fn test_get_instance_returns_same_instance() {
        let _guard = serial();
        init_memory_sqlite();

        let first = db::get_instance().unwrap();
        let second = db::get_instance().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // data written through one handle is visible through the other
        first
            .lock()
            .unwrap()
            .insert("CREATE TABLE t (v TEXT)", Insert::Exec)
            .unwrap();
        first
            .lock()
            .unwrap()
            .insert("INSERT INTO t (v) VALUES ('x')", Insert::Exec)
            .unwrap();
        let count = second
            .lock()
            .unwrap()
            .get_var("SELECT COUNT(*) FROM t", None, DbType::Number)
            .unwrap();
        assert_eq!(count, Some(Scalar::Integer(1)));
    }

    #[test]
    fn test_init_after_connect_does_not_reconnect() {
        let _guard = serial();
        init_memory_sqlite();

        let first = db::get_instance().unwrap();
        db::init([("charset", OptionValue::from("utf16"))]).unwrap();
        let second = db::get_instance().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().unwrap().config().charset, "utf8");
        assert_eq!(db::current_config().unwrap().charset, "utf16");
    }

    #[test]
    fn test_close_invalidates_old_handles() {
        let _guard = serial();
        init_memory_sqlite();

        let old = db::get_instance().unwrap();
        db::close().unwrap();

        let result = old.lock().unwrap().get_results("SELECT 1", None);
        assert!(matches!(result, Err(TbdbError::Uninitialized)));

        let fresh = db::get_instance().unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(fresh.lock().unwrap().is_connected());

        // closing twice is harmless
        db::close().unwrap();
        db::close().unwrap();
    }

    #[test]
    fn test_default_driver_cannot_connect() {
        let _guard = serial();

        match db::get_instance() {
            Err(TbdbError::Database { message, code, .. }) => {
                assert_eq!(message, "could not find driver");
                assert_eq!(code, -1);
            }
            Err(other) => panic!("Expected Database error, got {:?}", other),
            Ok(_) => panic!("mysql driver should not be available"),
        }
    }

    #[test]
    fn test_init_from_file() {
        let _guard = serial();

        let db_file = NamedTempFile::new().unwrap();
        let mut config_file = NamedTempFile::new().unwrap();
        writeln!(
            config_file,
            "[database]\ndriver = \"sqlite\"\ndbname = \"{}\"\n",
            db_file.path().display()
        )
        .unwrap();

        db::init_from_file(config_file.path()).unwrap();
        let instance = db::get_instance().unwrap();
        let database = instance.lock().unwrap();
        database
            .insert("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", Insert::Exec)
            .unwrap();
        let ids = database
            .insert(
                "INSERT INTO kv (k, v) VALUES (?, ?)",
                Insert::Single(Params::positional(["a".to_string(), "1".to_string()])),
            )
            .unwrap();
        assert_eq!(ids, vec![1]);
    }
}
