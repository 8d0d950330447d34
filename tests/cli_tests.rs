//! Tests for the `tbdb` binary.

#[cfg(test)]
mod cli_tests {
    use assert_cmd::Command;
    use rusqlite::Connection;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Setup {
        _db: NamedTempFile,
        config: NamedTempFile,
    }

    fn setup() -> Setup {
        let db = NamedTempFile::new().unwrap();
        let conn = Connection::open(db.path()).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE settings (name TEXT PRIMARY KEY, value TEXT);
            INSERT INTO settings VALUES ('debug', 'on');
            INSERT INTO settings VALUES ('retries', '3');
            INSERT INTO settings VALUES ('limits', '{\"max\": 10}');
        ",
        )
        .unwrap();

        let mut config = NamedTempFile::new().unwrap();
        writeln!(
            config,
            "[database]\ndriver = \"sqlite\"\ndbname = \"{}\"",
            db.path().display()
        )
        .unwrap();

        Setup { _db: db, config }
    }

    fn tbdb(setup: &Setup) -> Command {
        let mut cmd = Command::cargo_bin("tbdb").unwrap();
        cmd.arg("--config").arg(setup.config.path());
        cmd
    }

    #[test]
    fn test_prints_rows_as_json_lines() {
        let setup = setup();
        let output = tbdb(&setup)
            .arg("SELECT name, value FROM settings ORDER BY name")
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"name":"debug","value":"on"}"#);
    }

    #[test]
    fn test_var_conversion() {
        let setup = setup();
        tbdb(&setup)
            .args(["--var", "bool", "SELECT value FROM settings WHERE name = 'debug'"])
            .assert()
            .success()
            .stdout("true\n");

        tbdb(&setup)
            .args(["--var", "number", "SELECT value FROM settings WHERE name = 'retries'"])
            .assert()
            .success()
            .stdout("3\n");

        tbdb(&setup)
            .args(["--var", "json", "SELECT value FROM settings WHERE name = 'limits'"])
            .assert()
            .success()
            .stdout("{\"max\":10}\n");

        tbdb(&setup)
            .args(["--var", "string", "SELECT value FROM settings WHERE name = 'missing'"])
            .assert()
            .success()
            .stdout("null\n");
    }

    #[test]
    fn test_errors_exit_nonzero() {
        let setup = setup();
        tbdb(&setup)
            .args(["--var", "bool", "SELECT name FROM settings WHERE name = 'debug'"])
            .assert()
            .failure();

        tbdb(&setup).arg("SELECT * FROM nope").assert().failure();

        Command::cargo_bin("tbdb").unwrap().assert().failure();
    }
}
