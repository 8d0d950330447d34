use crate::core::{Result, TbdbError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Connection settings read when the connection is constructed.
///
/// Only the seven fields below exist. Unknown keys are rejected both by
/// [`Config::apply`] and when deserializing a config file.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub charset: String,
    pub user: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            driver: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            dbname: String::new(),
            charset: "utf8".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("charset", &self.charset)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A value passed to [`Config::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Number(i64),
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<u16> for OptionValue {
    fn from(value: u16) -> Self {
        OptionValue::Number(value.into())
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(value.into())
    }
}

/// One validated option, ready to be written into a `Config`.
#[derive(Debug)]
enum Setting {
    Driver(String),
    Host(String),
    Port(u16),
    Dbname(String),
    Charset(String),
    User(String),
    Password(String),
}

impl Setting {
    fn parse(key: &str, value: OptionValue) -> Result<Self> {
        match key {
            "driver" => text(key, value).map(Setting::Driver),
            "host" => text(key, value).map(Setting::Host),
            "port" => match value {
                OptionValue::Number(n) => u16::try_from(n)
                    .map(Setting::Port)
                    .map_err(|_| TbdbError::InvalidOption(format!("port {} is out of range", n))),
                OptionValue::Text(_) => Err(TbdbError::InvalidOption(
                    "port expects a number".to_string(),
                )),
            },
            "dbname" => text(key, value).map(Setting::Dbname),
            "charset" => text(key, value).map(Setting::Charset),
            "user" => text(key, value).map(Setting::User),
            "password" => text(key, value).map(Setting::Password),
            other => Err(TbdbError::InvalidOption(format!(
                "'{}' is not an accepted option",
                other
            ))),
        }
    }

    fn write(self, config: &mut Config) {
        match self {
            Setting::Driver(v) => config.driver = v,
            Setting::Host(v) => config.host = v,
            Setting::Port(v) => config.port = v,
            Setting::Dbname(v) => config.dbname = v,
            Setting::Charset(v) => config.charset = v,
            Setting::User(v) => config.user = v,
            Setting::Password(v) => config.password = v,
        }
    }
}

fn text(key: &str, value: OptionValue) -> Result<String> {
    match value {
        OptionValue::Text(s) => Ok(s),
        OptionValue::Number(_) => Err(TbdbError::InvalidOption(format!(
            "{} expects a string",
            key
        ))),
    }
}

impl Config {
    /// Applies a set of named options.
    ///
    /// All options are validated before any field is written: if one key is
    /// unknown or has the wrong type, the config is left exactly as it was.
    pub fn apply<I, K, V>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let settings = options
            .into_iter()
            .map(|(key, value)| Setting::parse(key.as_ref(), value.into()))
            .collect::<Result<Vec<_>>>()?;

        for setting in settings {
            setting.write(self);
        }
        Ok(())
    }

    /// Renders the connection string, e.g. `mysql:host=localhost:3306;dbname=app;charset=utf8`.
    pub fn dsn(&self) -> String {
        format!(
            "{}:host={}:{};dbname={};charset={}",
            self.driver, self.host, self.port, self.dbname, self.charset
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    database: Config,
}

/// Parses configuration from TOML text with a `[database]` table.
pub fn parse_config(content: &str) -> Result<Config> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| TbdbError::Config(e.to_string()))?;
    Ok(file.database)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = tbdb::config::load_config("config.toml").expect("Failed to load config");
/// println!("{}", config.dsn());
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Default location of the config file, `<config_dir>/tbdb/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tbdb").join("config.toml"))
}
