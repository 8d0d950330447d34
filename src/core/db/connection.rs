/// Connection Management Module
///
/// Process-wide database state: the configuration set through `init` and
/// the shared `Database` instance created lazily by `get_instance`.
///
/// Code that can thread a `Database` through its call sites should build
/// one with `Database::connect` instead; this module exists for callers that
/// need one connection shared across the whole process.

use crate::config::{load_config, Config, OptionValue};
use crate::core::db::Database;
use crate::core::{Result, TbdbError};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Shared handle to the process-wide facade.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Global database state
///
/// Initialized on first access and guarded by a mutex, so `init`,
/// `get_instance` and `close` are serialized across threads.
pub(crate) static DB_STATE: OnceCell<Mutex<DbState>> = OnceCell::new();

/// Internal database state structure
#[derive(Debug, Default)]
pub struct DbState {
    /// Options read when the instance is created
    pub config: Config,
    /// Shared instance (None until `get_instance`, and again after `close`)
    pub instance: Option<SharedDatabase>,
}

fn state() -> Result<MutexGuard<'static, DbState>> {
    DB_STATE
        .get_or_init(|| Mutex::new(DbState::default()))
        .lock()
        .map_err(|_| TbdbError::State("Failed to acquire database lock".to_string()))
}

/// Applies named options to the process-wide configuration.
///
/// Fails with `TbdbError::InvalidOption` on any unknown key or mistyped
/// value, in which case no option from this call is applied. Options set
/// after the instance exists take effect only once it is closed and
/// recreated.
pub fn init<I, K, V>(options: I) -> Result<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<OptionValue>,
{
    let mut state = state()?;
    state.config.apply(options)?;
    info!(dsn = %state.config.dsn(), "database configuration updated");
    if state.instance.is_some() {
        debug!("instance already exists, new configuration applies after close");
    }
    Ok(())
}

/// Replaces the process-wide configuration with the contents of a TOML file.
pub fn init_from_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = load_config(path.as_ref())?;
    let mut state = state()?;
    info!(path = %path.as_ref().display(), dsn = %config.dsn(), "database configuration loaded");
    state.config = config;
    Ok(())
}

/// A copy of the current process-wide configuration.
pub fn current_config() -> Result<Config> {
    Ok(state()?.config.clone())
}

/// Returns the shared instance, connecting on first use.
///
/// Repeated calls without an intervening `close` return handles to the same
/// instance.
pub fn get_instance() -> Result<SharedDatabase> {
    let mut state = state()?;
    if let Some(instance) = &state.instance {
        return Ok(Arc::clone(instance));
    }

    let instance = Arc::new(Mutex::new(Database::connect(state.config.clone())?));
    state.instance = Some(Arc::clone(&instance));
    Ok(instance)
}

/// Closes the shared instance's connection and forgets the instance.
///
/// Handles obtained earlier fail every data call with
/// `TbdbError::Uninitialized`; the next `get_instance` connects again. Must
/// not be called while holding the instance lock.
pub fn close() -> Result<()> {
    let instance = state()?.instance.take();
    if let Some(instance) = instance {
        let mut db = instance
            .lock()
            .map_err(|_| TbdbError::State("Failed to acquire instance lock".to_string()))?;
        db.close()?;
    }
    Ok(())
}

/// Closes the shared instance and restores the default configuration.
pub fn reset() -> Result<()> {
    close()?;
    state()?.config = Config::default();
    Ok(())
}
