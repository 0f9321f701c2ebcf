//! Connection resolution
//!
//! Turns a connection reference (a section name, an option map, a native
//! handle or a ready driver) into a shared driver. Drivers built from named
//! sections are cached per resolver, so every builder created from the same
//! entry point shares one connection per name.

use super::config::{ConnectionOptions, Settings, DEFAULT_CONNECTION};
use super::driver::Driver;
use super::error::{PormError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// What a builder should connect through
pub enum ConnectionRef {
    /// The `db` section, or built-in defaults when it is absent
    Default,
    /// A named section, optionally with explicit overrides
    Named {
        name: String,
        overrides: Option<ConnectionOptions>,
    },
    /// Explicit options merged over the defaults
    Options(ConnectionOptions),
    /// Already-open SQLite connection
    #[cfg(feature = "sqlite")]
    Native(rusqlite::Connection),
    /// Ready driver, used as-is
    Driver(Arc<dyn Driver>),
}

impl std::fmt::Debug for ConnectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionRef::Default => f.write_str("Default"),
            ConnectionRef::Named { name, overrides } => f
                .debug_struct("Named")
                .field("name", name)
                .field("overrides", overrides)
                .finish(),
            ConnectionRef::Options(options) => f.debug_tuple("Options").field(options).finish(),
            #[cfg(feature = "sqlite")]
            ConnectionRef::Native(_) => f.write_str("Native(..)"),
            ConnectionRef::Driver(driver) => {
                f.debug_tuple("Driver").field(&driver.database_type()).finish()
            }
        }
    }
}

impl From<()> for ConnectionRef {
    fn from(_: ()) -> Self {
        ConnectionRef::Default
    }
}

impl From<&str> for ConnectionRef {
    fn from(name: &str) -> Self {
        ConnectionRef::Named {
            name: name.to_string(),
            overrides: None,
        }
    }
}

impl From<String> for ConnectionRef {
    fn from(name: String) -> Self {
        ConnectionRef::Named {
            name,
            overrides: None,
        }
    }
}

impl From<(&str, ConnectionOptions)> for ConnectionRef {
    fn from((name, overrides): (&str, ConnectionOptions)) -> Self {
        ConnectionRef::Named {
            name: name.to_string(),
            overrides: Some(overrides),
        }
    }
}

impl From<ConnectionOptions> for ConnectionRef {
    fn from(options: ConnectionOptions) -> Self {
        ConnectionRef::Options(options)
    }
}

impl From<Arc<dyn Driver>> for ConnectionRef {
    fn from(driver: Arc<dyn Driver>) -> Self {
        ConnectionRef::Driver(driver)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Connection> for ConnectionRef {
    fn from(conn: rusqlite::Connection) -> Self {
        ConnectionRef::Native(conn)
    }
}

impl<T: Into<ConnectionRef>> From<Option<T>> for ConnectionRef {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ConnectionRef::Default)
    }
}

/// Resolves connection references against injected settings
#[derive(Clone)]
pub struct ConnectionResolver {
    settings: Arc<Settings>,
    cache: Arc<Mutex<HashMap<String, Arc<dyn Driver>>>>,
}

impl ConnectionResolver {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Use `driver` whenever the connection `name` is requested
    pub fn register(&self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.cache.lock().insert(name.into(), driver);
    }

    /// Produce a driver for `connection`
    ///
    /// # Errors
    ///
    /// - [`PormError::Configuration`] when a named section does not exist
    /// - [`PormError::ConnectionResolution`] when the driver cannot be built
    pub fn resolve(&self, connection: impl Into<ConnectionRef>) -> Result<Arc<dyn Driver>> {
        match connection.into() {
            ConnectionRef::Default => self.named(DEFAULT_CONNECTION, None, true),
            ConnectionRef::Named { name, overrides } => self.named(&name, overrides, false),
            ConnectionRef::Options(options) => {
                let logging = options
                    .logging
                    .unwrap_or_else(|| self.settings.can_log(DEFAULT_CONNECTION));
                build_driver("<options>", &options, logging)
            }
            #[cfg(feature = "sqlite")]
            ConnectionRef::Native(conn) => {
                let logging = self.settings.can_log(DEFAULT_CONNECTION);
                debug!(logging, "wrapping native sqlite connection");
                let driver = crate::backends::SqliteDriver::from_connection(conn, logging)
                    .map_err(|e| PormError::resolution_with_source("<native>", "cannot wrap native handle", Box::new(e)))?;
                Ok(Arc::new(driver))
            }
            ConnectionRef::Driver(driver) => Ok(driver),
        }
    }

    fn named(
        &self,
        name: &str,
        overrides: Option<ConnectionOptions>,
        allow_defaults: bool,
    ) -> Result<Arc<dyn Driver>> {
        let entry = self.settings.section_entry(name);
        // one driver per section, however the caller spells its name
        let key = entry.map_or(name, |(key, _)| key).to_string();

        if overrides.is_none() {
            if let Some(driver) = self.cache.lock().get(&key) {
                return Ok(Arc::clone(driver));
            }
        }

        let section = match entry {
            Some((_, section)) => section.clone(),
            None if allow_defaults => ConnectionOptions::default(),
            None => return Err(PormError::Configuration(name.to_string())),
        };
        let explicit_logging = overrides.as_ref().and_then(|o| o.logging);
        let cacheable = overrides.is_none();
        let options = match overrides {
            Some(overrides) => overrides.merge_over(&section),
            None => section,
        };
        let logging = explicit_logging.unwrap_or_else(|| self.settings.can_log(&key));
        let driver = build_driver(&key, &options, logging)?;

        if cacheable {
            let mut cache = self.cache.lock();
            return Ok(Arc::clone(cache.entry(key).or_insert(driver)));
        }
        Ok(driver)
    }
}

impl std::fmt::Debug for ConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionResolver")
            .field("settings", &self.settings)
            .field("cached", &self.cache.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn build_driver(name: &str, options: &ConnectionOptions, logging: bool) -> Result<Arc<dyn Driver>> {
    let driver_type = options.driver_type();
    debug!(connection = name, driver = %driver_type, logging, "resolving connection");
    match driver_type {
        #[cfg(feature = "sqlite")]
        super::database_types::DatabaseType::Sqlite => {
            let path = options.connection_string();
            let driver = crate::backends::SqliteDriver::open(&path, logging).map_err(|e| {
                PormError::resolution_with_source(name, format!("cannot open `{path}`"), Box::new(e))
            })?;
            Ok(Arc::new(driver))
        }
        other => Err(PormError::resolution(
            name,
            format!("no {other} backend is compiled into this build"),
        )),
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::database_types::DatabaseType;

    fn settings() -> Settings {
        Settings::from_toml_str(
            r#"
[db]
type = "sqlite"
database = ":memory:"

[warehouse]
type = "mysql"
host = "localhost"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_named_drivers_are_cached() {
        let resolver = ConnectionResolver::new(settings());
        let a = resolver.resolve(()).unwrap();
        let b = resolver.resolve("db").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.database_type(), DatabaseType::Sqlite);
    }

    #[test]
    fn test_section_name_case_shares_driver() {
        let resolver = ConnectionResolver::new(settings());
        let lower = resolver.resolve("db").unwrap();
        let upper = resolver.resolve("DB").unwrap();
        let default = resolver.resolve(()).unwrap();
        assert!(Arc::ptr_eq(&lower, &upper));
        assert!(Arc::ptr_eq(&lower, &default));

        lower.execute("CREATE TABLE t (id INTEGER)").unwrap();
        assert_eq!(upper.query_with_params("SELECT * FROM t", &[]).unwrap().len(), 0);
    }

    #[test]
    fn test_missing_section_is_configuration_error() {
        let resolver = ConnectionResolver::new(settings());
        assert!(matches!(
            resolver.resolve("nope"),
            Err(PormError::Configuration(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_default_without_section_uses_builtin_defaults() {
        let resolver = ConnectionResolver::new(Settings::default());
        let driver = resolver.resolve(None::<&str>).unwrap();
        assert_eq!(driver.info().database, ":memory:");
    }

    #[test]
    fn test_backend_not_compiled() {
        let resolver = ConnectionResolver::new(settings());
        assert!(matches!(
            resolver.resolve("warehouse"),
            Err(PormError::ConnectionResolution { .. })
        ));
    }

    #[test]
    fn test_explicit_logging_wins() {
        let resolver = ConnectionResolver::new(settings());
        let quiet = resolver
            .resolve(ConnectionOptions::new(DatabaseType::Sqlite).logging(false))
            .unwrap();
        assert!(!quiet.info().logging);

        let loud = resolver
            .resolve(("db", ConnectionOptions::default().logging(true)))
            .unwrap();
        assert!(loud.info().logging);
    }

    #[test]
    fn test_prebuilt_and_native_pass_through() {
        let resolver = ConnectionResolver::new(Settings::default());
        let driver: Arc<dyn Driver> = Arc::new(crate::backends::SqliteDriver::in_memory().unwrap());
        let resolved = resolver.resolve(Arc::clone(&driver)).unwrap();
        assert!(Arc::ptr_eq(&driver, &resolved));

        let native = rusqlite::Connection::open_in_memory().unwrap();
        assert!(resolver.resolve(native).is_ok());

        resolver.register("shared", Arc::clone(&driver));
        assert!(Arc::ptr_eq(&resolver.resolve("shared").unwrap(), &driver));
    }
}
