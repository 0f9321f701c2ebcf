//! Entry point
//!
//! [`Porm`] holds the injected settings and the shared connection cache, and
//! hands out one [`QueryBuilder`] per chain.

use super::builder::QueryBuilder;
use super::config::{Settings, DEFAULT_CONNECTION};
use super::driver::Driver;
use super::error::Result;
use super::materialize::ResultSet;
use super::raw::RawSql;
use super::render::TableRef;
use super::resolver::{ConnectionRef, ConnectionResolver};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct Porm {
    resolver: ConnectionResolver,
}

impl Porm {
    pub fn new(settings: Settings) -> Self {
        Self {
            resolver: ConnectionResolver::new(settings),
        }
    }

    /// Load settings from a TOML file
    pub fn from_settings_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Settings::load(path)?))
    }

    /// Use `driver` as the default connection
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        let porm = Self::new(Settings::default());
        porm.resolver.register(DEFAULT_CONNECTION, driver);
        porm
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// Start a chain on `table` over the default connection
    pub fn from(&self, table: &str) -> Result<QueryBuilder> {
        self.table(table, None, None)
    }

    /// Start a chain on `table`, optionally aliased and over another connection
    pub fn table(&self, table: &str, alias: Option<&str>, using: Option<ConnectionRef>) -> Result<QueryBuilder> {
        debug!(table, alias, "starting query chain");
        QueryBuilder::new(
            self.resolver.clone(),
            TableRef::new(table, alias.map(str::to_string)),
            using,
        )
    }

    /// Run raw SQL; exactly one returned row comes back as a single record
    pub fn raw_query(&self, raw: &RawSql, using: Option<ConnectionRef>) -> Result<ResultSet> {
        let driver = self.resolver.resolve(using)?;
        let mut rows = driver.query(raw)?;
        if rows.len() == 1 {
            if let Some(row) = rows.pop() {
                return Ok(ResultSet::Row(row));
            }
        }
        Ok(ResultSet::Rows(rows))
    }
}
