//! Database type definitions
//!
//! This module defines the SQL engines a connection section can name, plus the
//! handful of per-engine spellings the statement renderer needs.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// SQLite database
    #[default]
    #[serde(alias = "sqlite3")]
    Sqlite,
    /// PostgreSQL database
    #[serde(alias = "postgresql", alias = "pgsql")]
    Postgres,
    /// MySQL/MariaDB database
    #[serde(alias = "mariadb")]
    Mysql,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Mysql => "mysql",
        }
    }

    /// Quote a (possibly dotted) identifier: `users.id` -> `"users"."id"`
    ///
    /// `*` segments are left bare so `users.*` stays a wildcard.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = match self {
            DatabaseType::Mysql => '`',
            DatabaseType::Sqlite | DatabaseType::Postgres => '"',
        };
        identifier
            .split('.')
            .map(|segment| {
                if segment == "*" {
                    segment.to_string()
                } else {
                    let escaped = segment.replace(quote, &format!("{quote}{quote}"));
                    format!("{quote}{escaped}{quote}")
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// SQL function returning a random number, used for random sampling
    pub fn random_function(&self) -> &'static str {
        match self {
            DatabaseType::Mysql => "RAND()",
            DatabaseType::Sqlite | DatabaseType::Postgres => "RANDOM()",
        }
    }

    /// Hidden per-row identifier, if the engine has one
    ///
    /// Used to delete at most one row on engines without `DELETE ... LIMIT`.
    pub fn row_identifier(&self) -> Option<&'static str> {
        match self {
            DatabaseType::Sqlite => Some("rowid"),
            DatabaseType::Postgres => Some("ctid"),
            DatabaseType::Mysql => None,
        }
    }

    /// Check if this engine understands `MATCH (...) AGAINST (...)`
    pub fn supports_full_text_match(&self) -> bool {
        matches!(self, DatabaseType::Mysql)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Ok(DatabaseType::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_str() {
        assert_eq!(
            "postgresql".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            "MariaDB".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Mysql)
        );
        assert_eq!(
            "sqlite3".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Sqlite)
        );
        assert_eq!("oracle".parse::<DatabaseType>().ok(), None);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(DatabaseType::Sqlite.quote_identifier("id"), "\"id\"");
        assert_eq!(
            DatabaseType::Postgres.quote_identifier("users.id"),
            "\"users\".\"id\""
        );
        assert_eq!(DatabaseType::Mysql.quote_identifier("users.*"), "`users`.*");
        assert_eq!(
            DatabaseType::Sqlite.quote_identifier("we\"ird"),
            "\"we\"\"ird\""
        );
    }

    #[test]
    fn test_dialect_spellings() {
        assert_eq!(DatabaseType::Mysql.random_function(), "RAND()");
        assert_eq!(DatabaseType::Sqlite.random_function(), "RANDOM()");
        assert_eq!(DatabaseType::Sqlite.row_identifier(), Some("rowid"));
        assert_eq!(DatabaseType::Mysql.row_identifier(), None);
        assert!(DatabaseType::Mysql.supports_full_text_match());
        assert!(!DatabaseType::Sqlite.supports_full_text_match());
    }
}
