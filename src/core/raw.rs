//! Raw SQL fragments
//!
//! A [`RawSql`] carries hand-written SQL plus its parameters. Fragments can be
//! executed on their own, used as a predicate, as an assignment value or as a
//! select column expression.
//!
//! Inside the SQL text:
//! - `<column>` / `<table.column>` is replaced by the quoted identifier
//! - `:name` binds the named parameter `name`
//! - `?` binds the next positional parameter
//!
//! Quoted literals are copied verbatim, and `::` (PostgreSQL casts) is left alone.

use super::database_types::DatabaseType;
use super::error::{PormError, Result};
use super::value::DatabaseValue;
use indexmap::IndexMap;

/// Hand-written SQL with named and positional parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSql {
    sql: String,
    named: IndexMap<String, DatabaseValue>,
    positional: Vec<DatabaseValue>,
}

impl RawSql {
    /// Create a fragment without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Create a fragment with named parameters (`":id"` and `"id"` are the same name)
    pub fn with_params<K, V>(sql: impl Into<String>, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        params
            .into_iter()
            .fold(Self::new(sql), |raw, (name, value)| raw.bind(name, value))
    }

    /// Bind a named parameter
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        let name = name.into();
        let name = name.trim_start_matches(':').to_string();
        self.named.insert(name, value.into());
        self
    }

    /// Bind the next positional (`?`) parameter
    #[must_use]
    pub fn arg(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// The SQL text as written
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Named parameters, in binding order
    pub fn named_params(&self) -> &IndexMap<String, DatabaseValue> {
        &self.named
    }

    /// Positional parameters, in binding order
    pub fn positional_params(&self) -> &[DatabaseValue] {
        &self.positional
    }

    /// Lower to driver SQL with `?` placeholders and the matching parameter list
    pub fn lower(&self, dialect: DatabaseType) -> Result<(String, Vec<DatabaseValue>)> {
        let chars: Vec<char> = self.sql.chars().collect();
        let mut out = String::with_capacity(self.sql.len());
        let mut params = Vec::new();
        let mut positional = self.positional.iter();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' | '"' => {
                    out.push(c);
                    i += 1;
                    while i < chars.len() {
                        let ch = chars[i];
                        out.push(ch);
                        i += 1;
                        if ch == c {
                            // doubled quote is an escape, keep scanning
                            if i < chars.len() && chars[i] == c {
                                out.push(c);
                                i += 1;
                                continue;
                            }
                            break;
                        }
                    }
                }
                ':' if chars.get(i + 1) == Some(&':') => {
                    out.push_str("::");
                    i += 2;
                }
                ':' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    let value = self.named.get(&name).ok_or_else(|| {
                        PormError::query(format!("missing value for raw parameter :{name}"))
                    })?;
                    out.push('?');
                    params.push(value.clone());
                    i = end;
                }
                '?' => {
                    let value = positional.next().ok_or_else(|| {
                        PormError::query(format!(
                            "raw query has more `?` placeholders than the {} positional values bound",
                            self.positional.len()
                        ))
                    })?;
                    out.push('?');
                    params.push(value.clone());
                    i += 1;
                }
                '<' => match read_identifier(&chars, i + 1) {
                    Some((identifier, end)) => {
                        out.push_str(&dialect.quote_identifier(&identifier));
                        i = end + 1;
                    }
                    None => {
                        out.push('<');
                        i += 1;
                    }
                },
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        let unused = positional.len();
        if unused > 0 {
            return Err(PormError::query(format!(
                "raw query has {unused} positional value(s) without a `?` placeholder"
            )));
        }

        Ok((out, params))
    }
}

/// Read `ident>` starting at `start`; returns the identifier and the index of `>`
fn read_identifier(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_' || chars[end] == '.') {
        end += 1;
    }
    if end > start && chars.get(end) == Some(&'>') {
        Some((chars[start..end].iter().collect(), end))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_params_become_positional() {
        let raw = RawSql::with_params(
            "SELECT * FROM <users> WHERE <users.age> > :age AND name = :name",
            [(":age", DatabaseValue::from(18)), ("name", DatabaseValue::from("Jet"))],
        );
        let (sql, params) = raw.lower(DatabaseType::Sqlite).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE \"users\".\"age\" > ? AND name = ?"
        );
        assert_eq!(params, vec![DatabaseValue::Int(18), DatabaseValue::from("Jet")]);
    }

    #[test]
    fn test_literals_and_casts_untouched() {
        let raw = RawSql::new("SELECT ':skip', 'it''s ?', id::text FROM t WHERE a < b");
        let (sql, params) = raw.lower(DatabaseType::Postgres).unwrap();
        assert_eq!(sql, "SELECT ':skip', 'it''s ?', id::text FROM t WHERE a < b");
        assert!(params.is_empty());
    }

    #[test]
    fn test_leftover_positional_values_rejected() {
        let raw = RawSql::new("SELECT 'it''s ?'").arg(1);
        assert!(matches!(
            raw.lower(DatabaseType::Sqlite),
            Err(PormError::QueryError(_))
        ));

        let raw = RawSql::new("SELECT ?").arg(1).arg(2);
        assert!(raw.lower(DatabaseType::Sqlite).is_err());
    }

    #[test]
    fn test_positional_params() {
        let raw = RawSql::new("SELECT ? + ?").arg(1).arg(2);
        let (sql, params) = raw.lower(DatabaseType::Mysql).unwrap();
        assert_eq!(sql, "SELECT ? + ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_missing_params_fail() {
        assert!(RawSql::new("SELECT :nope").lower(DatabaseType::Sqlite).is_err());
        assert!(RawSql::new("SELECT ?").lower(DatabaseType::Sqlite).is_err());
    }
}
