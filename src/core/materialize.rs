//! Result materialization
//!
//! The builder keeps the last terminal result as a [`ResultSet`]; it can be
//! read as rows, rendered as JSON or deserialized into an application type.

use super::error::Result;
use super::value::{DatabaseResult, DatabaseRow};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Last materialized result of a builder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    /// Single record
    Row(DatabaseRow),
    /// Sequence of records, in driver order
    Rows(DatabaseResult),
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        match self {
            ResultSet::Row(row) => row.is_empty(),
            ResultSet::Rows(rows) => rows.is_empty(),
        }
    }

    /// First record, if any
    pub fn first(&self) -> Option<&DatabaseRow> {
        match self {
            ResultSet::Row(row) => Some(row),
            ResultSet::Rows(rows) => rows.first(),
        }
    }

    pub fn into_rows(self) -> DatabaseResult {
        match self {
            ResultSet::Row(row) => vec![row],
            ResultSet::Rows(rows) => rows,
        }
    }

    /// Serialize to a JSON string (an object for one record, an array otherwise)
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize into an application type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }
}

impl From<DatabaseRow> for ResultSet {
    fn from(row: DatabaseRow) -> Self {
        ResultSet::Row(row)
    }
}

impl From<DatabaseResult> for ResultSet {
    fn from(rows: DatabaseResult) -> Self {
        ResultSet::Rows(rows)
    }
}

/// Deserialize one row into an application type
pub fn from_row<T: DeserializeOwned>(row: &DatabaseRow) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(row)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::DatabaseValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
        nickname: Option<String>,
    }

    fn row(id: i64, name: &str) -> DatabaseRow {
        let mut row = DatabaseRow::new();
        row.insert("id".into(), DatabaseValue::Long(id));
        row.insert("name".into(), DatabaseValue::from(name));
        row.insert("nickname".into(), DatabaseValue::Null);
        row
    }

    #[test]
    fn test_row_to_json_and_object() {
        let set = ResultSet::from(row(1, "Ada"));
        assert_eq!(set.to_json().unwrap(), r#"{"id":1,"name":"Ada","nickname":null}"#);

        let user: User = set.deserialize().unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Ada".into(),
                nickname: None
            }
        );
    }

    #[test]
    fn test_rows_to_typed_vec() {
        let set = ResultSet::from(vec![row(1, "Ada"), row(2, "Grace")]);
        let users: Vec<User> = set.deserialize().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].name, "Grace");
        assert_eq!(set.first().map(|r| r["id"].clone()), Some(DatabaseValue::Long(1)));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let set = ResultSet::from(row(1, "Ada"));
        assert!(set.deserialize::<Vec<User>>().is_err());
        assert!(from_row::<User>(&row(3, "Linus")).is_ok());
    }
}
