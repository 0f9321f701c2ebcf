//! Fluent, table-scoped query builder
//!
//! A [`QueryBuilder`] owns one chain: chain methods consume and return the
//! builder, terminal methods borrow it and run against the driver. Which calls
//! are legal depends on the chain's [`Mode`]; see [`QueryState::guard`].
//!
//! ```no_run
//! use porm::prelude::*;
//!
//! # fn main() -> porm::Result<()> {
//! let porm = Porm::new(Settings::default());
//!
//! let user = porm.from("users")?.get(5)?;
//! let does = porm
//!     .from("users")?
//!     .filter([("last_name", "Doe")])?
//!     .all()?;
//! let saved = porm.from("users")?.save([("name", "X")])?;
//! # let _ = (user, does, saved);
//! # Ok(())
//! # }
//! ```

use super::aggregate::{AggregateFn, Aggregates};
use super::driver::{Driver, DriverInfo, QueryLogEntry};
use super::error::{PormError, Result};
use super::materialize::ResultSet;
use super::predicate::{Assignments, Conjunction, Lookup, Operator, Predicate, Where};
use super::raw::RawSql;
use super::render::{
    Columns, FullText, Join, JoinOn, JoinType, Limit, MatchMode, OrderDirection, SelectQuery, TableRef,
};
use super::resolver::{ConnectionRef, ConnectionResolver};
use super::state::{FilterEntry, Mode, Operation, QueryState};
use super::transaction::TransactionGuard;
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, trace};

const DEFAULT_ID_FIELD: &str = "id";
const LOOKUP_LABEL: &str = "lookup";

/// Query builder for one table
pub struct QueryBuilder {
    resolver: ConnectionResolver,
    driver: Arc<dyn Driver>,
    state: QueryState,
    result_set: Option<ResultSet>,
}

impl QueryBuilder {
    pub(crate) fn new(
        resolver: ConnectionResolver,
        table: TableRef,
        using: impl Into<ConnectionRef>,
    ) -> Result<Self> {
        let driver = resolver.resolve(using)?;
        Ok(Self {
            resolver,
            driver,
            state: QueryState::new(table),
            result_set: None,
        })
    }

    /// Point the chain at another table, optionally through another connection
    pub fn table(mut self, name: &str, alias: Option<&str>, using: Option<ConnectionRef>) -> Result<Self> {
        if let Some(using) = using {
            self.driver = self.resolver.resolve(using)?;
        }
        self.state
            .set_table(TableRef::new(name, alias.map(str::to_string)));
        Ok(self)
    }

    /// Select specific columns (`"name"`, `"name(alias)"`, or expression columns)
    ///
    /// Disables `raw()` and `has()` for the rest of the chain.
    pub fn columns(mut self, columns: impl Into<Columns>) -> Result<Self> {
        self.state.guard(Operation::Columns)?;
        self.state.query_mut().columns = columns.into();
        self.state.lock_after_columns();
        Ok(self)
    }

    /// Switch to another connection
    pub fn using(mut self, connection: impl Into<ConnectionRef>) -> Result<Self> {
        self.state.guard(Operation::Using)?;
        self.driver = self.resolver.resolve(connection)?;
        Ok(self)
    }

    /// Merge conditions into the accumulated filter; legal in every mode
    #[must_use]
    pub fn and_where(mut self, filter: impl Into<Where>) -> Self {
        self.state.query_mut().conditions.merge(filter);
        self
    }

    /// Merge conditions and switch to filter-only mode
    pub fn filter(mut self, filter: impl Into<Where>) -> Result<Self> {
        self.state.guard(Operation::Filter)?;
        self.state.query_mut().conditions.merge(filter);
        self.state.enter_filter_only(FilterEntry::Filter);
        Ok(self)
    }

    /// Add a join; `join_type` is one of `INNER`, `LEFT`, `RIGHT`, `FULL`
    ///
    /// Joining the builder's own table requires an alias.
    pub fn join(
        self,
        join_type: &str,
        table: &str,
        on: impl Into<JoinOn>,
        alias: Option<&str>,
    ) -> Result<Self> {
        self.state.guard(Operation::Join)?;
        let join_type = join_type.parse::<JoinType>()?;
        self.join_with(join_type, table, on.into(), alias)
    }

    pub fn inner_join(self, table: &str, on: impl Into<JoinOn>, alias: Option<&str>) -> Result<Self> {
        self.state.guard(Operation::Join)?;
        self.join_with(JoinType::Inner, table, on.into(), alias)
    }

    pub fn left_join(self, table: &str, on: impl Into<JoinOn>, alias: Option<&str>) -> Result<Self> {
        self.state.guard(Operation::Join)?;
        self.join_with(JoinType::Left, table, on.into(), alias)
    }

    pub fn right_join(self, table: &str, on: impl Into<JoinOn>, alias: Option<&str>) -> Result<Self> {
        self.state.guard(Operation::Join)?;
        self.join_with(JoinType::Right, table, on.into(), alias)
    }

    pub fn full_join(self, table: &str, on: impl Into<JoinOn>, alias: Option<&str>) -> Result<Self> {
        self.state.guard(Operation::Join)?;
        self.join_with(JoinType::Full, table, on.into(), alias)
    }

    fn join_with(mut self, join_type: JoinType, table: &str, on: JoinOn, alias: Option<&str>) -> Result<Self> {
        if table == self.state.table().name && alias.is_none() {
            return Err(PormError::invalid_join(format!(
                "cannot join `{table}` to itself without an alias"
            )));
        }
        trace!(table = %self.state.table(), joined = table, ?join_type, "adding join");
        self.state.query_mut().joins.push(Join {
            join_type,
            table: TableRef::new(table, alias.map(str::to_string)),
            on,
        });
        self.state.enter_filter_only(FilterEntry::Join);
        Ok(self)
    }

    /// Limit the number of rows; may be called once per chain
    pub fn limit(mut self, count: u64) -> Result<Self> {
        self.state.set_limit(count)?;
        Ok(self)
    }

    /// Skip `offset` rows
    #[must_use]
    pub fn start_at(mut self, offset: u64) -> Self {
        self.state.set_offset(offset);
        self
    }

    #[must_use]
    pub fn group<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .query_mut()
            .group
            .extend(columns.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn having(mut self, condition: impl Into<Where>) -> Self {
        self.state.query_mut().having.merge(condition);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.state
            .query_mut()
            .order
            .push((column.to_string(), direction));
        self
    }

    /// Full-text `MATCH ... AGAINST` condition (MySQL)
    #[must_use]
    pub fn matching<I, S>(mut self, columns: I, keyword: &str, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.query_mut().full_text = Some(FullText {
            columns: columns.into_iter().map(Into::into).collect(),
            keyword: keyword.to_string(),
            mode,
        });
        self
    }

    /// Fetch one row matching the accumulated filter and `lookup`; a scalar lookup filters on `id`
    pub fn get(&mut self, lookup: impl Into<Lookup>) -> Result<Option<DatabaseRow>> {
        self.get_by(lookup, DEFAULT_ID_FIELD)
    }

    /// Fetch one row; a scalar lookup filters on `id_field`
    pub fn get_by(&mut self, lookup: impl Into<Lookup>, id_field: &str) -> Result<Option<DatabaseRow>> {
        let query = self.query_with(lookup.into().into_where(id_field));
        let row = self.driver.get(&query)?;
        self.result_set = row.clone().map(ResultSet::Row);
        Ok(row)
    }

    /// Fetch the first row matching the accumulated filter
    pub fn first(&mut self) -> Result<Option<DatabaseRow>> {
        self.get(Lookup::Accumulated)
    }

    /// Fetch every matching row, in driver order
    pub fn all(&mut self) -> Result<DatabaseResult> {
        let rows = self.driver.select(self.state.query())?;
        self.result_set = Some(ResultSet::Rows(rows.clone()));
        Ok(rows)
    }

    /// Stream every matching row to `on_row` without buffering; returns the row count
    pub fn all_with<F>(&mut self, mut on_row: F) -> Result<usize>
    where
        F: FnMut(DatabaseRow) -> Result<()>,
    {
        self.result_set = None;
        self.driver.select_each(self.state.query(), &mut on_row)
    }

    /// Check whether a matching row exists; a scalar lookup filters on `id`
    pub fn has(&mut self, lookup: impl Into<Lookup>) -> Result<bool> {
        self.state.guard(Operation::Has)?;
        let query = self.query_with(lookup.into().into_where(DEFAULT_ID_FIELD));
        self.driver.has(&query)
    }

    /// Fetch `limit` random rows
    ///
    /// A window set earlier with `limit()`/`start_at()` takes precedence. When
    /// the effective count is 0 or 1 a single record is returned.
    pub fn random(&mut self, limit: u64) -> Result<ResultSet> {
        self.random_where(limit, Where::new())
    }

    /// [`random`](Self::random) with an extra filter
    pub fn random_where(&mut self, limit: u64, filter: impl Into<Where>) -> Result<ResultSet> {
        self.state.guard(Operation::Random)?;
        let mut query = self.query_with(filter.into());
        let window = *query.limit.get_or_insert(Limit {
            count: limit.max(1),
            offset: 0,
        });
        let rows = self.driver.rand(&query)?;

        let set = if window.count <= 1 {
            match rows.into_iter().next() {
                Some(row) => ResultSet::Row(row),
                None => ResultSet::Rows(Vec::new()),
            }
        } else {
            ResultSet::Rows(rows)
        };
        self.result_set = Some(set.clone());
        Ok(set)
    }

    /// Insert a row and return it as stored (defaults and generated id included)
    pub fn save(&mut self, data: impl Into<Assignments>) -> Result<DatabaseRow> {
        self.save_by(data, DEFAULT_ID_FIELD)
    }

    /// [`save`](Self::save) for tables whose generated key is `id_field`
    pub fn save_by(&mut self, data: impl Into<Assignments>, id_field: &str) -> Result<DatabaseRow> {
        self.state.guard(Operation::Save)?;
        let table = self.state.table().name.clone();
        self.driver.insert(&table, &data.into())?;
        let id = self.driver.last_insert_id()?;

        let mut query = SelectQuery::new(self.state.table().clone());
        query.columns = self.state.query().columns.clone();
        query
            .conditions
            .insert(Predicate::compare(id_field, Operator::Eq, id.clone()));

        let row = self.driver.get(&query)?.ok_or_else(|| PormError::RowNotFound {
            table,
            column: id_field.to_string(),
            value: id.to_string(),
        })?;
        self.result_set = Some(ResultSet::Row(row.clone()));
        Ok(row)
    }

    /// Update rows matching the accumulated filter plus `lookup`; returns the affected count
    pub fn update(&mut self, data: impl Into<Assignments>, lookup: impl Into<Lookup>) -> Result<u64> {
        self.update_by(data, lookup, DEFAULT_ID_FIELD)
    }

    /// [`update`](Self::update) with a scalar lookup on `id_field`
    pub fn update_by(
        &mut self,
        data: impl Into<Assignments>,
        lookup: impl Into<Lookup>,
        id_field: &str,
    ) -> Result<u64> {
        self.state.guard(Operation::Update)?;
        let conditions = self.conditions_with(lookup.into().into_where(id_field));
        self.driver
            .update(&self.state.table().name, &data.into(), &conditions)
    }

    /// Delete at most one matching row
    pub fn delete_one(&mut self, lookup: impl Into<Lookup>) -> Result<u64> {
        self.state.guard(Operation::DeleteOne)?;
        let conditions = self.conditions_with(lookup.into().into_where(DEFAULT_ID_FIELD));
        self.driver.delete(&self.state.table().name, &conditions, true)
    }

    /// Delete every matching row
    pub fn delete_all(&mut self, filter: impl Into<Where>) -> Result<u64> {
        self.state.guard(Operation::DeleteAll)?;
        let conditions = self.conditions_with(filter.into());
        self.driver.delete(&self.state.table().name, &conditions, false)
    }

    /// Delete the rows whose `id_field` equals `id`
    pub fn delete_by_id(&mut self, id: impl Into<DatabaseValue>, id_field: &str) -> Result<u64> {
        self.state.guard(Operation::DeleteById)?;
        let conditions =
            self.conditions_with(Predicate::compare(id_field, Operator::Eq, id.into()).into());
        self.driver.delete(&self.state.table().name, &conditions, false)
    }

    /// Last result as an application type; `None` when there is no result
    pub fn as_object<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.state.guard(Operation::AsObject)?;
        self.result_set
            .as_ref()
            .map(|set| set.deserialize::<T>())
            .transpose()
    }

    /// Last result as JSON; `None` when there is no result or it is empty
    pub fn as_json(&self) -> Result<Option<String>> {
        self.state.guard(Operation::AsJson)?;
        match &self.result_set {
            Some(set) if !set.is_empty() => set.to_json().map(Some),
            _ => Ok(None),
        }
    }

    /// Last materialized result
    pub fn result_set(&self) -> Option<&ResultSet> {
        self.result_set.as_ref()
    }

    /// Build a raw SQL fragment for use in filters, assignments or columns
    pub fn raw<K, V>(&self, sql: &str, params: impl IntoIterator<Item = (K, V)>) -> Result<RawSql>
    where
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        self.state.guard(Operation::Raw)?;
        Ok(RawSql::with_params(sql, params))
    }

    /// Run `f` in a transaction
    ///
    /// The transaction is opened on the builder's connection. Named
    /// connections are shared per [`Porm`](crate::Porm), so statements issued
    /// by other builders on the same connection while `f` runs are part of
    /// the transaction too. The builder uses the guard's handle while `f` runs
    /// and its previous handle afterwards, whatever `f` returned.
    /// Commits on `Ok`, rolls back on `Err`.
    pub fn in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let guard = TransactionGuard::begin(Arc::clone(&self.driver))?;
        let previous = std::mem::replace(&mut self.driver, guard.driver());
        let outcome = f(self);
        self.driver = previous;

        match outcome {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = guard.rollback() {
                    error!(table = %self.state.table(), error = %rollback_error, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn info(&self) -> DriverInfo {
        self.driver.info()
    }

    pub fn logs(&self) -> Vec<QueryLogEntry> {
        self.driver.logs()
    }

    pub fn last_query(&self) -> Option<String> {
        self.driver.last_query()
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    fn query_with(&self, extra: Where) -> SelectQuery {
        let mut query = self.state.query().clone();
        query.conditions = self.conditions_with(extra);
        query
    }

    /// Accumulated conditions ANDed with a per-call lookup
    ///
    /// The lookup goes in as its own group, so it can narrow the chain's
    /// filter but never replace an entry of it.
    fn conditions_with(&self, extra: Where) -> Where {
        let mut conditions = self.state.query().conditions.clone();
        if !extra.is_empty() {
            conditions.insert(extra.into_group(Conjunction::And, Some(LOOKUP_LABEL.to_string())));
        }
        conditions
    }
}

impl Aggregates for QueryBuilder {
    fn aggregate(&mut self, func: AggregateFn, column: Option<&str>, filter: Where) -> Result<DatabaseValue> {
        let query = self.query_with(filter);
        self.driver.aggregate(&query, func.as_sql(), column)
    }
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("driver", &self.driver.database_type())
            .field("state", &self.state)
            .field("result_set", &self.result_set)
            .finish()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::agg;
    use crate::core::porm::Porm;

    fn porm() -> Porm {
        let driver: Arc<dyn Driver> = Arc::new(crate::backends::SqliteDriver::in_memory().unwrap());
        driver
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        Porm::with_driver(driver)
    }

    #[test]
    fn test_filter_mode_blocks_terminal_mutations() {
        let porm = porm();
        let mut b = porm.from("users").unwrap().filter(agg::eq("age", 1)).unwrap();
        assert!(b.has(1).is_err());
        assert!(b.save([("name", "x")]).is_err());
        assert!(b.raw("SELECT 1", Vec::<(String, i32)>::new()).is_err());
        assert!(b.all().is_ok());
        assert!(b.count().is_ok());
    }

    #[test]
    fn test_join_rules() {
        let porm = porm();
        let err = porm
            .from("users")
            .unwrap()
            .join("INNER", "users", "id", None)
            .unwrap_err();
        assert!(matches!(err, PormError::InvalidJoin(_)));

        let err = porm
            .from("users")
            .unwrap()
            .join("OUTER-ish", "posts", "id", None)
            .unwrap_err();
        assert!(matches!(err, PormError::InvalidJoin(_)));

        let b = porm
            .from("users")
            .unwrap()
            .join("INNER", "users", [("id", "id")], Some("u2"))
            .unwrap()
            .left_join("posts", "id", None)
            .unwrap();
        assert_eq!(b.state().query().joins.len(), 2);
        assert!(b.filter(agg::eq("id", 1)).is_err());
    }

    #[test]
    fn test_in_transaction_spans_shared_connection() {
        let porm = porm();
        let mut b = porm.from("users").unwrap();
        let mut other = porm.from("users").unwrap();
        let before = b.driver();

        let result: Result<()> = b.in_transaction(|tx| {
            tx.save([("name", "temp")])?;
            assert!(tx.driver().in_transaction());
            assert_eq!(other.count()?, 1);
            Err(PormError::query("abort"))
        });
        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &b.driver()));
        assert!(!b.driver().in_transaction());
        assert_eq!(other.count().unwrap(), 0);
    }

    #[test]
    fn test_lookup_narrows_accumulated_filter() {
        let porm = porm();
        let mut seed = porm.from("users").unwrap();
        seed.save([("name", "a")]).unwrap();
        seed.save([("name", "b")]).unwrap();

        let mut b = porm.from("users").unwrap().and_where(agg::eq("id", 1));
        assert!(b.get(2).unwrap().is_none());
        assert!(b.get(1).unwrap().is_some());
        assert!(!b.has(2).unwrap());
        assert_eq!(b.update([("age", 5)], 2).unwrap(), 0);
        assert_eq!(b.delete_by_id(2, "id").unwrap(), 0);
        assert_eq!(porm.from("users").unwrap().count().unwrap(), 2);
    }
}
