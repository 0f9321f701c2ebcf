//! Per-chain query state and the call guard
//!
//! A chain starts in [`Mode::Normal`]. `filter()` or `join()` moves it to
//! [`Mode::FilterOnly`], which is never left again. `columns()` additionally
//! locks out `raw()` and `has()`. All of these rules are checked in one place,
//! [`QueryState::guard`].

use super::error::{PormError, Result};
use super::render::{Limit, SelectQuery, TableRef};
use tracing::{debug, trace};

/// Row count used when only an offset was given
pub const UNBOUNDED_LIMIT: u64 = 100_000_000;

/// What moved the chain into filter-only mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEntry {
    Filter,
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    FilterOnly(FilterEntry),
}

/// Builder calls that are subject to the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Columns,
    Using,
    Filter,
    Join,
    Has,
    Random,
    Save,
    Update,
    DeleteOne,
    DeleteAll,
    DeleteById,
    AsObject,
    AsJson,
    Raw,
}

impl Operation {
    /// Public method name, used in error messages
    pub fn method(&self) -> &'static str {
        match self {
            Operation::Columns => "columns",
            Operation::Using => "using",
            Operation::Filter => "filter",
            Operation::Join => "join",
            Operation::Has => "has",
            Operation::Random => "random",
            Operation::Save => "save",
            Operation::Update => "update",
            Operation::DeleteOne => "delete_one",
            Operation::DeleteAll => "delete_all",
            Operation::DeleteById => "delete_by_id",
            Operation::AsObject => "as_object",
            Operation::AsJson => "as_json",
            Operation::Raw => "raw",
        }
    }
}

/// Accumulated state of one builder chain
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    query: SelectQuery,
    mode: Mode,
    raw_locked: bool,
    has_locked: bool,
    limit_set: bool,
}

impl QueryState {
    pub fn new(table: TableRef) -> Self {
        Self {
            query: SelectQuery::new(table),
            mode: Mode::Normal,
            raw_locked: false,
            has_locked: false,
            limit_set: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn table(&self) -> &TableRef {
        &self.query.table
    }

    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut SelectQuery {
        &mut self.query
    }

    /// Fail fast if `op` is illegal right now
    pub fn guard(&self, op: Operation) -> Result<()> {
        let reason = match (op, self.mode) {
            (Operation::Raw, _) if self.raw_locked => {
                Some("raw queries are disabled once columns() has been called")
            }
            (Operation::Has, _) if self.has_locked => {
                Some("existence checks are disabled once columns() has been called")
            }
            (Operation::Join, Mode::FilterOnly(FilterEntry::Join)) => None,
            (Operation::Join, Mode::FilterOnly(FilterEntry::Filter)) => {
                Some("joins must be added before filter() is called")
            }
            (_, Mode::FilterOnly(_)) => Some("the query is in filter-only mode"),
            (_, Mode::Normal) => None,
        };

        match reason {
            Some(reason) => {
                let table = self.query.table.to_string();
                debug!(method = op.method(), table = %table, reason, "builder call rejected");
                Err(PormError::mode_violation(op.method(), table, reason))
            }
            None => Ok(()),
        }
    }

    /// Switch to filter-only mode (one way)
    pub fn enter_filter_only(&mut self, entry: FilterEntry) {
        if self.mode == Mode::Normal {
            trace!(table = %self.query.table, ?entry, "entering filter-only mode");
            self.mode = Mode::FilterOnly(entry);
        }
    }

    /// Lock out `raw()` and `has()` for the rest of the chain
    pub fn lock_after_columns(&mut self) {
        self.raw_locked = true;
        self.has_locked = true;
    }

    /// Replace the table reference
    pub fn set_table(&mut self, table: TableRef) {
        self.query.table = table;
    }

    /// Set the row count; allowed once per chain, an earlier offset is kept
    pub fn set_limit(&mut self, count: u64) -> Result<()> {
        if self.limit_set {
            let table = self.query.table.to_string();
            debug!(table = %table, "limit() called twice");
            return Err(PormError::LimitAlreadySet { table });
        }
        self.limit_set = true;
        let offset = self.query.limit.map_or(0, |l| l.offset);
        self.query.limit = Some(Limit { count, offset });
        Ok(())
    }

    /// Set the offset; without a prior limit the count is unbounded
    pub fn set_offset(&mut self, offset: u64) {
        let count = self.query.limit.map_or(UNBOUNDED_LIMIT, |l| l.count);
        self.query.limit = Some(Limit { count, offset });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> QueryState {
        QueryState::new(TableRef::new("users", None))
    }

    #[test]
    fn test_filter_only_is_one_way() {
        let mut s = state();
        assert!(s.guard(Operation::Has).is_ok());
        s.enter_filter_only(FilterEntry::Filter);
        s.enter_filter_only(FilterEntry::Join);
        assert_eq!(s.mode(), Mode::FilterOnly(FilterEntry::Filter));

        for op in [
            Operation::Has,
            Operation::Random,
            Operation::Save,
            Operation::AsJson,
            Operation::AsObject,
            Operation::Raw,
            Operation::Columns,
            Operation::Join,
        ] {
            assert!(matches!(s.guard(op), Err(PormError::ModeViolation { .. })), "{op:?}");
        }
    }

    #[test]
    fn test_join_after_join_is_allowed() {
        let mut s = state();
        s.enter_filter_only(FilterEntry::Join);
        assert!(s.guard(Operation::Join).is_ok());
        assert!(s.guard(Operation::Filter).is_err());
    }

    #[test]
    fn test_columns_locks_raw_and_has() {
        let mut s = state();
        s.lock_after_columns();
        assert!(s.guard(Operation::Raw).is_err());
        let err = s.guard(Operation::Has).unwrap_err();
        assert!(err.to_string().contains("`has()`"));
        assert!(err.to_string().contains("`users`"));
        assert!(s.guard(Operation::Save).is_ok());
    }

    #[test]
    fn test_limit_window() {
        let mut s = state();
        s.set_offset(2);
        assert_eq!(
            s.query().limit,
            Some(Limit {
                count: UNBOUNDED_LIMIT,
                offset: 2
            })
        );
        s.set_limit(10).unwrap();
        assert_eq!(s.query().limit, Some(Limit { count: 10, offset: 2 }));
        assert!(matches!(
            s.set_limit(5),
            Err(PormError::LimitAlreadySet { .. })
        ));
    }
}
