//! Aggregate operations
//!
//! Implementors supply [`Aggregates::aggregate`]; `count`, `sum`, `avg`, `min`
//! and `max` (plus their `_where` variants) come for free.

use super::error::Result;
use super::predicate::Where;
use super::value::DatabaseValue;

/// SQL aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

/// Aggregates over the rows a query matches
pub trait Aggregates {
    /// Run `func` over `column` (all rows for `None`) with `filter` added to the accumulated filter
    fn aggregate(&mut self, func: AggregateFn, column: Option<&str>, filter: Where) -> Result<DatabaseValue>;

    /// Number of matching rows
    fn count(&mut self) -> Result<u64> {
        let value = self.aggregate(AggregateFn::Count, None, Where::new())?;
        Ok(value.as_long().map_or(0, |n| n.max(0) as u64))
    }

    /// Number of matching rows (non-null `column` values when given) under an extra filter
    fn count_where(&mut self, column: Option<&str>, filter: impl Into<Where>) -> Result<u64>
    where
        Self: Sized,
    {
        let value = self.aggregate(AggregateFn::Count, column, filter.into())?;
        Ok(value.as_long().map_or(0, |n| n.max(0) as u64))
    }

    fn sum(&mut self, column: &str) -> Result<Option<DatabaseValue>> {
        non_null(self.aggregate(AggregateFn::Sum, Some(column), Where::new()))
    }

    fn sum_where(&mut self, column: &str, filter: impl Into<Where>) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        non_null(self.aggregate(AggregateFn::Sum, Some(column), filter.into()))
    }

    fn avg(&mut self, column: &str) -> Result<Option<DatabaseValue>> {
        non_null(self.aggregate(AggregateFn::Avg, Some(column), Where::new()))
    }

    fn avg_where(&mut self, column: &str, filter: impl Into<Where>) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        non_null(self.aggregate(AggregateFn::Avg, Some(column), filter.into()))
    }

    fn min(&mut self, column: &str) -> Result<Option<DatabaseValue>> {
        non_null(self.aggregate(AggregateFn::Min, Some(column), Where::new()))
    }

    fn min_where(&mut self, column: &str, filter: impl Into<Where>) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        non_null(self.aggregate(AggregateFn::Min, Some(column), filter.into()))
    }

    fn max(&mut self, column: &str) -> Result<Option<DatabaseValue>> {
        non_null(self.aggregate(AggregateFn::Max, Some(column), Where::new()))
    }

    fn max_where(&mut self, column: &str, filter: impl Into<Where>) -> Result<Option<DatabaseValue>>
    where
        Self: Sized,
    {
        non_null(self.aggregate(AggregateFn::Max, Some(column), filter.into()))
    }
}

fn non_null(value: Result<DatabaseValue>) -> Result<Option<DatabaseValue>> {
    value.map(|v| if v.is_null() { None } else { Some(v) })
}
