//! Predicate, assignment and column helpers
//!
//! Small pure functions that build one fragment each. Comparisons return a
//! [`Predicate`], update helpers return an [`Assignment`], and the aggregate
//! helpers return a select [`Column`] expression.
//!
//! ```
//! use porm::agg;
//!
//! let adults = agg::gte("age", 18);
//! let bump = agg::plus("visits", 1);
//! let total = agg::sum("total", "price");
//! # let _ = (adults, bump, total);
//! ```

use super::predicate::{AssignOp, Assignment, Operand, Operator, Predicate};
use super::raw::RawSql;
use super::render::Column;
use super::value::DatabaseValue;

/// `column = value` (`NULL` becomes `IS NULL`)
pub fn eq(column: &str, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::from_pair(column, value.into())
}

/// `column != value` (`NULL` becomes `IS NOT NULL`)
pub fn neq(column: &str, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::from_pair(&format!("{column}[!]"), value.into())
}

pub fn lt(column: &str, value: impl Into<Operand>) -> Predicate {
    Predicate::compare(column, Operator::Lt, value)
}

pub fn lte(column: &str, value: impl Into<Operand>) -> Predicate {
    Predicate::compare(column, Operator::Le, value)
}

pub fn gt(column: &str, value: impl Into<Operand>) -> Predicate {
    Predicate::compare(column, Operator::Gt, value)
}

pub fn gte(column: &str, value: impl Into<Operand>) -> Predicate {
    Predicate::compare(column, Operator::Ge, value)
}

/// `column LIKE pattern`; a pattern without `%` or `_` matches anywhere in the value
pub fn like(column: &str, pattern: impl Into<String>) -> Predicate {
    Predicate::compare(column, Operator::Like, pattern.into())
}

pub fn not_like(column: &str, pattern: impl Into<String>) -> Predicate {
    Predicate::compare(column, Operator::NotLike, pattern.into())
}

/// `column BETWEEN low AND high`
pub fn between(
    column: &str,
    low: impl Into<DatabaseValue>,
    high: impl Into<DatabaseValue>,
) -> Predicate {
    Predicate::Between {
        column: column.to_string(),
        low: low.into(),
        high: high.into(),
        negated: false,
    }
}

/// `column IN (...)`
pub fn in_list<V: Into<DatabaseValue>>(column: &str, values: impl IntoIterator<Item = V>) -> Predicate {
    Predicate::In {
        column: column.to_string(),
        values: values.into_iter().map(Into::into).collect(),
        negated: false,
    }
}

pub fn is_null(column: &str) -> Predicate {
    Predicate::IsNull {
        column: column.to_string(),
        negated: false,
    }
}

/// `column = value`
pub fn set(column: &str, value: impl Into<Operand>) -> Assignment {
    Assignment::new(column, AssignOp::Set, value)
}

/// `column = column + value`
pub fn plus(column: &str, value: impl Into<Operand>) -> Assignment {
    Assignment::new(column, AssignOp::Add, value)
}

/// `column = column - value`
pub fn minus(column: &str, value: impl Into<Operand>) -> Assignment {
    Assignment::new(column, AssignOp::Subtract, value)
}

/// `column = column * value`
pub fn of(column: &str, value: impl Into<Operand>) -> Assignment {
    Assignment::new(column, AssignOp::Multiply, value)
}

/// `column = column / value`
pub fn div(column: &str, value: impl Into<Operand>) -> Assignment {
    Assignment::new(column, AssignOp::Divide, value)
}

/// Store `value` as JSON text
pub fn jsonified(column: &str, value: impl Into<DatabaseValue>) -> Assignment {
    Assignment::new(column, AssignOp::Json, value.into())
}

/// `column = CURRENT_TIMESTAMP`
pub fn now(column: &str) -> Assignment {
    Assignment::new(column, AssignOp::Set, RawSql::new("CURRENT_TIMESTAMP"))
}

/// `SUM(column) AS alias`
pub fn sum(alias: &str, column: &str) -> Column {
    aggregate_column(alias, "SUM", column)
}

/// `AVG(column) AS alias`
pub fn avg(alias: &str, column: &str) -> Column {
    aggregate_column(alias, "AVG", column)
}

/// `MIN(column) AS alias`
pub fn min(alias: &str, column: &str) -> Column {
    aggregate_column(alias, "MIN", column)
}

/// `MAX(column) AS alias`
pub fn max(alias: &str, column: &str) -> Column {
    aggregate_column(alias, "MAX", column)
}

fn aggregate_column(alias: &str, func: &str, column: &str) -> Column {
    Column::expr(alias, RawSql::new(format!("{func}(<{column}>)")))
}

/// Raw SQL fragment with named parameters
pub fn raw<K, V>(sql: &str, params: impl IntoIterator<Item = (K, V)>) -> RawSql
where
    K: Into<String>,
    V: Into<DatabaseValue>,
{
    RawSql::with_params(sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_keys() {
        assert_eq!(eq("age", 10).key(), "age");
        assert_eq!(neq("age", 10).key(), "age[!]");
        assert_eq!(lt("age", 10).key(), "age[<]");
        assert_eq!(lte("age", 10).key(), "age[<=]");
        assert_eq!(gt("age", 10).key(), "age[>]");
        assert_eq!(gte("age", 10).key(), "age[>=]");
        assert_eq!(like("name", "jo").key(), "name[~]");
        assert_eq!(between("age", 1, 5).key(), "age[<>]");
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        assert!(matches!(
            eq("deleted_at", DatabaseValue::Null),
            Predicate::IsNull { negated: false, .. }
        ));
        assert!(matches!(
            neq("deleted_at", DatabaseValue::Null),
            Predicate::IsNull { negated: true, .. }
        ));
    }

    #[test]
    fn test_assignment_helpers() {
        assert_eq!(plus("views", 1).key(), "views[+]");
        assert_eq!(minus("stock", 2).key(), "stock[-]");
        assert_eq!(of("price", 3).key(), "price[*]");
        assert_eq!(div("price", 4).key(), "price[/]");
        assert_eq!(jsonified("tags", DatabaseValue::Null).key(), "tags[JSON]");
        assert!(matches!(now("updated_at").value, Operand::Raw(_)));
    }

    #[test]
    fn test_aggregate_columns() {
        let column = sum("total", "price");
        assert_eq!(column.alias(), Some("total"));
    }
}
