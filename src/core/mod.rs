//! Core query-builder types and traits
//!
//! This module provides the fundamental building blocks: the predicate and
//! assignment model, SQL rendering, the driver trait, connection resolution
//! and the fluent builder on top of them.

pub mod agg;
pub mod aggregate;
pub mod builder;
pub mod config;
pub mod database_types;
pub mod driver;
pub mod error;
pub mod materialize;
pub mod porm;
pub mod predicate;
pub mod raw;
pub mod render;
pub mod resolver;
pub mod state;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use aggregate::{AggregateFn, Aggregates};
pub use builder::QueryBuilder;
pub use config::{ConnectionOptions, ServerSettings, Settings, DEFAULT_CONNECTION};
pub use database_types::DatabaseType;
pub use driver::{Driver, DriverInfo, QueryLogEntry};
pub use error::{PormError, Result};
pub use materialize::{from_row, ResultSet};
pub use porm::{Porm, VERSION};
pub use predicate::{
    AssignOp, Assignment, Assignments, Conjunction, Lookup, Operand, Operator, Predicate, Where,
    WhereBuilder,
};
pub use raw::RawSql;
pub use render::{Column, Columns, JoinOn, JoinType, MatchMode, OrderDirection, TableRef};
pub use resolver::{ConnectionRef, ConnectionResolver};
pub use state::Mode;
pub use transaction::TransactionGuard;
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
