//! # porm
//!
//! A fluent, table-scoped query builder over a SQL driver. A chain starts at a
//! table, accumulates filters, joins, columns and a row window, and ends in a
//! terminal call that reads, writes or aggregates rows.
//!
//! ## Features
//!
//! - **Typed conditions**: predicates and assignments are values, with
//!   `column[op]` keys accepted where a map is more convenient
//! - **Mode rules**: once a chain is narrowed with `filter()` or `join()` it
//!   only accepts calls that make sense for a filtered read
//! - **Connection resolution**: named sections from injected settings, explicit
//!   options, native handles or ready drivers
//! - **Transactions**: closure-scoped, committed on `Ok` and rolled back on `Err`
//! - **Materialization**: the last result as rows, JSON or an application type
//!
//! ## Supported Databases
//!
//! | Database | Status |
//! |----------|--------|
//! | SQLite | Implemented, bundled |
//! | PostgreSQL | SQL dialect only |
//! | MySQL | SQL dialect only |
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! porm = { version = "0.1", features = ["sqlite"] }
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use porm::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let porm = Porm::new(Settings::default());
//!     porm.raw_query(&RawSql::new("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)"), None)?;
//!
//!     let alice = porm.from("users")?.save([("name", "Alice")])?;
//!     println!("saved {:?}", alice.get("id"));
//!
//!     let adults = porm
//!         .from("users")?
//!         .filter(agg::gte("age", 18))?
//!         .limit(10)?
//!         .all()?;
//!     for row in adults {
//!         if let Some(name) = row.get("name") {
//!             println!("User: {}", name.as_string());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Working with Transactions
//!
//! ```rust,no_run
//! use porm::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let porm = Porm::new(Settings::default());
//!     let mut accounts = porm.from("accounts")?;
//!
//!     accounts.in_transaction(|tx| {
//!         tx.update([agg::minus("balance", 100)], 1)?;
//!         tx.update([agg::plus("balance", 100)], 2)?;
//!         Ok(())
//!     })?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! porm/
//! ├── src/
//! │   ├── core/               # Builder, conditions, rendering, resolution
//! │   │   ├── builder.rs      # QueryBuilder
//! │   │   ├── predicate.rs    # Where, Predicate, Assignments
//! │   │   ├── render.rs       # SQL rendering per dialect
//! │   │   ├── driver.rs       # Driver trait
//! │   │   ├── resolver.rs     # Connection resolution
//! │   │   └── ...
//! │   ├── backends/           # Driver implementations
//! │   │   └── sqlite.rs
//! │   └── lib.rs
//! ├── tests/                  # Integration and property tests
//! ├── benches/
//! └── Cargo.toml
//! ```

pub mod backends;
pub mod core;

pub use crate::core::agg;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::agg;
    pub use crate::core::{
        Aggregates, Columns, ConnectionOptions, ConnectionRef, DatabaseResult, DatabaseRow,
        DatabaseType, DatabaseValue, Driver, JoinOn, Lookup, MatchMode, OrderDirection, Porm,
        PormError, Predicate, QueryBuilder, RawSql, Result, ResultSet, Settings, TransactionGuard,
        Where, WhereBuilder,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteDriver;
}

// Re-export at root level for convenience
pub use crate::core::{
    Aggregates, Assignments, ConnectionOptions, ConnectionRef, DatabaseResult, DatabaseRow,
    DatabaseType, DatabaseValue, Driver, Lookup, Porm, PormError, Predicate, QueryBuilder, RawSql,
    Result, ResultSet, Settings, TransactionGuard, Where, WhereBuilder, VERSION,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteDriver;
