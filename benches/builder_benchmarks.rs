//! Criterion benchmarks for porm

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use porm::core::render::{SelectQuery, TableRef};
use porm::prelude::*;
use std::sync::Arc;

// ============================================================================
// Condition Building Benchmarks
// ============================================================================

fn bench_where_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("where_merge");

    for size in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let keys: Vec<String> = (0..size).map(|i| format!("col_{i}[>=]")).collect();
            b.iter(|| {
                let mut filter = Where::new();
                for (i, key) in keys.iter().enumerate() {
                    filter.merge(Predicate::from_pair(key, DatabaseValue::from(i as i64)));
                }
                black_box(filter)
            });
        });
    }

    group.finish();
}

// ============================================================================
// SQL Rendering Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    let mut query = SelectQuery::new(TableRef::new("users", Some("u".into())));
    query.conditions = Where::new()
        .and(agg::eq("u.status", "active"))
        .and(agg::gte("u.age", 18))
        .and(agg::in_list("u.role", ["admin", "staff", "guest"]))
        .and(
            WhereBuilder::or()
                .push(agg::like("u.name", "ad"))
                .push(agg::is_null("u.deleted_at")),
        );

    for dialect in [DatabaseType::Sqlite, DatabaseType::Postgres, DatabaseType::Mysql] {
        group.bench_function(dialect.to_str(), |b| {
            b.iter(|| black_box(query.select(black_box(dialect)).unwrap()));
        });
    }

    group.finish();
}

// ============================================================================
// End-to-end Builder Benchmarks
// ============================================================================

fn setup() -> Porm {
    let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::in_memory().unwrap());
    driver
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
        .unwrap();
    let porm = Porm::with_driver(driver);
    for i in 0..1000 {
        porm.from("users")
            .unwrap()
            .save([agg::set("name", format!("user_{i}")), agg::set("age", i % 90)])
            .unwrap();
    }
    porm
}

fn bench_builder(c: &mut Criterion) {
    let porm = setup();
    let mut group = c.benchmark_group("builder");

    group.bench_function("get_by_id", |b| {
        b.iter(|| black_box(porm.from("users").unwrap().get(black_box(500)).unwrap()));
    });

    group.bench_function("filter_all", |b| {
        b.iter(|| {
            black_box(
                porm.from("users")
                    .unwrap()
                    .filter(agg::eq("age", black_box(42)))
                    .unwrap()
                    .all()
                    .unwrap(),
            )
        });
    });

    group.bench_function("count", |b| {
        b.iter(|| black_box(porm.from("users").unwrap().count_where(None, agg::lt("age", 30)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_where_merge, bench_render, bench_builder);
criterion_main!(benches);
