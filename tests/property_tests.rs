//! Property-based tests for conditions, rendering and builder rules using proptest

use porm::core::predicate::Operator;
use porm::core::render::{SelectQuery, TableRef};
use porm::core::state::{FilterEntry, Operation, QueryState};
use porm::prelude::*;
use proptest::prelude::*;

fn column() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,10}"
}

fn suffix() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["", "[!]", "[>]", "[>=]", "[<]", "[<=]", "[~]", "[!~]"])
}

fn guarded_operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(vec![
        Operation::Columns,
        Operation::Using,
        Operation::Filter,
        Operation::Has,
        Operation::Random,
        Operation::Save,
        Operation::Update,
        Operation::DeleteOne,
        Operation::DeleteAll,
        Operation::DeleteById,
        Operation::AsObject,
        Operation::AsJson,
        Operation::Raw,
    ])
}

// ============================================================================
// DatabaseValue Roundtrip Tests
// ============================================================================

proptest! {
    /// Test that Long values roundtrip correctly
    #[test]
    fn test_long_roundtrip(value in any::<i64>()) {
        let db_val = DatabaseValue::from(value);
        prop_assert_eq!(db_val.as_long(), Some(value));
        prop_assert_eq!(db_val.type_name(), "long");
    }

    /// Test that String values survive a JSON round trip
    #[test]
    fn test_string_json_roundtrip(value in ".*") {
        let db_val = DatabaseValue::from(value.as_str());
        let json = serde_json::to_string(&db_val).unwrap();
        let back: DatabaseValue = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.as_str(), Some(value.as_str()));
    }
}

// ============================================================================
// Condition Tests
// ============================================================================

proptest! {
    /// Suffixed keys parse into predicates that report the same key
    #[test]
    fn test_predicate_key_roundtrip(col in column(), suffix in suffix(), value in any::<i64>()) {
        let key = format!("{col}{suffix}");
        let predicate = Predicate::from_pair(&key, DatabaseValue::from(value));
        prop_assert_eq!(predicate.key(), key);
    }

    /// Merging keeps one entry per key and the last value wins
    #[test]
    fn test_where_merge_last_wins(
        entries in prop::collection::vec((prop::sample::select(vec!["a", "b", "c", "d"]), any::<i64>()), 0..20)
    ) {
        let mut filter = Where::new();
        for (col, value) in &entries {
            filter.merge(agg::eq(col, *value));
        }

        let mut distinct: Vec<&str> = entries.iter().map(|(c, _)| *c).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(filter.len(), distinct.len());

        for col in distinct {
            let last = entries.iter().rev().find(|(c, _)| *c == col).map(|(_, v)| *v).unwrap();
            prop_assert_eq!(
                filter.get(col),
                Some(&Predicate::compare(col, Operator::Eq, last))
            );
        }
    }

    /// Every rendered condition value is bound, never inlined
    #[test]
    fn test_select_binds_every_value(
        values in prop::collection::btree_map(column(), any::<i64>(), 0..8)
    ) {
        let mut query = SelectQuery::new(TableRef::new("t", None));
        for (col, value) in &values {
            query.conditions.insert(agg::eq(col, *value));
        }
        let stmt = query.select(DatabaseType::Sqlite).unwrap();
        prop_assert_eq!(stmt.params.len(), values.len());
        prop_assert_eq!(stmt.sql.matches('?').count(), values.len());
    }

    /// Quoting a dotted identifier keeps its segments
    #[test]
    fn test_quote_identifier_segments(segments in prop::collection::vec("[a-z_]{1,8}", 1..4)) {
        let ident = segments.join(".");
        for dialect in [DatabaseType::Sqlite, DatabaseType::Postgres, DatabaseType::Mysql] {
            let quoted = dialect.quote_identifier(&ident);
            let stripped: String = quoted.chars().filter(|c| *c != '"' && *c != '`').collect();
            prop_assert_eq!(stripped, ident.clone());
        }
    }

    /// Named and positional raw parameters all lower to `?`
    #[test]
    fn test_raw_lowering_binds_all(named in 0usize..6, positional in 0usize..6) {
        let mut parts: Vec<String> = (0..named).map(|i| format!(":p{i}")).collect();
        parts.extend((0..positional).map(|_| "?".to_string()));
        let mut raw = RawSql::new(parts.join(", "));
        for i in 0..named {
            raw = raw.bind(format!("p{i}"), i as i64);
        }
        for i in 0..positional {
            raw = raw.arg(i as i64);
        }

        let (sql, params) = raw.lower(DatabaseType::Sqlite).unwrap();
        prop_assert_eq!(params.len(), named + positional);
        prop_assert_eq!(sql.matches('?').count(), named + positional);
    }
}

// ============================================================================
// Builder Rule Tests
// ============================================================================

proptest! {
    /// Filter-only mode rejects every guarded operation
    #[test]
    fn test_filter_only_rejects(op in guarded_operation(), via_join in any::<bool>()) {
        let mut state = QueryState::new(TableRef::new("users", None));
        state.enter_filter_only(if via_join { FilterEntry::Join } else { FilterEntry::Filter });
        let rejected = state.guard(op);
        let is_mode_violation = matches!(rejected, Err(PormError::ModeViolation { .. }));
        prop_assert!(is_mode_violation);
    }

    /// The row window is the same whichever of limit/start_at comes first
    #[test]
    fn test_window_order_independent(count in 0u64..1000, offset in 0u64..1000) {
        let mut a = QueryState::new(TableRef::new("t", None));
        a.set_limit(count).unwrap();
        a.set_offset(offset);

        let mut b = QueryState::new(TableRef::new("t", None));
        b.set_offset(offset);
        b.set_limit(count).unwrap();

        prop_assert_eq!(a.query().limit, b.query().limit);
        prop_assert!(a.set_limit(count).is_err());
    }
}

#[cfg(feature = "sqlite")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// `eq` and `neq` on the same value partition the table
    #[test]
    fn test_eq_neq_partition(ages in prop::collection::vec(0i64..5, 1..20), probe in 0i64..5) {
        let porm = Porm::new(Settings::default());
        porm.raw_query(&RawSql::new("CREATE TABLE people (id INTEGER PRIMARY KEY, age INTEGER NOT NULL)"), None)
            .unwrap();
        for age in &ages {
            porm.from("people").unwrap().save([("age", *age)]).unwrap();
        }

        let matching = porm.from("people").unwrap().count_where(None, agg::eq("age", probe)).unwrap();
        let others = porm.from("people").unwrap().count_where(None, agg::neq("age", probe)).unwrap();
        let expected = ages.iter().filter(|a| **a == probe).count() as u64;

        prop_assert_eq!(matching, expected);
        prop_assert_eq!(matching + others, ages.len() as u64);
    }
}
