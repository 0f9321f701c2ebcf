//! Typed predicate and assignment trees
//!
//! Filters are kept as an ordered list of [`Predicate`]s. Each predicate has a
//! key built from its column and operator (`age[>]`, `name[~]`, `AND #1`, ...),
//! and merging two filters replaces entries whose keys collide, so repeated
//! `and_where()` calls behave like a shallow map merge.
//!
//! Loosely-typed input (`[("age[>]", 18)]`) is parsed into the same tree.

use super::raw::RawSql;
use super::value::{DatabaseRow, DatabaseValue};

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Not equal to (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// LIKE pattern matching
    Like,
    /// NOT LIKE pattern matching
    NotLike,
}

impl Operator {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    /// Key suffix for this operator (`""` for equality)
    pub fn suffix(&self) -> &'static str {
        match self {
            Operator::Eq => "",
            Operator::Ne => "[!]",
            Operator::Lt => "[<]",
            Operator::Le => "[<=]",
            Operator::Gt => "[>]",
            Operator::Ge => "[>=]",
            Operator::Like => "[~]",
            Operator::NotLike => "[!~]",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "!" => Some(Operator::Ne),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "~" => Some(Operator::Like),
            "!~" => Some(Operator::NotLike),
            _ => None,
        }
    }
}

/// Right-hand side of a comparison or assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Bound parameter
    Value(DatabaseValue),
    /// Inline SQL fragment
    Raw(RawSql),
}

impl From<DatabaseValue> for Operand {
    fn from(v: DatabaseValue) -> Self {
        Operand::Value(v)
    }
}

impl From<RawSql> for Operand {
    fn from(v: RawSql) -> Self {
        Operand::Raw(v)
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Value(v.into())
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Value(v.into())
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Value(v.into())
    }
}

impl From<u32> for Operand {
    fn from(v: u32) -> Self {
        Operand::Value(v.into())
    }
}

impl From<f32> for Operand {
    fn from(v: f32) -> Self {
        Operand::Value(v.into())
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Value(v.into())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Value(v.into())
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Value(v.into())
    }
}

impl From<&String> for Operand {
    fn from(v: &String) -> Self {
        Operand::Value(v.into())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(v.into())
    }
}

/// Logical connective of a predicate group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// One node of a filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> value`
    Compare {
        column: String,
        op: Operator,
        value: Operand,
    },
    /// `column [NOT] IN (...)`; an empty list never matches
    In {
        column: String,
        values: Vec<DatabaseValue>,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    IsNull { column: String, negated: bool },
    /// `column [NOT] BETWEEN low AND high`
    Between {
        column: String,
        low: DatabaseValue,
        high: DatabaseValue,
        negated: bool,
    },
    /// Parenthesized `AND`/`OR` group
    Group {
        conjunction: Conjunction,
        label: Option<String>,
        items: Vec<Predicate>,
    },
    /// Raw SQL condition
    Raw(RawSql),
}

impl Predicate {
    /// Build a comparison predicate
    pub fn compare(column: impl Into<String>, op: Operator, value: impl Into<Operand>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse a suffixed key (`age[>=]`) and a value into a predicate
    ///
    /// A `NULL` value becomes `IS NULL`, a JSON array becomes `IN (...)`, and
    /// `[<>]` / `[><]` expect a two-element array. A scalar bound for `[<>]` is
    /// used as both ends of the range.
    pub fn from_pair(key: &str, value: DatabaseValue) -> Self {
        let (column, suffix) = split_key(key);
        match suffix {
            None => Self::matching(column, value, false),
            Some("!") => Self::matching(column, value, true),
            Some(range @ ("<>" | "><")) => {
                let negated = range == "><";
                let (low, high) = match value {
                    DatabaseValue::Json(serde_json::Value::Array(mut bounds)) if bounds.len() == 2 => {
                        let high = bounds.pop().unwrap_or_default();
                        let low = bounds.pop().unwrap_or_default();
                        (DatabaseValue::from(low), DatabaseValue::from(high))
                    }
                    other => (other.clone(), other),
                };
                Predicate::Between {
                    column: column.to_string(),
                    low,
                    high,
                    negated,
                }
            }
            Some(s) => match Operator::from_suffix(s) {
                Some(op) => Self::compare(column, op, value),
                None => Self::matching(key, value, false),
            },
        }
    }

    fn matching(column: &str, value: DatabaseValue, negated: bool) -> Self {
        match value {
            DatabaseValue::Null => Predicate::IsNull {
                column: column.to_string(),
                negated,
            },
            DatabaseValue::Json(serde_json::Value::Array(values)) => Predicate::In {
                column: column.to_string(),
                values: values.into_iter().map(DatabaseValue::from).collect(),
                negated,
            },
            other => Self::compare(
                column,
                if negated { Operator::Ne } else { Operator::Eq },
                other,
            ),
        }
    }

    /// Merge key of this predicate
    pub fn key(&self) -> String {
        match self {
            Predicate::Compare { column, op, .. } => format!("{column}{}", op.suffix()),
            Predicate::In {
                column, negated, ..
            }
            | Predicate::IsNull { column, negated } => {
                if *negated {
                    format!("{column}[!]")
                } else {
                    column.clone()
                }
            }
            Predicate::Between {
                column, negated, ..
            } => {
                if *negated {
                    format!("{column}[><]")
                } else {
                    format!("{column}[<>]")
                }
            }
            Predicate::Group {
                conjunction, label, ..
            } => group_key(*conjunction, label.as_deref()),
            Predicate::Raw(raw) => raw.sql().to_string(),
        }
    }
}

fn split_key(key: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = key.strip_suffix(']') {
        if let Some(open) = stripped.rfind('[') {
            return (&key[..open], Some(&stripped[open + 1..]));
        }
    }
    (key, None)
}

impl From<RawSql> for Predicate {
    fn from(raw: RawSql) -> Self {
        Predicate::Raw(raw)
    }
}

/// Ordered filter; entries with the same key replace each other on merge
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Where(Vec<Predicate>);

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.0
    }

    /// Look up an entry by merge key
    pub fn get(&self, key: &str) -> Option<&Predicate> {
        self.0.iter().find(|p| p.key() == key)
    }

    /// Insert a predicate; an entry with the same key is replaced in place
    pub fn insert(&mut self, predicate: Predicate) {
        let key = predicate.key();
        match self.0.iter_mut().find(|p| p.key() == key) {
            Some(slot) => *slot = predicate,
            None => self.0.push(predicate),
        }
    }

    /// Shallow-merge another filter into this one (last assignment wins)
    pub fn merge(&mut self, other: impl Into<Where>) {
        for predicate in other.into().0 {
            self.insert(predicate);
        }
    }

    /// Add a predicate
    #[must_use]
    pub fn and(mut self, predicate: impl Into<Predicate>) -> Self {
        self.insert(predicate.into());
        self
    }

    /// Wrap the entries into one labelled group
    pub fn into_group(self, conjunction: Conjunction, label: Option<String>) -> Predicate {
        Predicate::Group {
            conjunction,
            label,
            items: self.0,
        }
    }
}

impl From<Predicate> for Where {
    fn from(p: Predicate) -> Self {
        Where(vec![p])
    }
}

impl From<Vec<Predicate>> for Where {
    fn from(predicates: Vec<Predicate>) -> Self {
        let mut w = Where::new();
        for p in predicates {
            w.insert(p);
        }
        w
    }
}

impl<const N: usize> From<[Predicate; N]> for Where {
    fn from(predicates: [Predicate; N]) -> Self {
        Where::from(Vec::from(predicates))
    }
}

impl<K: AsRef<str>, V: Into<DatabaseValue>, const N: usize> From<[(K, V); N]> for Where {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| Predicate::from_pair(k.as_ref(), v.into()))
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<DatabaseRow> for Where {
    fn from(row: DatabaseRow) -> Self {
        row.into_iter()
            .map(|(k, v)| Predicate::from_pair(&k, v))
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<RawSql> for Where {
    fn from(raw: RawSql) -> Self {
        Where(vec![Predicate::Raw(raw)])
    }
}

impl From<WhereBuilder> for Where {
    fn from(builder: WhereBuilder) -> Self {
        match builder.conjunction {
            Conjunction::And => builder.items,
            Conjunction::Or => Where(vec![builder.build()]),
        }
    }
}

/// Builder for nested `AND` / `OR` groups
///
/// ```
/// use porm::{agg, WhereBuilder};
///
/// let adults_or_staff = WhereBuilder::or()
///     .push(agg::gte("age", 18))
///     .push(agg::eq("role", "staff"));
/// let filter = WhereBuilder::and()
///     .push(agg::eq("active", true))
///     .push(adults_or_staff);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WhereBuilder {
    conjunction: Conjunction,
    items: Where,
    next_label: usize,
}

impl WhereBuilder {
    /// Start an `AND` group
    pub fn and() -> Self {
        Self::new(Conjunction::And)
    }

    /// Start an `OR` group
    pub fn or() -> Self {
        Self::new(Conjunction::Or)
    }

    fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            items: Where::new(),
            next_label: 1,
        }
    }

    /// Add a predicate or a nested group
    ///
    /// Nested groups whose key is already taken get a `#n` label so both survive.
    #[must_use]
    pub fn push(mut self, predicate: impl Into<Predicate>) -> Self {
        let mut predicate = predicate.into();
        if let Predicate::Group {
            conjunction, label, ..
        } = &mut predicate
        {
            while self.items.get(&group_key(*conjunction, label.as_deref())).is_some() {
                *label = Some(format!("#{}", self.next_label));
                self.next_label += 1;
            }
        }
        self.items.insert(predicate);
        self
    }

    /// Add a loosely-typed `key => value` condition
    #[must_use]
    pub fn pair(self, key: &str, value: impl Into<DatabaseValue>) -> Self {
        self.push(Predicate::from_pair(key, value.into()))
    }

    /// Finish the group
    pub fn build(self) -> Predicate {
        self.items.into_group(self.conjunction, None)
    }
}

fn group_key(conjunction: Conjunction, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{} {label}", conjunction.as_sql()),
        None => conjunction.as_sql().to_string(),
    }
}

impl From<WhereBuilder> for Predicate {
    fn from(builder: WhereBuilder) -> Self {
        builder.build()
    }
}

/// Row selector for single-row operations
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Lookup {
    /// Use only what the chain accumulated
    #[default]
    Accumulated,
    /// Equality on the id column
    Id(DatabaseValue),
    /// Extra filter merged into the accumulated one
    Where(Where),
}

impl From<()> for Lookup {
    fn from(_: ()) -> Self {
        Lookup::Accumulated
    }
}

impl From<i32> for Lookup {
    fn from(id: i32) -> Self {
        Lookup::Id(id.into())
    }
}

impl From<i64> for Lookup {
    fn from(id: i64) -> Self {
        Lookup::Id(id.into())
    }
}

impl From<u32> for Lookup {
    fn from(id: u32) -> Self {
        Lookup::Id(id.into())
    }
}

impl From<&str> for Lookup {
    fn from(id: &str) -> Self {
        Lookup::Id(id.into())
    }
}

impl From<String> for Lookup {
    fn from(id: String) -> Self {
        Lookup::Id(id.into())
    }
}

impl From<DatabaseValue> for Lookup {
    fn from(id: DatabaseValue) -> Self {
        match id {
            DatabaseValue::Null => Lookup::Accumulated,
            other => Lookup::Id(other),
        }
    }
}

impl From<Where> for Lookup {
    fn from(w: Where) -> Self {
        Lookup::Where(w)
    }
}

impl From<Predicate> for Lookup {
    fn from(p: Predicate) -> Self {
        Lookup::Where(p.into())
    }
}

impl From<Vec<Predicate>> for Lookup {
    fn from(p: Vec<Predicate>) -> Self {
        Lookup::Where(p.into())
    }
}

impl<const N: usize> From<[Predicate; N]> for Lookup {
    fn from(p: [Predicate; N]) -> Self {
        Lookup::Where(p.into())
    }
}

impl<K: AsRef<str>, V: Into<DatabaseValue>, const N: usize> From<[(K, V); N]> for Lookup {
    fn from(pairs: [(K, V); N]) -> Self {
        Lookup::Where(pairs.into())
    }
}

impl From<WhereBuilder> for Lookup {
    fn from(b: WhereBuilder) -> Self {
        Lookup::Where(b.into())
    }
}

impl From<DatabaseRow> for Lookup {
    fn from(row: DatabaseRow) -> Self {
        Lookup::Where(row.into())
    }
}

impl<T: Into<Lookup>> From<Option<T>> for Lookup {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

impl Lookup {
    /// Resolve into a filter, using `id_field` for scalar ids
    pub fn into_where(self, id_field: &str) -> Where {
        match self {
            Lookup::Accumulated => Where::new(),
            Lookup::Id(id) => Predicate::compare(id_field, Operator::Eq, id).into(),
            Lookup::Where(w) => w,
        }
    }
}

/// How an assignment combines with the current column value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `col = value`
    Set,
    /// `col = col + value`
    Add,
    /// `col = col - value`
    Subtract,
    /// `col = col * value`
    Multiply,
    /// `col = col / value`
    Divide,
    /// `col = <value encoded as JSON text>`
    Json,
}

impl AssignOp {
    /// Key suffix for this operation
    pub fn suffix(&self) -> &'static str {
        match self {
            AssignOp::Set => "",
            AssignOp::Add => "[+]",
            AssignOp::Subtract => "[-]",
            AssignOp::Multiply => "[*]",
            AssignOp::Divide => "[/]",
            AssignOp::Json => "[JSON]",
        }
    }

    pub(crate) fn arithmetic_sql(&self) -> Option<&'static str> {
        match self {
            AssignOp::Add => Some("+"),
            AssignOp::Subtract => Some("-"),
            AssignOp::Multiply => Some("*"),
            AssignOp::Divide => Some("/"),
            AssignOp::Set | AssignOp::Json => None,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "+" => Some(AssignOp::Add),
            "-" => Some(AssignOp::Subtract),
            "*" => Some(AssignOp::Multiply),
            "/" => Some(AssignOp::Divide),
            "JSON" => Some(AssignOp::Json),
            _ => None,
        }
    }
}

/// Column assignment for inserts and updates
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub op: AssignOp,
    pub value: Operand,
}

impl Assignment {
    pub fn new(column: impl Into<String>, op: AssignOp, value: impl Into<Operand>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse a suffixed key (`views[+]`) and a value
    pub fn from_pair(key: &str, value: DatabaseValue) -> Self {
        match split_key(key) {
            (column, Some(suffix)) => match AssignOp::from_suffix(suffix) {
                Some(op) => Self::new(column, op, value),
                None => Self::new(key, AssignOp::Set, value),
            },
            (column, None) => Self::new(column, AssignOp::Set, value),
        }
    }

    pub fn key(&self) -> String {
        format!("{}{}", self.column, self.op.suffix())
    }
}

/// Ordered set of assignments; one per column, last assignment wins
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignments(Vec<Assignment>);

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Assignment> {
        self.0.iter()
    }

    pub fn insert(&mut self, assignment: Assignment) {
        match self.0.iter_mut().find(|a| a.column == assignment.column) {
            Some(slot) => *slot = assignment,
            None => self.0.push(assignment),
        }
    }

    /// Add an assignment
    #[must_use]
    pub fn with(mut self, assignment: Assignment) -> Self {
        self.insert(assignment);
        self
    }
}

impl From<Assignment> for Assignments {
    fn from(a: Assignment) -> Self {
        Assignments(vec![a])
    }
}

impl From<Vec<Assignment>> for Assignments {
    fn from(list: Vec<Assignment>) -> Self {
        list.into_iter().fold(Assignments::new(), Assignments::with)
    }
}

impl<const N: usize> From<[Assignment; N]> for Assignments {
    fn from(list: [Assignment; N]) -> Self {
        Assignments::from(Vec::from(list))
    }
}

impl<K: AsRef<str>, V: Into<DatabaseValue>, const N: usize> From<[(K, V); N]> for Assignments {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| Assignment::from_pair(k.as_ref(), v.into()))
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<DatabaseRow> for Assignments {
    fn from(row: DatabaseRow) -> Self {
        row.into_iter()
            .map(|(k, v)| Assignment::from_pair(&k, v))
            .collect::<Vec<_>>()
            .into()
    }
}
