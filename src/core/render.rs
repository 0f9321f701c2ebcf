//! SQL statement rendering
//!
//! Lowers the accumulated query state into parameterized SQL. Every value is
//! bound as a `?` parameter; identifiers are quoted for the target dialect.

use super::database_types::DatabaseType;
use super::error::{PormError, Result};
use super::predicate::{AssignOp, Assignments, Conjunction, Operand, Operator, Predicate, Where};
use super::raw::RawSql;
use super::value::DatabaseValue;
use std::str::FromStr;

/// Rendered SQL plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN
    Inner,
    /// LEFT JOIN
    Left,
    /// RIGHT JOIN
    Right,
    /// FULL OUTER JOIN
    Full,
}

impl JoinType {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
        }
    }
}

impl FromStr for JoinType {
    type Err = PormError;

    /// Accepts `INNER`, `LEFT`, `RIGHT`, `FULL` (optionally followed by `JOIN`)
    /// and the arrow forms `[><]`, `[>]`, `[<]`, `[<>]`.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_suffix(" JOIN").unwrap_or(&upper).trim();
        match name {
            "INNER" | "[><]" => Ok(JoinType::Inner),
            "LEFT" | "[>]" => Ok(JoinType::Left),
            "RIGHT" | "[<]" => Ok(JoinType::Right),
            "FULL" | "FULL OUTER" | "[<>]" => Ok(JoinType::Full),
            _ => Err(PormError::invalid_join(format!(
                "`{s}` is not a join type; expected one of INNER, LEFT, RIGHT, FULL"
            ))),
        }
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Table name with optional alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            name: name.into(),
            alias,
        }
    }

    /// Name other clauses use to refer to this table
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn render(&self, dialect: DatabaseType) -> String {
        match &self.alias {
            Some(alias) => format!(
                "{} AS {}",
                dialect.quote_identifier(&self.name),
                dialect.quote_identifier(alias)
            ),
            None => dialect.quote_identifier(&self.name),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}({alias})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One selected column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Plain (possibly qualified) column, optionally renamed
    Named { name: String, alias: Option<String> },
    /// SQL expression with a mandatory alias
    Expr { alias: String, sql: RawSql },
}

impl Column {
    /// Parse `name` or `name(alias)`
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(inner) = spec.strip_suffix(')') {
            if let Some(open) = inner.find('(') {
                let alias = inner[open + 1..].trim();
                if !alias.is_empty() {
                    return Column::Named {
                        name: inner[..open].trim().to_string(),
                        alias: Some(alias.to_string()),
                    };
                }
            }
        }
        Column::Named {
            name: spec.to_string(),
            alias: None,
        }
    }

    /// Expression column, e.g. `COUNT(<id>)`
    pub fn expr(alias: impl Into<String>, sql: RawSql) -> Self {
        Column::Expr {
            alias: alias.into(),
            sql,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Column::Named { alias, .. } => alias.as_deref(),
            Column::Expr { alias, .. } => Some(alias),
        }
    }
}

impl From<&str> for Column {
    fn from(s: &str) -> Self {
        Column::parse(s)
    }
}

impl From<String> for Column {
    fn from(s: String) -> Self {
        Column::parse(&s)
    }
}

/// Column selection
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Columns {
    /// `*`
    #[default]
    All,
    List(Vec<Column>),
}

impl From<&str> for Columns {
    fn from(s: &str) -> Self {
        if s.trim() == "*" {
            Columns::All
        } else {
            Columns::List(vec![Column::parse(s)])
        }
    }
}

impl From<String> for Columns {
    fn from(s: String) -> Self {
        Columns::from(s.as_str())
    }
}

impl From<Column> for Columns {
    fn from(c: Column) -> Self {
        Columns::List(vec![c])
    }
}

impl<C: Into<Column>> From<Vec<C>> for Columns {
    fn from(list: Vec<C>) -> Self {
        if list.is_empty() {
            Columns::All
        } else {
            Columns::List(list.into_iter().map(Into::into).collect())
        }
    }
}

impl<C: Into<Column>, const N: usize> From<[C; N]> for Columns {
    fn from(list: [C; N]) -> Self {
        Columns::from(Vec::from(list))
    }
}

/// How a joined table is matched to the base table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOn {
    /// `USING (col, ...)`
    Using(Vec<String>),
    /// `ON base.local = joined.foreign AND ...`
    On(Vec<(String, String)>),
}

impl From<&str> for JoinOn {
    fn from(column: &str) -> Self {
        JoinOn::Using(vec![column.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for JoinOn {
    fn from(columns: [&str; N]) -> Self {
        JoinOn::Using(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl From<Vec<String>> for JoinOn {
    fn from(columns: Vec<String>) -> Self {
        JoinOn::Using(columns)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for JoinOn {
    fn from(pairs: [(&str, &str); N]) -> Self {
        JoinOn::On(
            pairs
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect(),
        )
    }
}

impl From<Vec<(String, String)>> for JoinOn {
    fn from(pairs: Vec<(String, String)>) -> Self {
        JoinOn::On(pairs)
    }
}

/// JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: JoinOn,
}

/// Row window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub count: u64,
    pub offset: u64,
}

/// Full-text search mode for `MATCH ... AGAINST`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Natural,
    Boolean,
    QueryExpansion,
}

impl MatchMode {
    fn as_sql(&self) -> &'static str {
        match self {
            MatchMode::Natural => "IN NATURAL LANGUAGE MODE",
            MatchMode::Boolean => "IN BOOLEAN MODE",
            MatchMode::QueryExpansion => "WITH QUERY EXPANSION",
        }
    }
}

/// Full-text condition
#[derive(Debug, Clone, PartialEq)]
pub struct FullText {
    pub columns: Vec<String>,
    pub keyword: String,
    pub mode: MatchMode,
}

/// Accumulated SELECT state
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: TableRef,
    pub columns: Columns,
    pub joins: Vec<Join>,
    pub conditions: Where,
    pub group: Vec<String>,
    pub having: Where,
    pub order: Vec<(String, OrderDirection)>,
    pub limit: Option<Limit>,
    pub full_text: Option<FullText>,
}

impl SelectQuery {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Columns::All,
            joins: Vec::new(),
            conditions: Where::new(),
            group: Vec::new(),
            having: Where::new(),
            order: Vec::new(),
            limit: None,
            full_text: None,
        }
    }

    /// `SELECT ... FROM ... [JOIN] [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT]`
    pub fn select(&self, dialect: DatabaseType) -> Result<Statement> {
        let mut r = Renderer::new(dialect);
        let columns = r.columns(&self.columns)?;
        let mut sql = format!("SELECT {columns} FROM {}", self.table.render(dialect));
        self.push_body(&mut r, &mut sql)?;
        self.push_order(&mut sql, dialect);
        push_limit(&mut sql, self.limit);
        Ok(r.finish(sql))
    }

    /// Same as [`select`](Self::select) but ordered randomly
    pub fn random(&self, dialect: DatabaseType) -> Result<Statement> {
        let mut r = Renderer::new(dialect);
        let columns = r.columns(&self.columns)?;
        let mut sql = format!("SELECT {columns} FROM {}", self.table.render(dialect));
        self.push_body(&mut r, &mut sql)?;
        sql.push_str(" ORDER BY ");
        sql.push_str(dialect.random_function());
        push_limit(&mut sql, self.limit);
        Ok(r.finish(sql))
    }

    /// `SELECT EXISTS(SELECT 1 ...)`
    pub fn exists(&self, dialect: DatabaseType) -> Result<Statement> {
        let mut r = Renderer::new(dialect);
        let mut inner = format!("SELECT 1 FROM {}", self.table.render(dialect));
        self.push_body(&mut r, &mut inner)?;
        Ok(r.finish(format!(
            "SELECT EXISTS({inner}) AS {}",
            dialect.quote_identifier("exists")
        )))
    }

    /// `SELECT FUNC(column) AS "aggregate" ...`; ordering and window are ignored
    pub fn aggregate(&self, dialect: DatabaseType, func: &str, column: Option<&str>) -> Result<Statement> {
        let mut r = Renderer::new(dialect);
        let target = match column {
            Some(column) if column != "*" => dialect.quote_identifier(column),
            _ => "*".to_string(),
        };
        let mut sql = format!(
            "SELECT {func}({target}) AS {} FROM {}",
            dialect.quote_identifier("aggregate"),
            self.table.render(dialect)
        );
        self.push_joins(&mut sql, dialect);
        if let Some(clause) = r.filter(&self.conditions, self.full_text.as_ref())? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok(r.finish(sql))
    }

    fn push_body(&self, r: &mut Renderer, sql: &mut String) -> Result<()> {
        self.push_joins(sql, r.dialect);
        if let Some(clause) = r.filter(&self.conditions, self.full_text.as_ref())? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if !self.group.is_empty() {
            let group: Vec<String> = self
                .group
                .iter()
                .map(|c| r.dialect.quote_identifier(c))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&group.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&r.conjoin(Conjunction::And, self.having.predicates())?);
        }
        Ok(())
    }

    fn push_joins(&self, sql: &mut String, dialect: DatabaseType) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.join_type.as_sql());
            sql.push(' ');
            sql.push_str(&join.table.render(dialect));
            match &join.on {
                JoinOn::Using(columns) => {
                    let columns: Vec<String> =
                        columns.iter().map(|c| dialect.quote_identifier(c)).collect();
                    sql.push_str(&format!(" USING ({})", columns.join(", ")));
                }
                JoinOn::On(pairs) => {
                    let conditions: Vec<String> = pairs
                        .iter()
                        .map(|(local, foreign)| {
                            format!(
                                "{} = {}",
                                qualify(dialect, self.table.reference(), local),
                                qualify(dialect, join.table.reference(), foreign)
                            )
                        })
                        .collect();
                    sql.push_str(&format!(" ON {}", conditions.join(" AND ")));
                }
            }
        }
    }

    fn push_order(&self, sql: &mut String, dialect: DatabaseType) {
        if !self.order.is_empty() {
            let clauses: Vec<String> = self
                .order
                .iter()
                .map(|(col, dir)| format!("{} {}", dialect.quote_identifier(col), dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&clauses.join(", "));
        }
    }
}

fn qualify(dialect: DatabaseType, table: &str, column: &str) -> String {
    if column.contains('.') {
        dialect.quote_identifier(column)
    } else {
        dialect.quote_identifier(&format!("{table}.{column}"))
    }
}

fn push_limit(sql: &mut String, limit: Option<Limit>) {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit.count));
        if limit.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", limit.offset));
        }
    }
}

/// `INSERT INTO table (...) VALUES (...)`
pub fn insert(dialect: DatabaseType, table: &str, data: &Assignments) -> Result<Statement> {
    let mut r = Renderer::new(dialect);
    let table = dialect.quote_identifier(table);
    if data.is_empty() {
        let sql = match dialect {
            DatabaseType::Mysql => format!("INSERT INTO {table} () VALUES ()"),
            DatabaseType::Sqlite | DatabaseType::Postgres => {
                format!("INSERT INTO {table} DEFAULT VALUES")
            }
        };
        return Ok(r.finish(sql));
    }

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for assignment in data.iter() {
        if assignment.op.arithmetic_sql().is_some() {
            return Err(PormError::InvalidAssignment(format!(
                "`{}` cannot be used in an insert",
                assignment.key()
            )));
        }
        columns.push(dialect.quote_identifier(&assignment.column));
        values.push(r.assigned_value(assignment.op, &assignment.value)?);
    }
    Ok(r.finish(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    )))
}

/// `UPDATE table SET ... [WHERE ...]`
pub fn update(
    dialect: DatabaseType,
    table: &str,
    data: &Assignments,
    conditions: &Where,
) -> Result<Statement> {
    if data.is_empty() {
        return Err(PormError::InvalidAssignment(format!(
            "no columns to update on `{table}`"
        )));
    }
    let mut r = Renderer::new(dialect);
    let mut sets = Vec::new();
    for assignment in data.iter() {
        let column = dialect.quote_identifier(&assignment.column);
        let value = r.assigned_value(assignment.op, &assignment.value)?;
        match assignment.op.arithmetic_sql() {
            Some(op) => sets.push(format!("{column} = {column} {op} {value}")),
            None => sets.push(format!("{column} = {value}")),
        }
    }
    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_identifier(table),
        sets.join(", ")
    );
    if let Some(clause) = r.filter(conditions, None)? {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }
    Ok(r.finish(sql))
}

/// `DELETE FROM table [WHERE ...]`; `single` removes at most one row
pub fn delete(dialect: DatabaseType, table: &str, conditions: &Where, single: bool) -> Result<Statement> {
    let mut r = Renderer::new(dialect);
    let quoted = dialect.quote_identifier(table);
    let clause = r
        .filter(conditions, None)?
        .map(|c| format!(" WHERE {c}"))
        .unwrap_or_default();

    let sql = match (single, dialect.row_identifier()) {
        (false, _) => format!("DELETE FROM {quoted}{clause}"),
        (true, Some(row_id)) => format!(
            "DELETE FROM {quoted} WHERE {row_id} IN (SELECT {row_id} FROM {quoted}{clause} LIMIT 1)"
        ),
        (true, None) => format!("DELETE FROM {quoted}{clause} LIMIT 1"),
    };
    Ok(r.finish(sql))
}

/// Collects parameters while a statement is being rendered
struct Renderer {
    dialect: DatabaseType,
    params: Vec<DatabaseValue>,
}

impl Renderer {
    fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }

    fn bind(&mut self, value: DatabaseValue) -> &'static str {
        self.params.push(value);
        "?"
    }

    fn inline(&mut self, raw: &RawSql) -> Result<String> {
        let (sql, params) = raw.lower(self.dialect)?;
        self.params.extend(params);
        Ok(sql)
    }

    fn columns(&mut self, columns: &Columns) -> Result<String> {
        let list = match columns {
            Columns::All => return Ok("*".to_string()),
            Columns::List(list) => list,
        };
        let mut rendered = Vec::with_capacity(list.len());
        for column in list {
            rendered.push(match column {
                Column::Named { name, alias: None } => self.dialect.quote_identifier(name),
                Column::Named {
                    name,
                    alias: Some(alias),
                } => format!(
                    "{} AS {}",
                    self.dialect.quote_identifier(name),
                    self.dialect.quote_identifier(alias)
                ),
                Column::Expr { alias, sql } => format!(
                    "{} AS {}",
                    self.inline(sql)?,
                    self.dialect.quote_identifier(alias)
                ),
            });
        }
        Ok(rendered.join(", "))
    }

    fn assigned_value(&mut self, op: AssignOp, value: &Operand) -> Result<String> {
        match (op, value) {
            (_, Operand::Raw(raw)) => self.inline(raw),
            (AssignOp::Json, Operand::Value(value)) => {
                let text = match value {
                    DatabaseValue::Null => DatabaseValue::Null,
                    other => DatabaseValue::String(serde_json::to_string(other)?),
                };
                Ok(self.bind(text).to_string())
            }
            (_, Operand::Value(value)) => Ok(self.bind(value.clone()).to_string()),
        }
    }

    fn filter(&mut self, conditions: &Where, full_text: Option<&FullText>) -> Result<Option<String>> {
        let mut parts = Vec::new();
        if let Some(full_text) = full_text {
            parts.push(self.full_text(full_text)?);
        }
        if !conditions.is_empty() {
            parts.push(self.conjoin(Conjunction::And, conditions.predicates())?);
        }
        Ok(if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        })
    }

    fn full_text(&mut self, full_text: &FullText) -> Result<String> {
        if !self.dialect.supports_full_text_match() {
            return Err(PormError::unsupported(format!(
                "MATCH ... AGAINST is not available on {}",
                self.dialect
            )));
        }
        let columns: Vec<String> = full_text
            .columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect();
        let placeholder = self.bind(DatabaseValue::String(full_text.keyword.clone()));
        Ok(format!(
            "MATCH ({}) AGAINST ({placeholder} {})",
            columns.join(", "),
            full_text.mode.as_sql()
        ))
    }

    fn conjoin(&mut self, conjunction: Conjunction, items: &[Predicate]) -> Result<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(self.predicate(item)?);
        }
        Ok(parts.join(&format!(" {} ", conjunction.as_sql())))
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String> {
        let dialect = self.dialect;
        let q = |c: &str| dialect.quote_identifier(c);
        match predicate {
            Predicate::Compare { column, op, value } => {
                let column = q(column);
                let rhs = match value {
                    Operand::Raw(raw) => self.inline(raw)?,
                    Operand::Value(value) => {
                        let value = match (op, value) {
                            (Operator::Like | Operator::NotLike, DatabaseValue::String(s))
                                if !s.contains(['%', '_']) =>
                            {
                                DatabaseValue::String(format!("%{s}%"))
                            }
                            _ => value.clone(),
                        };
                        self.bind(value).to_string()
                    }
                };
                Ok(format!("{column} {} {rhs}", op.as_sql()))
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let column = q(column);
                let placeholders: Vec<&str> = values.iter().map(|v| self.bind(v.clone())).collect();
                let not = if *negated { "NOT " } else { "" };
                Ok(format!("{column} {not}IN ({})", placeholders.join(", ")))
            }
            Predicate::IsNull { column, negated } => {
                let not = if *negated { "NOT " } else { "" };
                Ok(format!("{} IS {not}NULL", q(column)))
            }
            Predicate::Between {
                column,
                low,
                high,
                negated,
            } => {
                let column = q(column);
                let not = if *negated { "NOT " } else { "" };
                self.bind(low.clone());
                self.bind(high.clone());
                Ok(format!("{column} {not}BETWEEN ? AND ?"))
            }
            Predicate::Group {
                conjunction, items, ..
            } => {
                if items.is_empty() {
                    return Ok(match conjunction {
                        Conjunction::And => "1 = 1",
                        Conjunction::Or => "1 = 0",
                    }
                    .to_string());
                }
                Ok(format!("({})", self.conjoin(*conjunction, items)?))
            }
            Predicate::Raw(raw) => Ok(format!("({})", self.inline(raw)?)),
        }
    }
}
