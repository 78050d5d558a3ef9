//! Column-usage extraction from raw SQL text.
//!
//! [`PredicateExtractor`] parses a query with `sqlparser` and reports, per
//! query, which base-table columns appear in JOIN conditions, which appear in
//! WHERE predicates, and which are referenced anywhere in a SELECT block.
//!
//! Every SELECT block (top level, CTE bodies, derived tables, subqueries and
//! both sides of set operations) is analysed in its own scope. Within a
//! scope, qualifiers resolve through the block's FROM list: aliases and bare
//! table names map to base tables, while CTE names and derived tables map to
//! virtual relations whose columns are never attributed to a base table.
//!
//! ```rust
//! use term_partition::sql::{Extraction, PredicateExtractor};
//!
//! let extractor = PredicateExtractor::new();
//! let Extraction::Columns(columns) = extractor.extract(
//!     "SELECT o.id FROM orders o JOIN customers c ON o.customer_id = c.id WHERE o.status = 'open'",
//! ) else {
//!     panic!("query should parse");
//! };
//! assert_eq!(columns.join_columns.len(), 2);
//! assert_eq!(columns.filter_columns.len(), 1);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    Expr, Join, JoinConstraint, JoinOperator, ObjectName, ObjectNamePart, Query, Select, SetExpr,
    TableFactor, TableWithJoins, Visit, Visitor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::core::catalog::TableDescriptor;
use crate::core::names::{normalize_identifier, table_matches};

/// A column resolved to the base table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Columns found in one successfully parsed query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedColumns {
    /// Columns appearing in `JOIN ... ON` or `JOIN ... USING`.
    pub join_columns: BTreeSet<ColumnRef>,
    /// Columns appearing in a WHERE clause.
    pub filter_columns: BTreeSet<ColumnRef>,
    /// Every resolved column reference, predicates included.
    pub referenced: BTreeSet<ColumnRef>,
    /// Base tables read by the query.
    pub tables: BTreeSet<String>,
    /// References that could not be attributed to a single base table.
    pub unresolved: BTreeSet<String>,
}

impl ExtractedColumns {
    /// Columns used in either a join or a filter predicate.
    pub fn predicate_columns(&self) -> BTreeSet<&ColumnRef> {
        self.join_columns.iter().chain(&self.filter_columns).collect()
    }

    /// Returns true when the query reads `table`, compared by resolved name.
    pub fn reads_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }
}

/// Result of extracting one query: either its columns or why it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    Columns(ExtractedColumns),
    ParseFailure { reason: String },
}

impl Extraction {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ParseFailure { .. })
    }

    pub fn columns(&self) -> Option<&ExtractedColumns> {
        match self {
            Self::Columns(columns) => Some(columns),
            Self::ParseFailure { .. } => None,
        }
    }
}

/// Parses SQL and extracts predicate column usage.
///
/// Without a schema, unqualified references resolve only inside blocks that
/// read exactly one base table. With a schema from [`with_schema`], they also
/// resolve in multi-table blocks when exactly one of the tables owns the
/// column, and table names are canonicalised to their catalog spelling.
///
/// [`with_schema`]: PredicateExtractor::with_schema
#[derive(Debug, Clone, Default)]
pub struct PredicateExtractor {
    schema: HashMap<String, HashSet<String>>,
}

impl PredicateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor that knows the column sets of `tables`.
    pub fn with_schema(tables: &[TableDescriptor]) -> Self {
        let schema = tables
            .iter()
            .map(|table| {
                let columns = table.columns.iter().map(|c| c.name.clone()).collect();
                (table.name.clone(), columns)
            })
            .collect();
        Self { schema }
    }

    /// Extracts the columns of one query. Never panics on malformed input.
    pub fn extract(&self, sql: &str) -> Extraction {
        let statements = match Parser::parse_sql(&GenericDialect {}, sql) {
            Ok(statements) => statements,
            Err(e) => {
                return Extraction::ParseFailure {
                    reason: e.to_string(),
                }
            }
        };
        if statements.is_empty() {
            return Extraction::ParseFailure {
                reason: "no SQL statement found".to_string(),
            };
        }

        let mut ctes = CteCollector::default();
        for statement in &statements {
            let _ = statement.visit(&mut ctes);
        }

        let mut walker = QueryWalker {
            extractor: self,
            ctes: &ctes.names,
            out: ExtractedColumns::default(),
        };
        for statement in &statements {
            let _ = statement.visit(&mut walker);
        }

        Extraction::Columns(walker.out)
    }

    /// Maps a normalised table name onto the catalog's spelling.
    ///
    /// An exact catalog name wins; otherwise a single catalog table whose
    /// qualified name suffix-matches is used. Names the catalog does not know
    /// are kept as written. Returns `None` when several catalog tables match,
    /// so the reference is left unattributed.
    pub fn resolve_table(&self, table: &str) -> Option<String> {
        if self.schema.contains_key(table) {
            return Some(table.to_string());
        }
        let mut matches = self.schema.keys().filter(|known| table_matches(known, table));
        match (matches.next(), matches.next()) {
            (None, _) => Some(table.to_string()),
            (Some(known), None) => Some(known.clone()),
            (Some(_), Some(_)) => None,
        }
    }

    fn known_columns(&self, table: &str) -> Option<&HashSet<String>> {
        self.schema.get(table)
    }
}

/// Collects the names of every CTE defined anywhere in a statement.
#[derive(Default)]
struct CteCollector {
    names: HashSet<String>,
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.names.insert(normalize_identifier(&cte.alias.name.value));
            }
        }
        ControlFlow::Continue(())
    }
}

/// Visits every query of a statement and analyses its SELECT blocks.
struct QueryWalker<'a> {
    extractor: &'a PredicateExtractor,
    ctes: &'a HashSet<String>,
    out: ExtractedColumns,
}

impl Visitor for QueryWalker<'_> {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.walk_set_expr(&query.body);
        ControlFlow::Continue(())
    }
}

impl QueryWalker<'_> {
    fn walk_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.analyse_select(select),
            SetExpr::SetOperation { left, right, .. } => {
                self.walk_set_expr(left);
                self.walk_set_expr(right);
            }
            // Nested queries are visited on their own.
            _ => {}
        }
    }

    fn analyse_select(&mut self, select: &Select) {
        let mut scope = Scope::default();
        for table_with_joins in &select.from {
            scope.add_table_with_joins(table_with_joins, self.ctes, self.extractor);
        }
        for table in scope.base_tables() {
            self.out.tables.insert(table.to_string());
        }

        for reference in collect_references(select) {
            if let Some(column) = self.resolve(&scope, &reference) {
                self.out.referenced.insert(column);
            }
        }

        for table_with_joins in &select.from {
            self.collect_join_columns(table_with_joins, &scope);
        }

        if let Some(selection) = &select.selection {
            for reference in collect_references(selection) {
                if let Some(column) = self.resolve(&scope, &reference) {
                    self.out.filter_columns.insert(column.clone());
                    self.out.referenced.insert(column);
                }
            }
        }
    }

    fn collect_join_columns(&mut self, table_with_joins: &TableWithJoins, scope: &Scope) {
        let mut left = &table_with_joins.relation;
        self.collect_nested_join_columns(left, scope);
        for join in &table_with_joins.joins {
            self.collect_nested_join_columns(&join.relation, scope);
            match join_constraint(join) {
                Some(JoinConstraint::On(expr)) => {
                    for reference in collect_references(expr) {
                        if let Some(column) = self.resolve(scope, &reference) {
                            self.out.join_columns.insert(column.clone());
                            self.out.referenced.insert(column);
                        }
                    }
                }
                Some(JoinConstraint::Using(names)) => {
                    for name in names {
                        let column = last_segment(&name.to_string());
                        for side in [left, &join.relation] {
                            if let Some(table) = scope.table_of_factor(side) {
                                let column = ColumnRef::new(table, column.clone());
                                self.out.join_columns.insert(column.clone());
                                self.out.referenced.insert(column);
                            }
                        }
                    }
                }
                _ => {}
            }
            left = &join.relation;
        }
    }

    fn collect_nested_join_columns(&mut self, factor: &TableFactor, scope: &Scope) {
        if let TableFactor::NestedJoin {
            table_with_joins, ..
        } = factor
        {
            self.collect_join_columns(table_with_joins, scope);
        }
    }

    /// Resolves a reference in `scope`, recording it as unresolved on failure.
    fn resolve(&mut self, scope: &Scope, reference: &Reference) -> Option<ColumnRef> {
        let table = match &reference.qualifier {
            Some(qualifier) => scope.lookup_qualifier(qualifier),
            None => self.resolve_unqualified(scope, &reference.column),
        };
        match table {
            Some(table) => Some(ColumnRef::new(table, reference.column.clone())),
            None => {
                self.out.unresolved.insert(reference.to_string());
                None
            }
        }
    }

    fn resolve_unqualified(&self, scope: &Scope, column: &str) -> Option<String> {
        if scope.has_virtual() {
            return None;
        }
        let tables = scope.base_tables();
        if tables.len() == 1 {
            return tables.first().map(|t| t.to_string());
        }

        let mut owners = Vec::new();
        for table in &tables {
            match self.extractor.known_columns(table) {
                Some(columns) if columns.contains(column) => owners.push(*table),
                Some(_) => {}
                None => return None,
            }
        }
        match owners.as_slice() {
            [owner] => Some(owner.to_string()),
            _ => None,
        }
    }
}

fn join_constraint(join: &Join) -> Option<&JoinConstraint> {
    match &join.join_operator {
        JoinOperator::Join(constraint)
        | JoinOperator::Inner(constraint)
        | JoinOperator::Left(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::Right(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint) => Some(constraint),
        _ => None,
    }
}

/// A relation visible in one SELECT block's FROM list.
#[derive(Debug)]
struct Relation {
    binding: String,
    /// `None` for CTE references, derived tables, table functions and names
    /// matching several catalog tables.
    table: Option<String>,
}

#[derive(Debug, Default)]
struct Scope {
    relations: Vec<Relation>,
}

impl Scope {
    fn add_table_with_joins(
        &mut self,
        table_with_joins: &TableWithJoins,
        ctes: &HashSet<String>,
        extractor: &PredicateExtractor,
    ) {
        self.add_factor(&table_with_joins.relation, ctes, extractor);
        for join in &table_with_joins.joins {
            self.add_factor(&join.relation, ctes, extractor);
        }
    }

    fn add_factor(
        &mut self,
        factor: &TableFactor,
        ctes: &HashSet<String>,
        extractor: &PredicateExtractor,
    ) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let table = object_name(name);
                let binding = alias
                    .as_ref()
                    .map(|a| normalize_identifier(&a.name.value))
                    .unwrap_or_else(|| last_segment(&table));
                let table = if name.0.len() == 1 && ctes.contains(&table) {
                    None
                } else {
                    extractor.resolve_table(&table)
                };
                self.relations.push(Relation { binding, table });
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.add_table_with_joins(table_with_joins, ctes, extractor),
            TableFactor::Derived { alias, .. } => self.relations.push(Relation {
                binding: alias
                    .as_ref()
                    .map(|a| normalize_identifier(&a.name.value))
                    .unwrap_or_default(),
                table: None,
            }),
            _ => self.relations.push(Relation {
                binding: String::new(),
                table: None,
            }),
        }
    }

    fn base_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .relations
            .iter()
            .filter_map(|r| r.table.as_deref())
            .collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    fn has_virtual(&self) -> bool {
        self.relations.iter().any(|r| r.table.is_none())
    }

    /// Looks up a qualifier by binding first, then by exact table name, then
    /// by a single table name suffix match.
    fn lookup_qualifier(&self, qualifier: &str) -> Option<String> {
        if let Some(relation) = self.relations.iter().find(|r| r.binding == qualifier) {
            return relation.table.clone();
        }
        let tables = self.base_tables();
        if tables.contains(&qualifier) {
            return Some(qualifier.to_string());
        }
        let mut matches = tables.into_iter().filter(|table| table_matches(table, qualifier));
        match (matches.next(), matches.next()) {
            (Some(table), None) => Some(table.to_string()),
            _ => None,
        }
    }

    fn table_of_factor(&self, factor: &TableFactor) -> Option<String> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let binding = alias
                    .as_ref()
                    .map(|a| normalize_identifier(&a.name.value))
                    .unwrap_or_else(|| last_segment(&object_name(name)));
                self.relations
                    .iter()
                    .find(|r| r.binding == binding)
                    .and_then(|r| r.table.clone())
            }
            _ => None,
        }
    }
}

/// A column reference as written, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reference {
    qualifier: Option<String>,
    column: String,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Collects identifier references of a node, skipping nested queries.
#[derive(Default)]
struct ReferenceCollector {
    depth: usize,
    references: Vec<Reference>,
}

impl Visitor for ReferenceCollector {
    type Break = ();

    fn pre_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if self.depth > 0 {
            return ControlFlow::Continue(());
        }
        match expr {
            Expr::Identifier(ident) => self.references.push(Reference {
                qualifier: None,
                column: normalize_identifier(&ident.value),
            }),
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let Some((column, qualifier)) = idents.split_last() else {
                    return ControlFlow::Continue(());
                };
                let qualifier = qualifier
                    .iter()
                    .map(|i| normalize_identifier(&i.value))
                    .collect::<Vec<_>>()
                    .join(".");
                self.references.push(Reference {
                    qualifier: Some(qualifier),
                    column: normalize_identifier(&column.value),
                });
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

fn collect_references<N: Visit>(node: &N) -> Vec<Reference> {
    let mut collector = ReferenceCollector::default();
    let _ = node.visit(&mut collector);
    collector.references
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .filter_map(ObjectNamePart::as_ident)
        .map(|ident| normalize_identifier(&ident.value))
        .collect::<Vec<_>>()
        .join(".")
}

fn last_segment(name: &str) -> String {
    let segment = name.rsplit('.').next().unwrap_or(name);
    normalize_identifier(segment)
}
