//! Statement canonicalization and normalization
//!
//! Two distinct text reductions serve two distinct groupings.
//! [`canonicalize`] erases literal values so structurally identical
//! statements collide, which is what N+1 detection groups on.
//! [`normalize`] only strips comments and collapses whitespace, so
//! literal-identical repeats stay distinguishable from merely structural
//! ones, which is what duplicate detection groups on.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static IN_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bIN\s*\([^)]*\)").unwrap());

static QUOTED_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());

static BARE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--[^\n]*").unwrap());

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static TABLE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+`?([a-zA-Z_][a-zA-Z0-9_]*)`?").unwrap()
});

static WRITE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:INSERT|UPDATE|DELETE|REPLACE)\b").unwrap());

static AGGREGATE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(|(?i)\bGROUP\s+BY\b").unwrap()
});

static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());

static LIMIT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").unwrap());

static SELECT_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\b").unwrap());

static WILDCARD_PROJECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+(?:[a-zA-Z_][a-zA-Z0-9_]*\.)?\*").unwrap());

/// Broad statement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    Read,
    Write,
    Aggregate,
}

impl QueryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryClass::Read => "read",
            QueryClass::Write => "write",
            QueryClass::Aggregate => "aggregate",
        }
    }
}

/// Reduce a statement to its structural signature
///
/// Quoted literals, bare integers, and `IN (...)` lists all become `?`;
/// whitespace collapses to single spaces. Two statements differing only in
/// literal values canonicalize identically.
pub fn canonicalize(statement: &str) -> String {
    let s = IN_LIST.replace_all(statement, "IN (?)");
    let s = QUOTED_LITERAL.replace_all(&s, "?");
    let s = BARE_INTEGER.replace_all(&s, "?");
    let s = WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// Strip comments and collapse whitespace, keeping literals intact
pub fn normalize(statement: &str) -> String {
    let s = LINE_COMMENT.replace_all(statement, " ");
    let s = BLOCK_COMMENT.replace_all(&s, " ");
    let s = WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// Tables referenced as FROM/JOIN/INTO/UPDATE targets, lowercased,
/// first-appearance order
pub fn extract_tables(statement: &str) -> Vec<String> {
    let mut tables = Vec::new();
    for cap in TABLE_TARGET.captures_iter(statement) {
        let table = cap[1].to_lowercase();
        if !tables.contains(&table) {
            tables.push(table);
        }
    }
    tables
}

/// Classify a statement as read, write, or aggregate
///
/// Writes win over aggregates so `INSERT ... SELECT COUNT(*)` classifies
/// as a write.
pub fn classify(statement: &str) -> QueryClass {
    if WRITE_MARKER.is_match(statement) {
        QueryClass::Write
    } else if AGGREGATE_MARKER.is_match(statement) {
        QueryClass::Aggregate
    } else {
        QueryClass::Read
    }
}

/// True when the statement has a WHERE clause
pub fn has_where(statement: &str) -> bool {
    WHERE_CLAUSE.is_match(statement)
}

/// True when the statement has a LIMIT clause
pub fn has_limit(statement: &str) -> bool {
    LIMIT_CLAUSE.is_match(statement)
}

/// True when the statement is a SELECT
pub fn is_select(statement: &str) -> bool {
    SELECT_STATEMENT.is_match(statement)
}

/// True when the statement projects `*` (optionally table-qualified)
pub fn is_wildcard_select(statement: &str) -> bool {
    WILDCARD_PROJECTION.is_match(statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_erases_literals() {
        assert_eq!(
            canonicalize("SELECT * FROM users WHERE id = 42"),
            "SELECT * FROM users WHERE id = ?"
        );
        assert_eq!(
            canonicalize("SELECT * FROM users WHERE name = 'alice'"),
            "SELECT * FROM users WHERE name = ?"
        );
        assert_eq!(
            canonicalize("SELECT * FROM users WHERE id IN (1, 2, 3)"),
            "SELECT * FROM users WHERE id IN (?)"
        );
    }

    #[test]
    fn test_canonicalize_collapses_whitespace() {
        assert_eq!(
            canonicalize("SELECT *\n  FROM users\n  WHERE id = 7"),
            "SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_structurally_identical_statements_collide() {
        let a = canonicalize("SELECT * FROM posts WHERE user_id = 1");
        let b = canonicalize("SELECT * FROM posts WHERE user_id = 99");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_keeps_literals() {
        let a = normalize("SELECT * FROM posts WHERE user_id = 1");
        let b = normalize("SELECT * FROM posts WHERE user_id = 99");
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_strips_comments() {
        assert_eq!(
            normalize("SELECT * FROM users -- all of them\nWHERE id = 1"),
            "SELECT * FROM users WHERE id = 1"
        );
        assert_eq!(
            normalize("SELECT /* hint */ * FROM users"),
            "SELECT * FROM users"
        );
    }

    #[test]
    fn test_extract_tables() {
        let tables = extract_tables(
            "SELECT * FROM orders JOIN customers ON orders.customer_id = customers.id",
        );
        assert_eq!(tables, vec!["orders".to_string(), "customers".to_string()]);

        assert_eq!(
            extract_tables("UPDATE users SET active = 1"),
            vec!["users".to_string()]
        );
        assert_eq!(
            extract_tables("INSERT INTO audit_log (a) VALUES (1)"),
            vec!["audit_log".to_string()]
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("SELECT * FROM users"), QueryClass::Read);
        assert_eq!(classify("UPDATE users SET x = 1"), QueryClass::Write);
        assert_eq!(classify("DELETE FROM users"), QueryClass::Write);
        assert_eq!(
            classify("SELECT COUNT(*) FROM users GROUP BY team"),
            QueryClass::Aggregate
        );
        assert_eq!(
            classify("INSERT INTO stats SELECT COUNT(*) FROM users"),
            QueryClass::Write
        );
    }

    #[test]
    fn test_clause_checks() {
        assert!(has_where("SELECT * FROM t WHERE id = 1"));
        assert!(!has_where("SELECT * FROM t"));
        assert!(has_limit("SELECT * FROM t LIMIT 10"));
        assert!(is_wildcard_select("SELECT * FROM t"));
        assert!(is_wildcard_select("select u.* from users u"));
        assert!(!is_wildcard_select("SELECT id, name FROM t"));
    }
}
