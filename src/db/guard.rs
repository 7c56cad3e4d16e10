//! Statement guard for generated SQL.
//!
//! A deliberately simple syntactic allow-list: exactly one statement, a
//! read-only leading keyword, no write/DDL keywords anywhere, no comment
//! tokens. This is defense in depth against a misbehaving generator on a
//! read-only analytics store, not a security boundary; a real parser would
//! be the next step if untrusted callers ever reach this service directly.
//! Row and wall-clock ceilings are enforced by the executor.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("statement is empty")]
    Empty,

    #[error("inline comment token '{0}' is not allowed")]
    CommentToken(&'static str),

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("statement must start with a read-only keyword, found '{0}'")]
    NotReadOnly(String),

    #[error("forbidden keyword {0}")]
    ForbiddenKeyword(String),
}

const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE"];

pub fn check(sql: &str) -> Result<(), Rejection> {
    let trimmed = sql.trim();
    // One trailing semicolon is tolerated; generators like to add it.
    let trimmed = trimmed
        .strip_suffix(';')
        .map(str::trim_end)
        .unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(Rejection::Empty);
    }
    if trimmed.contains("--") {
        return Err(Rejection::CommentToken("--"));
    }
    if trimmed.contains("/*") {
        return Err(Rejection::CommentToken("/*"));
    }
    if trimmed.contains(';') {
        return Err(Rejection::MultipleStatements);
    }

    let leading = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('(')
        .to_uppercase();
    if !ALLOWED_LEADING.contains(&leading.as_str()) {
        return Err(Rejection::NotReadOnly(leading));
    }

    let forbidden = Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|MERGE|REPLACE|GRANT|REVOKE|CALL|ATTACH|DETACH|COPY|EXPORT|IMPORT|INSTALL|LOAD|SET|RESET|PRAGMA|VACUUM|CHECKPOINT|EXECUTE|PREPARE|BEGIN|COMMIT|ROLLBACK)\b",
    )
    .unwrap();
    if let Some(found) = forbidden.find(trimmed) {
        return Err(Rejection::ForbiddenKeyword(found.as_str().to_uppercase()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_statement_is_allowed() {
        assert_eq!(check("SELECT id, name FROM customers"), Ok(()));
    }

    #[test]
    fn lowercase_select_is_allowed() {
        assert_eq!(check("select * from customers where id = 4"), Ok(()));
    }

    #[test]
    fn cte_select_is_allowed() {
        assert_eq!(
            check("WITH recent AS (SELECT * FROM orders) SELECT count(*) FROM recent"),
            Ok(())
        );
    }

    #[test]
    fn show_and_describe_are_allowed() {
        assert_eq!(check("SHOW TABLES"), Ok(()));
        assert_eq!(check("DESCRIBE customers"), Ok(()));
    }

    #[test]
    fn trailing_semicolon_is_tolerated() {
        assert_eq!(check("SELECT 1;"), Ok(()));
        assert_eq!(check("SELECT 1 ;  "), Ok(()));
    }

    #[test]
    fn empty_statement_is_rejected() {
        assert_eq!(check("   "), Err(Rejection::Empty));
        assert_eq!(check(";"), Err(Rejection::Empty));
    }

    #[test]
    fn multiple_statements_are_rejected() {
        assert_eq!(
            check("SELECT 1; SELECT 2"),
            Err(Rejection::MultipleStatements)
        );
    }

    #[test]
    fn comment_tokens_are_rejected() {
        assert_eq!(
            check("SELECT 1 -- hidden"),
            Err(Rejection::CommentToken("--"))
        );
        assert_eq!(
            check("SELECT /* hidden */ 1"),
            Err(Rejection::CommentToken("/*"))
        );
    }

    #[test]
    fn leading_write_keywords_are_rejected() {
        assert!(matches!(
            check("DROP TABLE customers"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert!(matches!(
            check("DELETE FROM customers"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert!(matches!(
            check("UPDATE customers SET name = 'x'"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert!(matches!(
            check("INSERT INTO customers VALUES (1)"),
            Err(Rejection::NotReadOnly(_))
        ));
    }

    #[test]
    fn embedded_write_keywords_are_rejected() {
        assert_eq!(
            check("WITH gone AS (DELETE FROM t RETURNING 1) SELECT * FROM gone"),
            Err(Rejection::ForbiddenKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn string_literals_are_scanned_too() {
        // Known false positive of the keyword scan; the guard prefers
        // rejecting odd-but-safe statements over parsing literals.
        assert_eq!(
            check("SELECT * FROM audit WHERE action = 'DELETE'"),
            Err(Rejection::ForbiddenKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn session_statements_are_rejected() {
        assert!(matches!(
            check("SET threads = 4"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert!(matches!(
            check("PRAGMA database_list"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert_eq!(
            check("SELECT 1 WHERE EXISTS (ATTACH 'other.db')"),
            Err(Rejection::ForbiddenKeyword("ATTACH".to_string()))
        );
    }

    #[test]
    fn keywords_inside_identifiers_do_not_match() {
        assert_eq!(
            check("SELECT created_at, updated_at FROM audit_log"),
            Ok(())
        );
        assert_eq!(check("SELECT dropped, insert_ts FROM churn"), Ok(()));
    }

    #[test]
    fn offset_is_not_mistaken_for_set() {
        assert_eq!(check("SELECT * FROM t LIMIT 10 OFFSET 5"), Ok(()));
    }

    #[test]
    fn parenthesized_select_is_allowed() {
        assert_eq!(check("(SELECT 1)"), Ok(()));
    }
}
