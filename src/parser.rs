//! SQL text helpers: line-break folding and a light statement summary.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// SQL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Call,
    Other,
}

impl SqlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Call => "CALL",
            SqlOperation::Other => "QUERY",
        }
    }
}

impl std::fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static LINE_BREAK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

static FROM_TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bFROM\s+[`"\[]?([\w.]+)[`"\]]?"#).unwrap()
});

static INSERT_TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bINSERT\s+INTO\s+[`"\[]?([\w.]+)[`"\]]?"#).unwrap()
});

static UPDATE_TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bUPDATE\s+[`"\[]?([\w.]+)[`"\]]?"#).unwrap()
});

/// Replace every `\r\n`, `\r` or `\n` with a single space.
///
/// Borrows when the text is already on one line.
pub fn collapse_line_breaks(sql: &str) -> Cow<'_, str> {
    LINE_BREAK_REGEX.replace_all(sql, " ")
}

/// Parse the SQL operation type from a query string.
///
/// ODBC escape sequences (`{call proc(?)}`, `{?= call ...}`) count as `Call`.
pub fn parse_operation(sql: &str) -> SqlOperation {
    let trimmed = sql.trim_start();
    let upper_start = trimmed.chars().take(12).collect::<String>().to_uppercase();

    if upper_start.starts_with("SELECT") || upper_start.starts_with("WITH") {
        SqlOperation::Select
    } else if upper_start.starts_with("INSERT") {
        SqlOperation::Insert
    } else if upper_start.starts_with("UPDATE") {
        SqlOperation::Update
    } else if upper_start.starts_with("DELETE") {
        SqlOperation::Delete
    } else if upper_start.starts_with('{')
        || upper_start.starts_with("CALL")
        || upper_start.starts_with("EXEC")
    {
        SqlOperation::Call
    } else {
        SqlOperation::Other
    }
}

/// Extract the primary table name from a SQL query.
///
/// Returns `None` if the table cannot be determined.
pub fn extract_table(sql: &str) -> Option<String> {
    let regex = match parse_operation(sql) {
        SqlOperation::Select | SqlOperation::Delete => &*FROM_TABLE_REGEX,
        SqlOperation::Insert => &*INSERT_TABLE_REGEX,
        SqlOperation::Update => &*UPDATE_TABLE_REGEX,
        _ => return None,
    };

    regex
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Operation and table of a captured statement, for debug events.
#[derive(Debug)]
pub struct StatementSummary {
    pub operation: SqlOperation,
    pub table: Option<String>,
}

impl StatementSummary {
    pub fn parse(sql: &str) -> Self {
        Self {
            operation: parse_operation(sql),
            table: extract_table(sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_line_breaks() {
        assert_eq!(collapse_line_breaks("SELECT 1\r\nFROM t"), "SELECT 1 FROM t");
        assert_eq!(collapse_line_breaks("a\rb\nc"), "a b c");
        assert_eq!(collapse_line_breaks("a\n\r\nb"), "a  b");
        assert_eq!(collapse_line_breaks("a\n\rb"), "a  b");
        assert!(matches!(collapse_line_breaks("SELECT 1"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(parse_operation("  select * from users"), SqlOperation::Select);
        assert_eq!(
            parse_operation("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            SqlOperation::Select
        );
        assert_eq!(
            parse_operation("INSERT INTO users (name) VALUES (?)"),
            SqlOperation::Insert
        );
        assert_eq!(parse_operation("UPDATE users SET a = 1"), SqlOperation::Update);
        assert_eq!(parse_operation("DELETE FROM users"), SqlOperation::Delete);
        assert_eq!(parse_operation("{call refresh(?)}"), SqlOperation::Call);
        assert_eq!(parse_operation("EXEC sp_who"), SqlOperation::Call);
        assert_eq!(parse_operation("SET NOCOUNT ON"), SqlOperation::Other);
    }

    #[test]
    fn test_extract_table() {
        assert_eq!(
            extract_table("SELECT * FROM Orders WHERE id = ?"),
            Some("orders".to_string())
        );
        assert_eq!(
            extract_table("SELECT a FROM [dbo.Customers]"),
            Some("dbo.customers".to_string())
        );
        assert_eq!(
            extract_table("INSERT INTO grades (id) VALUES (?)"),
            Some("grades".to_string())
        );
        assert_eq!(
            extract_table("UPDATE students SET name = ?"),
            Some("students".to_string())
        );
        assert_eq!(
            extract_table("DELETE FROM assignments WHERE id = ?"),
            Some("assignments".to_string())
        );
        assert_eq!(extract_table("{call refresh(?)}"), None);
    }

    #[test]
    fn test_statement_summary() {
        let summary = StatementSummary::parse("select id\r\nfrom users");
        assert_eq!(summary.operation, SqlOperation::Select);
        assert_eq!(summary.table.as_deref(), Some("users"));
    }
}
