// src/executor/sql.rs

//! Batch protocol for SQL: statements run one at a time against a private
//! in-memory SQLite database that lives for a single call.
//!
//! The output log collects a result table per query and a success line per
//! write or DDL statement. The first failing statement appends its error
//! and stops the batch. The log is always returned as `Success`; only a
//! database that cannot be opened is an `InternalError`.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Executor as _, Row, Statement, TypeInfo, ValueRef};

use super::{ExecutionRequest, Executor};
use crate::outcome::ExecutionOutcome;
use crate::protocol::LanguageProtocol;

pub const STATEMENT_OK: &str = "Statement executed successfully.";
const NULL_TEXT: &str = "NULL";
const COLUMN_SEPARATOR: &str = " | ";

/// Split a script into statements on `;`, ignoring separators inside
/// quotes, comments, trigger bodies and `CASE ... END`. Empty statements
/// are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut word = String::new();
    let mut depth = 0usize;
    let mut chars = script.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
            current.push(ch);
            continue;
        }
        track_block(&mut word, &mut depth, &current);

        match ch {
            '\'' | '"' | '`' => {
                current.push(ch);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == ch {
                        // A doubled quote is an escaped quote.
                        if chars.peek() == Some(&ch) {
                            current.push(ch);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                current.push(' ');
            }
            ';' if depth == 0 => push_statement(&mut statements, &mut current),
            _ => current.push(ch),
        }
    }
    track_block(&mut word, &mut depth, &current);
    push_statement(&mut statements, &mut current);

    statements
}

/// Update block depth for the word that just ended. `BEGIN` only opens a
/// block inside `CREATE TRIGGER`; elsewhere it starts a transaction.
fn track_block(word: &mut String, depth: &mut usize, statement: &str) {
    if word.is_empty() {
        return;
    }
    if word.eq_ignore_ascii_case("CASE")
        || (word.eq_ignore_ascii_case("BEGIN") && is_trigger(statement))
    {
        *depth += 1;
    } else if word.eq_ignore_ascii_case("END") {
        *depth = depth.saturating_sub(1);
    }
    word.clear();
}

fn is_trigger(statement: &str) -> bool {
    let mut words = statement.split_whitespace().take(4);
    words.next().is_some_and(|w| w.eq_ignore_ascii_case("CREATE"))
        && words.any(|w| w.eq_ignore_ascii_case("TRIGGER"))
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

/// Run every statement of `script` against a fresh in-memory database.
pub async fn run_batch(script: &str) -> Result<String, sqlx::Error> {
    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
    let mut log: Vec<String> = Vec::new();

    for statement in split_statements(script) {
        match run_statement(&mut conn, &statement).await {
            Ok(block) => log.push(block),
            Err(e) => {
                tracing::debug!(statement = %statement, error = %e, "statement failed, stopping batch");
                log.push(format!("Error: {}", error_message(&e)));
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close in-memory database");
    }

    Ok(log.join("\n"))
}

async fn run_statement(conn: &mut SqliteConnection, statement: &str) -> Result<String, sqlx::Error> {
    let prepared = (&mut *conn).prepare(statement).await?;
    let headers: Vec<String> = prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    if headers.is_empty() {
        sqlx::query(statement).execute(&mut *conn).await?;
        return Ok(STATEMENT_OK.to_string());
    }

    let rows = sqlx::query(statement).fetch_all(&mut *conn).await?;
    Ok(format_table(&headers, &rows))
}

fn format_table(headers: &[String], rows: &[SqliteRow]) -> String {
    let header = headers.join(COLUMN_SEPARATOR);
    let mut lines = vec![header.clone(), "-".repeat(header.len().max(3))];

    for row in rows {
        let values: Vec<String> = (0..row.len()).map(|i| cell_text(row, i)).collect();
        lines.push(values.join(COLUMN_SEPARATOR));
    }

    lines.join("\n")
}

fn cell_text(row: &SqliteRow, index: usize) -> String {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return NULL_TEXT.to_string(),
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return NULL_TEXT.to_string(),
    };

    let text = match type_name.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|v| String::from_utf8_lossy(&v).into_owned()),
        _ => row.try_get_unchecked::<String, _>(index),
    };

    text.unwrap_or_else(|_| NULL_TEXT.to_string())
}

fn error_message(e: &sqlx::Error) -> String {
    match e {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BatchExecutor {
    protocol: LanguageProtocol,
}

impl BatchExecutor {
    pub fn new(protocol: LanguageProtocol) -> Self {
        Self { protocol }
    }
}

#[async_trait]
impl Executor for BatchExecutor {
    fn protocol(&self) -> &LanguageProtocol {
        &self.protocol
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        match run_batch(&request.source).await {
            Ok(log) if log.is_empty() => ExecutionOutcome::success("No statements to execute."),
            Ok(log) => ExecutionOutcome::success(log),
            Err(e) => ExecutionOutcome::internal(format!(
                "Failed to open in-memory database: {}",
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_drops_empty_statements() {
        assert_eq!(
            split_statements("SELECT 1;; \n SELECT 2 ;\n"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn keeps_separators_inside_quotes_and_comments() {
        let script = "INSERT INTO t VALUES ('a;b', 'it''s');\n-- note; here\nSELECT \"x;y\" /* ; */ FROM t";
        assert_eq!(
            split_statements(script),
            vec![
                "INSERT INTO t VALUES ('a;b', 'it''s')",
                "SELECT \"x;y\"   FROM t"
            ]
        );
    }

    #[test]
    fn trigger_bodies_stay_in_one_statement() {
        let script = "CREATE TEMP TRIGGER tr AFTER INSERT ON t BEGIN\n  INSERT INTO log VALUES (new.x);\n  UPDATE c SET n = CASE WHEN n > 0 THEN n + 1 ELSE 1 END;\nEND; SELECT 1";
        let statements = split_statements(script);
        assert_eq!(statements.len(), 2, "{statements:?}");
        assert!(statements[0].ends_with("END"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn transactions_still_split() {
        assert_eq!(
            split_statements("BEGIN; INSERT INTO t VALUES (1); END;"),
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "END"]
        );
    }

    #[tokio::test]
    async fn triggers_run_as_a_single_statement() {
        let log = run_batch(
            "CREATE TABLE t(x); CREATE TABLE audit(v);
             CREATE TRIGGER copy AFTER INSERT ON t BEGIN INSERT INTO audit VALUES (new.x * 10); END;
             INSERT INTO t VALUES (5);
             SELECT v FROM audit;",
        )
        .await
        .unwrap();

        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            vec![STATEMENT_OK, STATEMENT_OK, STATEMENT_OK, STATEMENT_OK, "v", "---", "50"]
        );
    }

    #[tokio::test]
    async fn create_insert_select() {
        let log = run_batch("CREATE TABLE t(x); INSERT INTO t VALUES (1); SELECT * FROM t;")
            .await
            .unwrap();

        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, vec![STATEMENT_OK, STATEMENT_OK, "x", "---", "1"]);
    }

    #[tokio::test]
    async fn formats_multiple_columns_and_types() {
        let log = run_batch(
            "CREATE TABLE p(name TEXT, score REAL, note TEXT);
             INSERT INTO p VALUES ('ada', 9.5, NULL), ('bob', 7, 'late');
             SELECT name, score, note FROM p ORDER BY name;",
        )
        .await
        .unwrap();

        assert!(log.contains("name | score | note"));
        assert!(log.contains("ada | 9.5 | NULL"));
        assert!(log.contains("bob | 7 | late"));
    }

    #[tokio::test]
    async fn empty_query_result_still_prints_headers() {
        let log = run_batch("CREATE TABLE t(x); SELECT x FROM t;").await.unwrap();
        assert!(log.ends_with("x\n---"));
    }

    #[tokio::test]
    async fn stops_at_first_error() {
        let log = run_batch("SELEC 1; CREATE TABLE t(x); SELECT 2;").await.unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error: "), "{log}");
        assert!(lines[0].contains("syntax error"), "{log}");
    }

    #[tokio::test]
    async fn earlier_results_survive_a_later_error() {
        let log = run_batch("CREATE TABLE t(x); INSERT INTO missing VALUES (1); SELECT 1;")
            .await
            .unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], STATEMENT_OK);
        assert!(lines[1].contains("no such table"));
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn every_call_gets_a_fresh_database() {
        run_batch("CREATE TABLE t(x);").await.unwrap();
        let log = run_batch("SELECT * FROM t;").await.unwrap();
        assert!(log.starts_with("Error: "));
    }

    #[tokio::test]
    async fn executor_always_reports_success() {
        let exec = BatchExecutor::new(LanguageProtocol::builtin(crate::protocol::Language::Sql));
        let req = ExecutionRequest::new(crate::protocol::Language::Sql, "SELEC 1;");
        assert!(exec.execute(&req).await.is_success());

        let req = ExecutionRequest::new(crate::protocol::Language::Sql, "  ;  ");
        assert_eq!(
            exec.execute(&req).await,
            ExecutionOutcome::success("No statements to execute.")
        );
    }
}
