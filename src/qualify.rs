//! Table-name qualification
//!
//! The engine knows tables only under their full `database.schema.table`
//! path. Before a generic statement is handed over, every unqualified table
//! reference is prefixed with the session's current namespace:
//! `t` -> `db.schema.t`, `sc.t` -> `db.sc.t`, fully qualified names pass
//! through untouched. The output is stable under re-qualification.
//!
//! Like the translator this works on raw text, anchored on the keywords
//! that introduce a table reference (FROM, JOIN, INTO, UPDATE). Guards
//! keep it away from the FROM inside EXTRACT / TRIM / SUBSTRING, from
//! `IS DISTINCT FROM`, from table-function calls, and from CTE names.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{Error, Result};

/// Prefix unqualified table references with the current namespace.
///
/// Fails with a missing-context error when a bare name needs a prefix the
/// session cannot supply.
pub fn qualify(sql: &str, database: Option<&str>, schema: Option<&str>) -> Result<String> {
    let reference = Regex::new(
        r"(?i)\b(FROM|JOIN|INTO|UPDATE)\s+([A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)*)",
    )
    .unwrap();

    let cte_names = collect_cte_names(sql);
    let operation = sql
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase();

    // (insert position, prefix) pairs, applied back-to-front
    let mut edits: Vec<(usize, String)> = Vec::new();

    for cap in reference.captures_iter(sql) {
        let keyword = match cap.get(1) {
            Some(k) => k,
            None => continue,
        };
        let name = match cap.get(2) {
            Some(n) => n,
            None => continue,
        };

        // table functions: FROM generate_series(...)
        if sql[name.end()..].trim_start().starts_with('(') {
            continue;
        }
        if is_guarded_from(sql, keyword.start(), keyword.as_str()) {
            continue;
        }

        let upper = name.as_str().to_uppercase();
        if matches!(upper.as_str(), "LATERAL" | "UNNEST" | "VALUES") {
            continue;
        }

        let parts: Vec<&str> = name.as_str().split('.').collect();
        let prefix = match parts.len() {
            1 => {
                if cte_names.contains(&upper) {
                    continue;
                }
                let db = database
                    .ok_or_else(|| Error::NoCurrentDatabase(operation.clone()))?;
                let sc = schema
                    .ok_or_else(|| Error::NoCurrentSchema(operation.clone()))?;
                format!("{}.{}.", db.to_lowercase(), sc.to_lowercase())
            }
            2 => {
                let db = database
                    .ok_or_else(|| Error::NoCurrentDatabase(operation.clone()))?;
                format!("{}.", db.to_lowercase())
            }
            _ => continue,
        };
        edits.push((name.start(), prefix));
    }

    let mut result = sql.to_string();
    for (pos, prefix) in edits.into_iter().rev() {
        result.insert_str(pos, &prefix);
    }
    Ok(result)
}

/// FROM occurrences that do not introduce a table reference: the separator
/// inside EXTRACT / SUBSTRING / TRIM / OVERLAY, and `IS [NOT] DISTINCT FROM`.
fn is_guarded_from(sql: &str, keyword_start: usize, keyword: &str) -> bool {
    if !keyword.eq_ignore_ascii_case("FROM") {
        return false;
    }
    let before = &sql[..keyword_start];
    let guard = Regex::new(
        r"(?i)\b(YEAR|QUARTER|MONTH|WEEK|DAY|DAYOFWEEK|DAYOFYEAR|HOUR|MINUTE|SECOND|EPOCH|MILLISECOND|MICROSECOND|NANOSECOND|LEADING|TRAILING|BOTH|DISTINCT)$",
    )
    .unwrap();
    if guard.is_match(before.trim_end()) {
        return true;
    }
    match enclosing_call(before) {
        Some(name) => matches!(
            name.to_uppercase().as_str(),
            "SUBSTRING" | "SUBSTR" | "TRIM" | "EXTRACT" | "OVERLAY"
        ),
        None => false,
    }
}

/// Name of the function call the position sits inside, if any: the word
/// before the innermost unclosed parenthesis.
fn enclosing_call(before: &str) -> Option<&str> {
    let mut in_string = false;
    let mut opens: Vec<usize> = Vec::new();
    for (i, b) in before.bytes().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => opens.push(i),
            b')' if !in_string => {
                opens.pop();
            }
            _ => {}
        }
    }
    let open = *opens.last()?;
    let head = before[..open].trim_end();
    let start = head
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &head[start..];
    (!name.is_empty()).then_some(name)
}

/// Names bound by a WITH clause; they must stay unqualified.
fn collect_cte_names(sql: &str) -> HashSet<String> {
    let pattern =
        Regex::new(r"(?i)(?:\bWITH|,)\s*([A-Za-z_][A-Za-z0-9_$]*)\s+AS\s*\(").unwrap();
    pattern
        .captures_iter(sql)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(sql: &str) -> String {
        qualify(sql, Some("SALES"), Some("PUBLIC")).unwrap()
    }

    #[test]
    fn bare_name_gets_database_and_schema() {
        assert_eq!(
            q("SELECT * FROM orders"),
            "SELECT * FROM sales.public.orders"
        );
        assert_eq!(
            q("INSERT INTO orders VALUES (1)"),
            "INSERT INTO sales.public.orders VALUES (1)"
        );
        assert_eq!(
            q("UPDATE orders SET x = 1"),
            "UPDATE sales.public.orders SET x = 1"
        );
    }

    #[test]
    fn partial_name_gets_database_only() {
        assert_eq!(
            q("SELECT * FROM staging.orders"),
            "SELECT * FROM sales.staging.orders"
        );
    }

    #[test]
    fn full_name_passes_through() {
        let sql = "SELECT * FROM other.sc.orders";
        assert_eq!(q(sql), sql);
    }

    #[test]
    fn qualification_is_stable() {
        let once = q("SELECT a.x FROM orders a JOIN items b ON a.id = b.id");
        assert_eq!(q(&once), once);
    }

    #[test]
    fn joins_are_qualified() {
        assert_eq!(
            q("SELECT * FROM orders o JOIN items i ON o.id = i.oid"),
            "SELECT * FROM sales.public.orders o JOIN sales.public.items i ON o.id = i.oid"
        );
    }

    #[test]
    fn extract_and_trim_from_are_left_alone() {
        assert_eq!(
            q("SELECT EXTRACT(YEAR FROM created) FROM orders"),
            "SELECT EXTRACT(YEAR FROM created) FROM sales.public.orders"
        );
        assert_eq!(
            q("SELECT TRIM(LEADING 'x' FROM name) FROM orders"),
            "SELECT TRIM(LEADING 'x' FROM name) FROM sales.public.orders"
        );
        assert_eq!(
            q("SELECT SUBSTRING('abcdef' FROM 2) FROM orders"),
            "SELECT SUBSTRING('abcdef' FROM 2) FROM sales.public.orders"
        );
    }

    #[test]
    fn literal_and_numeric_select_items_do_not_mask_the_from() {
        assert_eq!(q("SELECT 1 FROM orders"), "SELECT 1 FROM sales.public.orders");
        assert_eq!(
            q("SELECT 'label' FROM orders"),
            "SELECT 'label' FROM sales.public.orders"
        );
        assert_eq!(
            q("SELECT COUNT(*) FROM orders"),
            "SELECT COUNT(*) FROM sales.public.orders"
        );
    }

    #[test]
    fn is_distinct_from_is_left_alone() {
        assert_eq!(
            q("SELECT * FROM orders WHERE a IS DISTINCT FROM b"),
            "SELECT * FROM sales.public.orders WHERE a IS DISTINCT FROM b"
        );
    }

    #[test]
    fn cte_names_stay_unqualified() {
        assert_eq!(
            q("WITH recent AS (SELECT * FROM orders) SELECT * FROM recent"),
            "WITH recent AS (SELECT * FROM sales.public.orders) SELECT * FROM recent"
        );
        assert_eq!(
            q("WITH a AS (SELECT 1), b AS (SELECT * FROM orders) SELECT * FROM a JOIN b ON true"),
            "WITH a AS (SELECT 1), b AS (SELECT * FROM sales.public.orders) SELECT * FROM a JOIN b ON true"
        );
    }

    #[test]
    fn table_functions_are_not_qualified() {
        let sql = "SELECT * FROM generate_series(1, 10)";
        assert_eq!(q(sql), sql);
    }

    #[test]
    fn missing_context_is_an_error() {
        assert!(matches!(
            qualify("SELECT * FROM orders", None, None),
            Err(Error::NoCurrentDatabase(_))
        ));
        assert!(matches!(
            qualify("SELECT * FROM sc.orders", None, None),
            Err(Error::NoCurrentDatabase(_))
        ));
        // fully qualified names never need session context
        assert!(qualify("SELECT * FROM a.b.c", None, None).is_ok());
    }
}
