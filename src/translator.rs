//! Dialect translator
//!
//! Rewrites warehouse-dialect SQL text into the form the engine's parser
//! accepts. Purely textual and stateless: no session or catalog state is
//! consulted, and running the output through the translator again changes
//! nothing.
//!
//! ## Rewrite families
//!
//! - function renames: `EDITDISTANCE` -> `LEVENSHTEIN`, `LEN` -> `LENGTH`, ...
//! - argument-shape rewrites: `ZEROIFNULL(x)` -> `COALESCE(x, 0)`,
//!   `SQUARE(x)` -> `POWER(x, 2)`, single-argument `TO_VARCHAR(x)` ->
//!   `CAST(x AS VARCHAR)`
//! - type keywords: `NUMBER(p, s)` -> `DECIMAL(p, s)`, bare `NUMBER` ->
//!   `DECIMAL(38, 0)`, `STRING`/`TEXT`/`VARIANT`/`OBJECT` -> `VARCHAR`,
//!   `TIMESTAMP_NTZ`/`TIMESTAMP_LTZ`/`TIMESTAMP_TZ`/`DATETIME` -> `TIMESTAMP`
//!
//! The rewrites are regex-driven over raw text, but single-quoted string
//! literals are left untouched: a match whose start falls inside a literal
//! is skipped.

use regex::Regex;

/// Translate one statement's text. Idempotent.
pub fn translate(sql: &str) -> String {
    let mut result = sql.to_string();

    result = rename_functions(&result);
    result = rewrite_zeroifnull(&result);
    result = rewrite_nullifzero(&result);
    result = rewrite_square(&result);
    result = rewrite_to_varchar(&result);
    result = rewrite_type_keywords(&result);

    result
}

fn rename_functions(sql: &str) -> String {
    // name-for-name renames, applied only at a call site
    const RENAMES: &[(&str, &str)] = &[
        (r"(?i)\bEDITDISTANCE\s*\(", "LEVENSHTEIN("),
        (r"(?i)\bLEN\s*\(", "LENGTH("),
        (r"(?i)\bSTARTSWITH\s*\(", "STARTS_WITH("),
        (r"(?i)\bENDSWITH\s*\(", "ENDS_WITH("),
        (r"(?i)\bIFNULL\s*\(", "NVL("),
        (r"(?i)\bGETDATE\s*\(\s*\)", "NOW()"),
        (r"(?i)\bSYSDATE\s*\(\s*\)", "NOW()"),
    ];

    let mut result = sql.to_string();
    for (pattern, replacement) in RENAMES {
        let re = Regex::new(pattern).unwrap();
        result = replace_unquoted(&result, &re, replacement);
    }
    result
}

fn rewrite_zeroifnull(sql: &str) -> String {
    rewrite_call(sql, "ZEROIFNULL", &|args| {
        format!("COALESCE({}, 0)", args.join(", "))
    })
}

fn rewrite_nullifzero(sql: &str) -> String {
    rewrite_call(sql, "NULLIFZERO", &|args| {
        format!("NULLIF({}, 0)", args.join(", "))
    })
}

fn rewrite_square(sql: &str) -> String {
    rewrite_call(sql, "SQUARE", &|args| {
        format!("POWER({}, 2)", args.join(", "))
    })
}

/// `TO_VARCHAR(x)` with one argument becomes a cast; the two-argument
/// format form is left for the engine to reject.
fn rewrite_to_varchar(sql: &str) -> String {
    rewrite_call(sql, "TO_VARCHAR", &|args| {
        if args.len() == 1 {
            format!("CAST({} AS VARCHAR)", args[0])
        } else {
            format!("TO_VARCHAR({})", args.join(", "))
        }
    })
}

fn rewrite_type_keywords(sql: &str) -> String {
    const TYPES: &[(&str, &str)] = &[
        // parenthesized NUMBER keeps its precision and scale
        (r"(?i)\bNUMBER\s*\(", "DECIMAL("),
        (r"(?i)\bNUMBER\b", "DECIMAL(38, 0)"),
        (r"(?i)\bSTRING\b", "VARCHAR"),
        (r"(?i)\bTEXT\b", "VARCHAR"),
        (r"(?i)\bVARIANT\b", "VARCHAR"),
        (r"(?i)\bOBJECT\b", "VARCHAR"),
        (r"(?i)\bTIMESTAMP_NTZ\b", "TIMESTAMP"),
        (r"(?i)\bTIMESTAMP_LTZ\b", "TIMESTAMP"),
        (r"(?i)\bTIMESTAMP_TZ\b", "TIMESTAMP"),
        (r"(?i)\bDATETIME\b", "TIMESTAMP"),
    ];

    let mut result = sql.to_string();
    for (pattern, replacement) in TYPES {
        let re = Regex::new(pattern).unwrap();
        result = replace_unquoted(&result, &re, replacement);
    }
    result
}

/// `Regex::replace_all`, except matches inside single-quoted literals are
/// left alone.
fn replace_unquoted(sql: &str, re: &Regex, replacement: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut last = 0usize;
    for m in re.find_iter(sql) {
        if in_string_literal(sql, m.start()) {
            continue;
        }
        result.push_str(&sql[last..m.start()]);
        result.push_str(replacement);
        last = m.end();
    }
    result.push_str(&sql[last..]);
    result
}

fn in_string_literal(sql: &str, pos: usize) -> bool {
    sql.bytes().take(pos).filter(|&b| b == b'\'').count() % 2 == 1
}

/// Rewrite every `name(...)` call site, handling nested parentheses and
/// quoted strings. Inner occurrences are rewritten before the enclosing
/// call so nesting resolves innermost-first.
fn rewrite_call(sql: &str, name: &str, build: &dyn Fn(&[String]) -> String) -> String {
    let pattern = Regex::new(&format!(r"(?i)\b{}\s*\(", regex::escape(name))).unwrap();

    let mut result = sql.to_string();
    let mut pos = 0usize;
    while let Some(m) = pattern.find_at(&result, pos) {
        if in_string_literal(&result, m.start()) {
            pos = m.end();
            continue;
        }
        let open = m.end() - 1;
        let Some(close) = matching_paren(&result, open) else {
            break;
        };
        let inner = rewrite_call(&result[open + 1..close], name, build);
        let args = split_top_level_args(&inner);
        let replacement = build(&args);
        let start = m.start();
        result.replace_range(start..=close, &replacement);
        // Skip past the rewritten text so an output that still contains the
        // call name (the untouched TO_VARCHAR format form) cannot loop.
        pos = start + replacement.len();
    }
    result
}

/// Index of the `)` matching the `(` at `open`, skipping single-quoted
/// string literals.
fn matching_paren(sql: &str, open: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split an argument list on commas at parenthesis depth zero.
pub(crate) fn split_top_level_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth = depth.saturating_sub(1),
            b',' if !in_string && depth == 0 => {
                args.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    args
}
