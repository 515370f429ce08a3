// SQL Auto-Fix Service
//
// Rewrites two known defect classes in generated SQL before execution.
// These are text-level rules, not a parser; anything outside the two
// patterns is left untouched.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Date literal substituted for un-instantiated `YYYY-MM-DD` placeholders
pub const FALLBACK_DATE: &str = "2024-01-01";

const AGGREGATE_FUNCTIONS: &str = "MAX|MIN|SUM|COUNT|AVG";

#[derive(Debug, Error)]
pub enum SqlFixError {
    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("SELECT clause for {column} not found in subquery at offset {offset}")]
    SelectClauseNotFound { column: String, offset: usize },
}

/// Deterministic, rule-based SQL corrector
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlFixer;

impl SqlFixer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every rewrite rule in order
    ///
    /// Never fails: if a rule errors, the input is returned unchanged.
    pub fn fix(&self, sql: &str) -> String {
        if sql.trim().is_empty() {
            return sql.to_string();
        }

        match Self::apply_rules(sql) {
            Ok(fixed) => {
                if fixed != sql {
                    tracing::info!("SQL fixed:\nOriginal: {}\nFixed: {}", sql, fixed);
                }
                fixed
            }
            Err(e) => {
                tracing::warn!("Failed to fix SQL, returning original: {}", e);
                sql.to_string()
            }
        }
    }

    fn apply_rules(sql: &str) -> Result<String, SqlFixError> {
        let fixed = Self::replace_date_placeholders(sql)?;
        Self::fix_subquery_group_by(&fixed)
    }

    /// Replace `'YYYY-MM-DD'`, `"YYYY-MM-DD"` and bare `YYYY-MM-DD` with a real date
    ///
    /// A placeholder inside a longer string literal (`'YYYY-MM-DD 00:00:00'`)
    /// only gets the date text; the literal already supplies the quotes.
    fn replace_date_placeholders(sql: &str) -> Result<String, SqlFixError> {
        let placeholder = RegexBuilder::new(r#"'YYYY-MM-DD'|"YYYY-MM-DD"|\bYYYY-MM-DD\b"#)
            .case_insensitive(true)
            .build()?;

        let quoted = format!("'{}'", FALLBACK_DATE);
        Ok(placeholder
            .replace_all(sql, |caps: &regex::Captures| {
                let start = caps.get(0).map_or(0, |m| m.start());
                if inside_string_literal(sql, start) {
                    FALLBACK_DATE.to_string()
                } else {
                    quoted.clone()
                }
            })
            .into_owned())
    }

    /// Wrap the bare column of `(SELECT a.col FROM t a GROUP BY EXTRACT(...` in MAX()
    fn fix_subquery_group_by(sql: &str) -> Result<String, SqlFixError> {
        let pattern = RegexBuilder::new(
            r"\(SELECT\s+(\w+)\.(\w+)\s+FROM\s+\w+\s+(\w+)\s+GROUP\s+BY\s+EXTRACT\s*\(",
        )
        .case_insensitive(true)
        .build()?;
        let has_aggregate = RegexBuilder::new(&format!(r"SELECT\s+({})\s*\(", AGGREGATE_FUNCTIONS))
            .case_insensitive(true)
            .build()?;

        let matches: Vec<(usize, String)> = pattern
            .captures_iter(sql)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let alias = caps.get(1)?.as_str();
                let column = caps.get(2)?.as_str();
                let table_alias = caps.get(3)?.as_str();

                // The selected column must belong to the subquery's own table alias
                alias
                    .eq_ignore_ascii_case(table_alias)
                    .then(|| (whole.start(), format!("{}.{}", alias, column)))
            })
            .collect();

        let mut fixed = sql.to_string();

        // Last match first so earlier offsets stay valid
        for (start, column_ref) in matches.into_iter().rev() {
            let Some(end) = find_matching_paren(&fixed, start) else {
                tracing::debug!("Unbalanced subquery at offset {}, skipping", start);
                continue;
            };

            let subquery = &fixed[start..=end];
            if has_aggregate.is_match(subquery) {
                continue;
            }

            let select_clause = Regex::new(&format!(
                r"(?i)SELECT\s+{}\s+FROM",
                regex::escape(&column_ref)
            ))?;
            if !select_clause.is_match(subquery) {
                return Err(SqlFixError::SelectClauseNotFound {
                    column: column_ref,
                    offset: start,
                });
            }

            let replacement = format!("SELECT MAX({}) FROM", column_ref);
            let rewritten = select_clause
                .replacen(subquery, 1, regex::NoExpand(&replacement))
                .into_owned();

            fixed.replace_range(start..=end, &rewritten);
        }

        Ok(fixed)
    }
}

/// Whether byte `offset` falls inside a single-quoted literal (`''` escapes keep parity)
fn inside_string_literal(sql: &str, offset: usize) -> bool {
    sql.as_bytes()[..offset]
        .iter()
        .filter(|&&byte| byte == b'\'')
        .count()
        % 2
        == 1
}

/// Byte offset of the `)` closing the `(` at `open`, if balanced
fn find_matching_paren(sql: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in sql.as_bytes().iter().enumerate().skip(open) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    None
}
