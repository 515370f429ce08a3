// Pagination Engine
//
// Reconciles a LIMIT written by the AI service with the page/pageSize the
// caller asked for. Small result sets run untouched; large ones get a
// LIMIT/OFFSET window that never reaches past the upstream LIMIT.

use regex::RegexBuilder;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error)]
enum PaginationError {
    #[error("invalid LIMIT pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("offset overflow for page {page} with page size {page_size}")]
    OffsetOverflow { page: u32, page_size: u32 },
}

/// Outcome of paginating one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationDecision {
    /// Statement before pagination, shown to the user and used for row counts
    pub original_sql: String,
    /// Statement that gets executed
    pub executable_sql: String,
    /// LIMIT the AI service wrote (or supplied out of band)
    pub upstream_limit: Option<u64>,
    /// Whether a LIMIT/OFFSET window was applied
    pub paginated: bool,
}

impl PaginationDecision {
    fn unchanged(sql: &str, upstream_limit: Option<u64>) -> Self {
        Self {
            original_sql: sql.to_string(),
            executable_sql: sql.to_string(),
            upstream_limit,
            paginated: false,
        }
    }
}

/// Parameters for a single pagination request
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    /// Row-count estimate reported by the AI service
    pub row_estimate: Option<u64>,
    /// Upstream LIMIT known from elsewhere, used when the text has none
    pub upstream_limit_override: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            row_estimate: None,
            upstream_limit_override: None,
        }
    }

    pub fn with_row_estimate(mut self, row_estimate: Option<u64>) -> Self {
        self.row_estimate = row_estimate;
        self
    }

    pub fn with_upstream_limit(mut self, limit: Option<u64>) -> Self {
        self.upstream_limit_override = limit;
        self
    }
}

/// Top-level LIMIT clause found in the statement text
enum UpstreamLimit {
    /// `LIMIT <n> [OFFSET <m>]` occupying byte range `span`
    Parsed { value: u64, span: Range<usize> },
    /// `LIMIT` followed by something that is not a number
    Malformed { span: Range<usize> },
}

/// Stateless pagination engine configured with the large-dataset threshold
#[derive(Debug, Clone, Copy)]
pub struct PaginationEngine {
    threshold: u64,
}

impl PaginationEngine {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Decide whether `sql` needs pagination and build the executable statement
    ///
    /// Fails closed: any internal error yields the original statement.
    pub fn paginate(&self, sql: &str, request: PageRequest) -> PaginationDecision {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return PaginationDecision::unchanged(sql, None);
        }

        match self.try_paginate(trimmed, request) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("Pagination failed, executing original SQL: {}", e);
                PaginationDecision::unchanged(trimmed, request.upstream_limit_override)
            }
        }
    }

    fn try_paginate(&self, sql: &str, request: PageRequest) -> Result<PaginationDecision, PaginationError> {
        let detected = find_upstream_limit(sql)?;

        let (upstream_limit, clause, malformed) = match detected {
            Some(UpstreamLimit::Parsed { value, span }) => (Some(value), Some(span), false),
            Some(UpstreamLimit::Malformed { span }) => (None, Some(span), true),
            None => (request.upstream_limit_override, None, false),
        };

        let small_estimate = request.row_estimate.is_some_and(|rows| rows <= self.threshold);
        let small_limit = upstream_limit.is_some_and(|limit| limit <= self.threshold);

        if !malformed && (small_estimate || small_limit) {
            tracing::debug!(
                "Skipping pagination (estimate: {:?}, upstream limit: {:?}, threshold: {})",
                request.row_estimate,
                upstream_limit,
                self.threshold
            );
            return Ok(PaginationDecision::unchanged(sql, upstream_limit));
        }

        let base = match clause {
            Some(span) => {
                let before = sql[..span.start].trim_end();
                let after = sql[span.end..].trim_start();
                if after.is_empty() || after.starts_with(';') {
                    before.to_string()
                } else {
                    format!("{} {}", before, after)
                }
            }
            None => sql.to_string(),
        };
        let base = base.trim_end().trim_end_matches(';').trim_end();

        let page_size = u64::from(request.page_size);
        let offset = u64::from(request.page.saturating_sub(1))
            .checked_mul(page_size)
            .ok_or(PaginationError::OffsetOverflow {
                page: request.page,
                page_size: request.page_size,
            })?;

        // Pages past the upstream LIMIT legitimately return zero rows
        let effective_limit = upstream_limit
            .map(|limit| limit.saturating_sub(offset).min(page_size))
            .unwrap_or(page_size);

        let executable_sql = format!("{} LIMIT {} OFFSET {};", base, effective_limit, offset);

        tracing::debug!(
            "Applied pagination: LIMIT {} OFFSET {} (upstream limit: {:?})",
            effective_limit,
            offset,
            upstream_limit
        );

        Ok(PaginationDecision {
            original_sql: sql.to_string(),
            executable_sql,
            upstream_limit,
            paginated: true,
        })
    }
}

impl Default for PaginationEngine {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Locate the first top-level LIMIT clause and parse the number that follows it
fn find_upstream_limit(sql: &str) -> Result<Option<UpstreamLimit>, PaginationError> {
    let keyword = RegexBuilder::new(r"\bLIMIT\b").case_insensitive(true).build()?;
    let clause = RegexBuilder::new(r"^LIMIT\s+([^\s;)]+)(\s+OFFSET\s+[^\s;)]+)?")
        .case_insensitive(true)
        .build()?;

    // LIMITs inside subqueries or string literals belong to the inner query
    let Some(found) = keyword
        .find_iter(sql)
        .find(|m| is_top_level(sql, m.start()))
    else {
        return Ok(None);
    };

    let start = found.start();
    let Some(caps) = clause.captures(&sql[start..]) else {
        return Ok(Some(UpstreamLimit::Malformed { span: start..found.end() }));
    };

    let span = start..start + caps.get(0).map_or(found.len(), |m| m.end());
    let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    let limit = match value.parse::<u64>() {
        Ok(value) => UpstreamLimit::Parsed { value, span },
        Err(_) => UpstreamLimit::Malformed { span },
    };
    Ok(Some(limit))
}

/// Whether byte `offset` sits outside every parenthesis and string literal
fn is_top_level(sql: &str, offset: usize) -> bool {
    let mut depth = 0usize;
    let mut in_literal = false;

    for byte in &sql.as_bytes()[..offset] {
        match byte {
            b'\'' => in_literal = !in_literal,
            b'(' if !in_literal => depth += 1,
            b')' if !in_literal => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth == 0 && !in_literal
}
