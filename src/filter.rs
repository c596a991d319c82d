//! Call filtering for `-e call=` expressions
//!
//! Supports:
//! - Individual calls: -e call=glClear,glFlush
//! - Regex patterns: -e call=/^glDraw/
//! - Negation: -e call=!glGetError,!/^glGet/

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// Call filter that determines which decoded calls are shown
#[derive(Debug, Clone)]
pub struct CallFilter {
    /// Names to include (None with no patterns = all calls)
    include: Option<HashSet<String>>,
    include_patterns: Vec<Regex>,
    exclude: HashSet<String>,
    exclude_patterns: Vec<Regex>,
}

impl CallFilter {
    /// Create a filter that includes all calls
    pub fn all() -> Self {
        Self {
            include: None,
            include_patterns: Vec::new(),
            exclude: HashSet::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Parse a filter expression like "call=glClear,/^glDraw/,!glFlush"
    pub fn from_expr(expr: &str) -> Result<Self> {
        if let Some(spec) = expr.strip_prefix("call=") {
            Self::from_call_spec(spec)
        } else {
            bail!(
                "Invalid filter expression: {}. Expected format: call=SPEC",
                expr
            );
        }
    }

    fn from_call_spec(spec: &str) -> Result<Self> {
        let mut filter = Self::all();
        let mut include = HashSet::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (negated, part) = match part.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, part),
            };

            if let Some(pattern) = part
                .strip_prefix('/')
                .and_then(|p| p.strip_suffix('/'))
            {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid regex in filter: /{}/", pattern))?;
                if negated {
                    filter.exclude_patterns.push(regex);
                } else {
                    filter.include_patterns.push(regex);
                }
            } else if negated {
                filter.exclude.insert(part.to_string());
            } else {
                include.insert(part.to_string());
            }
        }

        if !include.is_empty() {
            filter.include = Some(include);
        }
        Ok(filter)
    }

    /// Check if a call should be shown
    pub fn should_show(&self, name: &str) -> bool {
        if self.exclude.contains(name) || self.exclude_patterns.iter().any(|r| r.is_match(name)) {
            return false;
        }

        let has_includes = self.include.is_some() || !self.include_patterns.is_empty();
        if !has_includes {
            return true; // No include list = show all
        }

        self.include.as_ref().is_some_and(|set| set.contains(name))
            || self.include_patterns.iter().any(|r| r.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_all_shows_everything() {
        let filter = CallFilter::all();
        assert!(filter.should_show("glClear"));
        assert!(filter.should_show("anything"));
    }

    #[test]
    fn test_filter_individual_calls() {
        let filter = CallFilter::from_expr("call=glClear,glFlush").unwrap();
        assert!(filter.should_show("glClear"));
        assert!(filter.should_show("glFlush"));
        assert!(!filter.should_show("glFinish"));
    }

    #[test]
    fn test_filter_regex() {
        let filter = CallFilter::from_expr("call=/^glDraw/").unwrap();
        assert!(filter.should_show("glDrawArrays"));
        assert!(filter.should_show("glDrawElements"));
        assert!(!filter.should_show("glClear"));
    }

    #[test]
    fn test_filter_negation_only() {
        let filter = CallFilter::from_expr("call=!glGetError,!/^glX/").unwrap();
        assert!(filter.should_show("glClear"));
        assert!(!filter.should_show("glGetError"));
        assert!(!filter.should_show("glXSwapBuffers"));
    }

    #[test]
    fn test_filter_mixed() {
        let filter = CallFilter::from_expr("call=/^gl/,!glFlush").unwrap();
        assert!(filter.should_show("glClear"));
        assert!(!filter.should_show("glFlush"));
        assert!(!filter.should_show("eglSwapBuffers"));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CallFilter::from_expr("invalid").is_err());
        assert!(CallFilter::from_expr("call=/[unclosed/").is_err());
    }
}
