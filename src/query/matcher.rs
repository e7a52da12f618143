use std::num::NonZeroUsize;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use tracing::warn;
use crate::catalog::CATALOG;
use crate::index::document::IndexDocument;
use crate::query::builder::{Clause, CompiledQuery};

const PATTERN_CACHE_SIZE: usize = 256;

/// Evaluates compiled queries against index documents. Wildcard patterns are
/// compiled to anchored regexes once and cached.
pub struct DocumentMatcher {
    patterns: Mutex<LruCache<String, Option<Regex>>>,
}

impl DocumentMatcher {
    pub fn new() -> Self {
        let cap = NonZeroUsize::new(PATTERN_CACHE_SIZE).unwrap();
        DocumentMatcher {
            patterns: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn matches(&self, doc: &IndexDocument, query: &CompiledQuery) -> bool {
        match query {
            CompiledQuery::MatchAll => true,
            CompiledQuery::And(clauses) => {
                clauses.iter().all(|clause| self.matches_clause(doc, clause))
            }
            CompiledQuery::AnyField(term) => self.matches_any_field(doc, term),
        }
    }

    fn matches_clause(&self, doc: &IndexDocument, clause: &Clause) -> bool {
        match clause {
            Clause::TermExact { field, text } => doc.texts(field).any(|t| t == text),
            Clause::Contains { field, needle } => {
                doc.texts(field).any(|t| t.contains(needle.as_str()))
            }
            Clause::Wildcard { field, pattern } => {
                self.with_pattern(pattern, |re| doc.texts(field).any(|t| re.is_match(t)))
            }
            Clause::DateEq { field, millis } => doc.longs(field).any(|v| v == *millis),
            Clause::DateRange {
                field,
                lower,
                upper,
                incl_lower,
                incl_upper,
            } => doc.longs(field).any(|v| {
                let above = if *incl_lower { v >= *lower } else { v > *lower };
                let below = if *incl_upper { v <= *upper } else { v < *upper };
                above && below
            }),
        }
    }

    /// CONTAINS semantics for the free-text term, across every catalog
    /// field. At least one field has to match.
    fn matches_any_field(&self, doc: &IndexDocument, term: &str) -> bool {
        let wildcarded = term.contains('*') || term.contains('?');
        for spec in &CATALOG {
            for text in doc.texts(spec.name) {
                // The identifier is the one field stored with case preserved.
                let hay = text.to_lowercase();
                let hit = if wildcarded {
                    self.with_pattern(term, |re| re.is_match(&hay))
                } else {
                    hay.contains(term)
                };
                if hit {
                    return true;
                }
            }
        }
        false
    }

    fn with_pattern<F: FnOnce(&Regex) -> bool>(&self, pattern: &str, check: F) -> bool {
        let mut cache = self.patterns.lock();
        let compiled = cache.get_or_insert(pattern.to_string(), || {
            match Regex::new(&wildcard_to_regex(pattern)) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(%pattern, %err, "unusable wildcard pattern");
                    None
                }
            }
        });
        match compiled {
            Some(re) => check(re),
            None => false,
        }
    }
}

impl Default for DocumentMatcher {
    fn default() -> Self {
        DocumentMatcher::new()
    }
}

/// Translate `*`/`?` wildcards into an anchored whole-value regex, escaping
/// everything else.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}
