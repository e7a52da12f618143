use tracing::warn;
use crate::catalog::{self, FieldSpec};
use crate::core::config::Config;
use crate::core::dates;
use crate::core::error::{Error, ErrorKind, Result};
use crate::query::types::{Condition, FieldSearchQuery, Operator};

/// The engine's native query form, evaluated per document by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    /// Match everything currently live. Implemented as direct enumeration of
    /// live documents, never as a search.
    MatchAll,
    /// Logical AND of the surviving condition clauses.
    And(Vec<Clause>),
    /// Free-text term, a CONTAINS match ORed across every catalog field.
    AnyField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Whole-value equality on a verbatim field (identifier family).
    TermExact { field: String, text: String },
    /// Substring match. EQUALS conditions land here too, targeting the
    /// sentinel-wrapped sibling field so the substring is anchored.
    Contains { field: String, needle: String },
    /// Whole-value wildcard match, `*` and `?` patterns.
    Wildcard { field: String, pattern: String },
    DateEq { field: String, millis: i64 },
    DateRange {
        field: String,
        lower: i64,
        upper: i64,
        incl_lower: bool,
        incl_upper: bool,
    },
}

fn compile_error(condition: &Condition, reason: &str) -> Error {
    Error::new(
        ErrorKind::QueryParse,
        format!(
            "condition {}{}{}: {reason}",
            condition.field,
            condition.operator.symbol(),
            condition.value
        ),
    )
}

/// Compiles structured queries against the field catalog.
pub struct QueryBuilder {
    range_floor_ms: i64,
    range_ceiling_ms: i64,
}

impl QueryBuilder {
    pub fn new(config: &Config) -> Self {
        QueryBuilder {
            range_floor_ms: config.range_floor_ms,
            range_ceiling_ms: config.range_ceiling_ms,
        }
    }

    /// Compile a query. A condition that fails to compile is dropped with a
    /// warning rather than failing the whole query.
    pub fn compile(&self, query: &FieldSearchQuery) -> CompiledQuery {
        match query {
            FieldSearchQuery::Terms(terms) => {
                let trimmed = terms.trim();
                if trimmed.is_empty() || trimmed == "*" || trimmed == "?" {
                    CompiledQuery::MatchAll
                } else {
                    CompiledQuery::AnyField(trimmed.to_lowercase())
                }
            }
            FieldSearchQuery::Conditions(conditions) => {
                if conditions.is_empty() {
                    return CompiledQuery::MatchAll;
                }
                let mut clauses = Vec::with_capacity(conditions.len());
                for condition in conditions {
                    match self.compile_condition(condition) {
                        Ok(clause) => clauses.push(clause),
                        Err(err) => warn!(%err, "dropping uncompilable condition"),
                    }
                }
                CompiledQuery::And(clauses)
            }
        }
    }

    fn compile_condition(&self, condition: &Condition) -> Result<Clause> {
        let spec = catalog::lookup(&condition.field)
            .ok_or_else(|| compile_error(condition, "field is not in the catalog"))?;
        if condition.value.is_empty() {
            return Err(compile_error(condition, "empty value"));
        }
        if spec.name == "pid" {
            return self.compile_identifier(condition);
        }
        if spec.is_date {
            return self.compile_date(condition, spec);
        }
        self.compile_text(condition, spec)
    }

    /// Identifier conditions get their own rewriting: `*:` scopes to the
    /// local id, `:*` scopes to the namespace, any other wildcard matches
    /// the raw identifier, everything else is exact. Case is preserved.
    fn compile_identifier(&self, condition: &Condition) -> Result<Clause> {
        match condition.operator {
            Operator::Equals | Operator::Contains => {}
            _ => return Err(compile_error(condition, "operator not legal on the identifier")),
        }
        let value = condition.value.as_str();
        if let Some(at) = value.find("*:") {
            let local = &value[at + 2..];
            if local.is_empty() {
                return Err(compile_error(condition, "no local id after *:"));
            }
            return Ok(Clause::TermExact {
                field: catalog::PID_LOCAL.to_string(),
                text: local.to_string(),
            });
        }
        if let Some(at) = value.find(":*") {
            let namespace = &value[..at];
            if namespace.is_empty() {
                return Err(compile_error(condition, "no namespace before :*"));
            }
            return Ok(Clause::TermExact {
                field: catalog::PID_NAMESPACE.to_string(),
                text: namespace.to_string(),
            });
        }
        if value.contains('*') || value.contains('?') {
            return Ok(Clause::Wildcard {
                field: "pid".to_string(),
                pattern: value.to_string(),
            });
        }
        Ok(Clause::TermExact {
            field: "pid".to_string(),
            text: value.to_string(),
        })
    }

    fn compile_date(&self, condition: &Condition, spec: &FieldSpec) -> Result<Clause> {
        if condition.operator == Operator::Contains {
            return Err(compile_error(condition, "CONTAINS is not legal on a date field"));
        }
        let millis = dates::parse_date_millis(&condition.value);
        if condition.operator == Operator::Equals {
            if let Some(millis) = millis {
                return Ok(Clause::DateEq {
                    field: spec.name.to_string(),
                    millis,
                });
            }
            // Descriptive dates are not guaranteed to be parseable. EQUALS on
            // an unparseable value still works against the raw string where
            // one is indexed.
            if catalog::has_raw_text(spec) {
                let lowered = condition.value.to_lowercase();
                return Ok(Clause::Contains {
                    field: spec.exact_name.to_string(),
                    needle: catalog::exact_wrap(&lowered),
                });
            }
            return Err(compile_error(condition, "unparseable date value"));
        }

        let millis = millis.ok_or_else(|| compile_error(condition, "unparseable date value"))?;
        let (lower, upper, incl_lower, incl_upper) = match condition.operator {
            Operator::GreaterThan => (millis, self.range_ceiling_ms, false, true),
            Operator::GreaterOrEqual => (millis, self.range_ceiling_ms, true, true),
            Operator::LessThan => (self.range_floor_ms, millis, true, false),
            Operator::LessOrEqual => (self.range_floor_ms, millis, true, true),
            _ => unreachable!("equality handled above"),
        };
        Ok(Clause::DateRange {
            field: spec.name.to_string(),
            lower,
            upper,
            incl_lower,
            incl_upper,
        })
    }

    fn compile_text(&self, condition: &Condition, spec: &FieldSpec) -> Result<Clause> {
        let lowered = condition.value.to_lowercase();
        match condition.operator {
            // EQUALS targets the sentineled sibling, so embedded wildcard
            // characters are matched verbatim.
            Operator::Equals => Ok(Clause::Contains {
                field: spec.exact_name.to_string(),
                needle: catalog::exact_wrap(&lowered),
            }),
            Operator::Contains => {
                if lowered.contains('*') || lowered.contains('?') {
                    Ok(Clause::Wildcard {
                        field: spec.name.to_string(),
                        pattern: lowered,
                    })
                } else {
                    Ok(Clause::Contains {
                        field: spec.name.to_string(),
                        needle: lowered,
                    })
                }
            }
            _ => Err(compile_error(condition, "range operators are legal on date fields only")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::Condition;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(&Config::default())
    }

    fn single(condition: Condition) -> Vec<Clause> {
        match builder().compile(&FieldSearchQuery::Conditions(vec![condition])) {
            CompiledQuery::And(clauses) => clauses,
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn empty_queries_match_everything() {
        let b = builder();
        assert_eq!(b.compile(&FieldSearchQuery::Conditions(vec![])), CompiledQuery::MatchAll);
        for terms in ["", "   ", "*", "?"] {
            assert_eq!(b.compile(&FieldSearchQuery::terms(terms)), CompiledQuery::MatchAll);
        }
    }

    #[test]
    fn terms_are_lowercased() {
        assert_eq!(
            builder().compile(&FieldSearchQuery::terms("RuSt")),
            CompiledQuery::AnyField("rust".to_string())
        );
    }

    #[test]
    fn bad_conditions_are_dropped_not_fatal() {
        let query = FieldSearchQuery::Conditions(vec![
            Condition::new("nosuch", Operator::Equals, "x"),
            Condition::new("title", Operator::GreaterThan, "x"),
            Condition::new("cdate", Operator::Contains, "2024"),
            Condition::new("title", Operator::Equals, "keep me"),
        ]);
        let compiled = builder().compile(&query);
        match compiled {
            CompiledQuery::And(clauses) => assert_eq!(clauses.len(), 1),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn identifier_rewriting() {
        let clauses = single(Condition::new("pid", Operator::Contains, "demo:*"));
        assert_eq!(
            clauses[0],
            Clause::TermExact {
                field: catalog::PID_NAMESPACE.to_string(),
                text: "demo".to_string()
            }
        );

        let clauses = single(Condition::new("pid", Operator::Contains, "*:1"));
        assert_eq!(
            clauses[0],
            Clause::TermExact {
                field: catalog::PID_LOCAL.to_string(),
                text: "1".to_string()
            }
        );

        let clauses = single(Condition::new("pid", Operator::Contains, "de*o:1"));
        assert!(matches!(&clauses[0], Clause::Wildcard { field, .. } if field == "pid"));

        let clauses = single(Condition::new("pid", Operator::Equals, "Demo:1"));
        assert_eq!(
            clauses[0],
            Clause::TermExact {
                field: "pid".to_string(),
                text: "Demo:1".to_string()
            }
        );
    }

    #[test]
    fn equals_wraps_in_sentinels() {
        let clauses = single(Condition::new("title", Operator::Equals, "Exact Title"));
        assert_eq!(
            clauses[0],
            Clause::Contains {
                field: "title_exact".to_string(),
                needle: catalog::exact_wrap("exact title"),
            }
        );
    }

    #[test]
    fn literal_wildcard_under_equals_stays_literal() {
        let clauses = single(Condition::new("title", Operator::Equals, "*"));
        assert_eq!(
            clauses[0],
            Clause::Contains {
                field: "title_exact".to_string(),
                needle: catalog::exact_wrap("*"),
            }
        );
    }

    #[test]
    fn contains_with_wildcards_compiles_to_pattern() {
        let clauses = single(Condition::new("title", Operator::Contains, "Ru*t"));
        assert_eq!(
            clauses[0],
            Clause::Wildcard {
                field: "title".to_string(),
                pattern: "ru*t".to_string()
            }
        );
    }

    #[test]
    fn date_ranges_use_the_configured_open_ends() {
        let config = Config::default();
        let clauses = single(Condition::new("cdate", Operator::LessThan, "2024-01-01"));
        match &clauses[0] {
            Clause::DateRange { lower, upper, incl_lower, incl_upper, .. } => {
                assert_eq!(*lower, config.range_floor_ms);
                assert_eq!(*upper, dates::parse_date_millis("2024-01-01").unwrap());
                assert!(*incl_lower);
                assert!(!*incl_upper);
            }
            other => panic!("expected DateRange, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_generic_date_falls_back_to_raw_text() {
        let clauses = single(Condition::new("date", Operator::Equals, "Circa 1900"));
        assert_eq!(
            clauses[0],
            Clause::Contains {
                field: "date_exact".to_string(),
                needle: catalog::exact_wrap("circa 1900"),
            }
        );

        // Timestamp fields have no raw text to fall back to.
        let query = FieldSearchQuery::Conditions(vec![Condition::new(
            "cdate",
            Operator::Equals,
            "not a date",
        )]);
        match builder().compile(&query) {
            CompiledQuery::And(clauses) => assert!(clauses.is_empty()),
            other => panic!("expected And, got {other:?}"),
        }
    }
}
