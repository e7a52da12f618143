use serde::{Deserialize, Serialize};

/// Comparison operators. The four relational operators are legal on date
/// fields only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    Contains,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::Contains => "~",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
        }
    }
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl Condition {
    pub fn new(field: &str, operator: Operator, value: &str) -> Self {
        Condition {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }
}

/// A structured query. Either the conjunction of conditions or a single
/// free-text term matched against every catalog field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSearchQuery {
    Conditions(Vec<Condition>),
    Terms(String),
}

impl FieldSearchQuery {
    pub fn terms(terms: &str) -> Self {
        FieldSearchQuery::Terms(terms.to_string())
    }

    pub fn condition(field: &str, operator: Operator, value: &str) -> Self {
        FieldSearchQuery::Conditions(vec![Condition::new(field, operator, value)])
    }
}
