use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relationship predicate that holds for nearly every object. Carries no
/// discriminating value, so it is never indexed.
pub const MODEL_MEMBERSHIP_PREDICATE: &str = "info:repo/def/model#hasModel";

/// Separator between predicate and object in the combined relationship field.
pub const REL_PRED_OBJ_SEPARATOR: char = '|';

/// A single relationship fact asserted by a repository object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub predicate: String,
    pub object: String,
}

impl Relationship {
    pub fn new(predicate: &str, object: &str) -> Self {
        Relationship {
            predicate: predicate.to_string(),
            object: object.to_string(),
        }
    }
}

/// Current projection of a repository object, as pushed by the primary store
/// on every update event and re-read while materializing result pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectProfile {
    pub pid: String,
    pub state: Option<String>,
    pub label: Option<String>,
    pub owner_id: Option<String>,
    pub create_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
    /// Descriptive metadata as (element, value) pairs, one entry per
    /// occurrence. Element names are catalog field names.
    pub dc_fields: Vec<(String, String)>,
    pub dcm_date: Option<DateTime<Utc>>,
    pub relationships: Vec<Relationship>,
}

impl ObjectProfile {
    pub fn new(pid: &str) -> Self {
        ObjectProfile {
            pid: pid.to_string(),
            ..ObjectProfile::default()
        }
    }

    pub fn with_dc_field(mut self, element: &str, value: &str) -> Self {
        self.dc_fields.push((element.to_string(), value.to_string()));
        self
    }

    pub fn with_relationship(mut self, predicate: &str, object: &str) -> Self {
        self.relationships.push(Relationship::new(predicate, object));
        self
    }

    /// All values recorded for one descriptive element, in document order.
    pub fn dc_values(&self, element: &str) -> Vec<&str> {
        self.dc_fields
            .iter()
            .filter(|(name, _)| name == element)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}
