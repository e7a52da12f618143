use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::catalog::FieldSpec;
use crate::core::dates;
use crate::core::types::{MODEL_MEMBERSHIP_PREDICATE, ObjectProfile, REL_PRED_OBJ_SEPARATOR};

/// Lightweight per-object record holding only the requested result fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectFields {
    pub pid: String,
    pub values: BTreeMap<&'static str, Vec<String>>,
}

impl ObjectFields {
    pub fn values_of(&self, field: &str) -> &[String] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One page of an ordered, resumable search result. `cursor` is the starting
/// offset of this page; `complete_list_size` is the snapshot size fixed at
/// search time; `token`/`expiration` are `None` once the result is fully
/// returned.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub results: Vec<ObjectFields>,
    pub token: Option<String>,
    pub cursor: usize,
    pub complete_list_size: usize,
    pub expiration: Option<DateTime<Utc>>,
}

/// Extract the requested fields from a resolved object.
pub fn project(profile: &ObjectProfile, fields: &[&'static FieldSpec]) -> ObjectFields {
    let mut values: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for spec in fields {
        let extracted: Vec<String> = match spec.name {
            "pid" => vec![profile.pid.clone()],
            "state" => profile.state.iter().cloned().collect(),
            "label" => profile.label.iter().cloned().collect(),
            "owner" => profile.owner_id.iter().cloned().collect(),
            "cdate" => profile.create_date.iter().map(dates::format_date).collect(),
            "mdate" => profile.modified_date.iter().map(dates::format_date).collect(),
            "dcmdate" => profile.dcm_date.iter().map(dates::format_date).collect(),
            "relobj" => profile
                .relationships
                .iter()
                .filter(|rel| rel.predicate != MODEL_MEMBERSHIP_PREDICATE)
                .map(|rel| rel.object.clone())
                .collect(),
            "relpredobj" => profile
                .relationships
                .iter()
                .filter(|rel| rel.predicate != MODEL_MEMBERSHIP_PREDICATE)
                .map(|rel| {
                    format!("{}{}{}", rel.predicate, REL_PRED_OBJ_SEPARATOR, rel.object)
                })
                .collect(),
            name => profile
                .dc_values(name)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        if !extracted.is_empty() {
            values.insert(spec.name, extracted);
        }
    }
    ObjectFields {
        pid: profile.pid.clone(),
        values,
    }
}
