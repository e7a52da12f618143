use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::catalog::{self, FieldSpec};
use crate::core::types::{MODEL_MEMBERSHIP_PREDICATE, ObjectProfile, REL_PRED_OBJ_SEPARATOR};

/// One indexed value. Text for string fields, Long for range-queryable
/// epoch-millisecond timestamps and numeric local ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEntry {
    Text(String),
    Long(i64),
}

/// The per-object indexable projection. Built fresh on every update call and
/// superseded, never merged, by the next update for the same identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub pid: String,
    pub fields: BTreeMap<String, Vec<FieldEntry>>,
}

impl IndexDocument {
    pub fn new(pid: &str) -> Self {
        IndexDocument {
            pid: pid.to_string(),
            fields: BTreeMap::new(),
        }
    }

    pub fn add_text(&mut self, field: &str, value: String) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(FieldEntry::Text(value));
    }

    pub fn add_long(&mut self, field: &str, value: i64) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(FieldEntry::Long(value));
    }

    pub fn texts<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> {
        self.fields
            .get(field)
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                FieldEntry::Text(text) => Some(text.as_str()),
                FieldEntry::Long(_) => None,
            })
    }

    pub fn longs<'a>(&'a self, field: &str) -> impl Iterator<Item = i64> + 'a {
        self.fields
            .get(field)
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                FieldEntry::Long(value) => Some(*value),
                FieldEntry::Text(_) => None,
            })
    }
}

/// Lower-case the value and index it twice, plain and sentinel-wrapped.
/// The wrapped sibling is what anchors EQUALS queries to whole values.
fn push_text(doc: &mut IndexDocument, spec: &FieldSpec, value: &str) {
    let lowered = value.to_lowercase();
    doc.add_text(spec.exact_name, catalog::exact_wrap(&lowered));
    doc.add_text(spec.name, lowered);
}

/// Build the index record for one repository object, or `None` when the
/// object carries no indexable fields at all.
pub fn build_document(profile: &ObjectProfile) -> Option<IndexDocument> {
    let mut doc = IndexDocument::new(&profile.pid);

    // The identifier is stored exactly once, verbatim. The decomposed parts
    // support namespace-scoped and suffix-scoped queries, the numeric form
    // supports highest-identifier lookups for auto-numbering.
    doc.add_text("pid", profile.pid.clone());
    if let Some((namespace, local)) = profile.pid.split_once(':') {
        if !namespace.is_empty() && !local.is_empty() {
            doc.add_text(catalog::PID_NAMESPACE, namespace.to_string());
            doc.add_text(catalog::PID_LOCAL, local.to_string());
            if let Ok(numeric) = local.parse::<i64>() {
                doc.add_long(catalog::PID_NUM, numeric);
            }
        }
    }
    let identifier_entries = doc.fields.len();

    for (name, value) in [
        ("state", &profile.state),
        ("label", &profile.label),
        ("owner", &profile.owner_id),
    ] {
        if let Some(value) = value {
            if !value.is_empty() {
                if let Some(spec) = catalog::lookup(name) {
                    push_text(&mut doc, spec, value);
                }
            }
        }
    }

    for (name, value) in [
        ("cdate", &profile.create_date),
        ("mdate", &profile.modified_date),
        ("dcmdate", &profile.dcm_date),
    ] {
        if let Some(date) = value {
            doc.add_long(name, date.timestamp_millis());
        }
    }

    for (element, value) in &profile.dc_fields {
        if value.is_empty() {
            continue;
        }
        let Some(spec) = catalog::lookup(element) else {
            warn!(element = %element, "descriptive element not in catalog, skipping");
            continue;
        };
        // The generic "date" element keeps its raw text because descriptive
        // dates are not guaranteed to be parseable; the parsed form is added
        // alongside when parsing succeeds.
        if spec.is_date {
            if let Some(millis) = crate::core::dates::parse_date_millis(value) {
                doc.add_long(spec.name, millis);
            }
        }
        push_text(&mut doc, spec, value);
    }

    for relationship in &profile.relationships {
        if relationship.predicate == MODEL_MEMBERSHIP_PREDICATE {
            continue;
        }
        if relationship.object.is_empty() {
            continue;
        }
        if let Some(spec) = catalog::lookup("relobj") {
            push_text(&mut doc, spec, &relationship.object);
        }
        if let Some(spec) = catalog::lookup("relpredobj") {
            let combined = format!(
                "{}{}{}",
                relationship.predicate, REL_PRED_OBJ_SEPARATOR, relationship.object
            );
            push_text(&mut doc, spec, &combined);
        }
    }

    // Identifier-only records are not worth a document.
    if doc.fields.len() == identifier_entries {
        return None;
    }
    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::catalog::{EXACT_CLOSE, EXACT_OPEN};

    fn profile() -> ObjectProfile {
        let mut p = ObjectProfile::new("demo:12");
        p.state = Some("Active".to_string());
        p.label = Some("A Test Object".to_string());
        p.owner_id = Some("repoAdmin".to_string());
        p.create_date = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        p
    }

    #[test]
    fn pid_is_verbatim_and_decomposed() {
        let doc = build_document(&profile()).unwrap();
        assert_eq!(doc.texts("pid").collect::<Vec<_>>(), vec!["demo:12"]);
        assert_eq!(
            doc.texts(catalog::PID_NAMESPACE).collect::<Vec<_>>(),
            vec!["demo"]
        );
        assert_eq!(doc.texts(catalog::PID_LOCAL).collect::<Vec<_>>(), vec!["12"]);
        assert_eq!(doc.longs(catalog::PID_NUM).collect::<Vec<_>>(), vec![12]);
    }

    #[test]
    fn text_fields_are_lowercased_with_exact_siblings() {
        let doc = build_document(&profile()).unwrap();
        assert_eq!(doc.texts("label").collect::<Vec<_>>(), vec!["a test object"]);
        let exact: Vec<_> = doc.texts("label_exact").collect();
        assert_eq!(exact.len(), 1);
        assert!(exact[0].starts_with(EXACT_OPEN));
        assert!(exact[0].ends_with(EXACT_CLOSE));
        assert!(exact[0].contains("a test object"));
    }

    #[test]
    fn timestamps_become_epoch_longs() {
        let doc = build_document(&profile()).unwrap();
        let expected = Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap()
            .timestamp_millis();
        assert_eq!(doc.longs("cdate").collect::<Vec<_>>(), vec![expected]);
    }

    #[test]
    fn dc_date_keeps_raw_text_and_parsed_value() {
        let p = ObjectProfile::new("demo:1")
            .with_dc_field("date", "2024-06-01")
            .with_dc_field("date", "circa 1900");
        let doc = build_document(&p).unwrap();
        let texts: Vec<_> = doc.texts("date").collect();
        assert_eq!(texts, vec!["2024-06-01", "circa 1900"]);
        assert_eq!(doc.longs("date").count(), 1);
    }

    #[test]
    fn model_membership_relationship_is_not_indexed() {
        let p = ObjectProfile::new("demo:1")
            .with_dc_field("title", "anything")
            .with_relationship(MODEL_MEMBERSHIP_PREDICATE, "model:thing")
            .with_relationship("info:repo/rel#isPartOf", "demo:parent");
        let doc = build_document(&p).unwrap();
        let objects: Vec<_> = doc.texts("relobj").collect();
        assert_eq!(objects, vec!["demo:parent"]);
        let combined: Vec<_> = doc.texts("relpredobj").collect();
        assert_eq!(combined, vec!["info:repo/rel#ispartof|demo:parent"]);
    }

    #[test]
    fn empty_record_produces_no_document() {
        let p = ObjectProfile::new("demo:1");
        assert!(build_document(&p).is_none());

        let blank = ObjectProfile::new("demo:1").with_dc_field("title", "");
        assert!(build_document(&blank).is_none());
    }
}
