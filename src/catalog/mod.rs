use tracing::warn;

/// Descriptor for one indexable field. Query and document construction branch
/// on `is_date` instead of per-field subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Sibling field holding sentinel-wrapped values for anchored
    /// whole-value matching. EQUALS queries target this field, CONTAINS
    /// queries target the plain one.
    pub exact_name: &'static str,
    pub is_date: bool,
}

/// The closed vocabulary of indexable fields.
pub const CATALOG: [FieldSpec; 24] = [
    FieldSpec { name: "pid", exact_name: "pid", is_date: false },
    FieldSpec { name: "label", exact_name: "label_exact", is_date: false },
    FieldSpec { name: "state", exact_name: "state_exact", is_date: false },
    FieldSpec { name: "owner", exact_name: "owner_exact", is_date: false },
    FieldSpec { name: "cdate", exact_name: "cdate_exact", is_date: true },
    FieldSpec { name: "mdate", exact_name: "mdate_exact", is_date: true },
    FieldSpec { name: "title", exact_name: "title_exact", is_date: false },
    FieldSpec { name: "creator", exact_name: "creator_exact", is_date: false },
    FieldSpec { name: "subject", exact_name: "subject_exact", is_date: false },
    FieldSpec { name: "description", exact_name: "description_exact", is_date: false },
    FieldSpec { name: "publisher", exact_name: "publisher_exact", is_date: false },
    FieldSpec { name: "contributor", exact_name: "contributor_exact", is_date: false },
    FieldSpec { name: "date", exact_name: "date_exact", is_date: true },
    FieldSpec { name: "type", exact_name: "type_exact", is_date: false },
    FieldSpec { name: "format", exact_name: "format_exact", is_date: false },
    FieldSpec { name: "identifier", exact_name: "identifier_exact", is_date: false },
    FieldSpec { name: "source", exact_name: "source_exact", is_date: false },
    FieldSpec { name: "language", exact_name: "language_exact", is_date: false },
    FieldSpec { name: "relation", exact_name: "relation_exact", is_date: false },
    FieldSpec { name: "coverage", exact_name: "coverage_exact", is_date: false },
    FieldSpec { name: "rights", exact_name: "rights_exact", is_date: false },
    FieldSpec { name: "dcmdate", exact_name: "dcmdate_exact", is_date: true },
    FieldSpec { name: "relobj", exact_name: "relobj_exact", is_date: false },
    FieldSpec { name: "relpredobj", exact_name: "relpredobj_exact", is_date: false },
];

/// Internal fields carrying the decomposed identifier. Not part of the
/// catalog, addressable only through identifier query rewriting.
pub const PID_NAMESPACE: &str = "pid_namespace";
pub const PID_LOCAL: &str = "pid_local";
pub const PID_NUM: &str = "pid_num";

/// Sentinel start/end markers anchoring substring-based exact matching.
pub const EXACT_OPEN: char = '\u{2}';
pub const EXACT_CLOSE: char = '\u{3}';

/// Wrap a value in the exact-match sentinels.
pub fn exact_wrap(value: &str) -> String {
    let mut wrapped = String::with_capacity(value.len() + 2);
    wrapped.push(EXACT_OPEN);
    wrapped.push_str(value);
    wrapped.push(EXACT_CLOSE);
    wrapped
}

/// Resolve a field name against the catalog.
pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Timestamp fields are indexed as range-queryable numbers only. The generic
/// "date" field comes from descriptive metadata and additionally keeps its
/// raw text.
pub fn has_raw_text(spec: &FieldSpec) -> bool {
    !spec.is_date || spec.name == "date"
}

/// Keep the requested result fields that resolve against the catalog.
/// Unknown names are dropped with a warning, never an error.
pub fn filter_result_fields(names: &[String]) -> Vec<&'static FieldSpec> {
    let mut specs = Vec::with_capacity(names.len());
    for name in names {
        match lookup(name) {
            Some(spec) => specs.push(spec),
            None => warn!(field = %name, "unknown result field, ignoring"),
        }
    }
    specs
}
