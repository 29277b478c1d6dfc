//! Label extraction from agent-produced log documents
//!
//! Every document is read against one fixed table of fields. Missing or
//! wrongly shaped parts of a document only shrink the label set; nothing
//! here fails the caller.

use crate::document::{lookup, scalar_text, section};
use crate::errors::ExtractionFault;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Flat label name to label value mapping attached to a log line.
pub type LabelMap = BTreeMap<String, String>;

/// Where a label is read from in a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: &'static str,
    /// Top-level section holding the field, `None` for the document root
    pub section: Option<&'static str>,
    pub path: &'static [&'static str],
}

impl FieldSpec {
    const fn new(
        label: &'static str,
        section: Option<&'static str>,
        path: &'static [&'static str],
    ) -> Self {
        Self { label, section, path }
    }

    /// Dotted source path, used in diagnostics.
    pub fn dotted_path(&self) -> String {
        match self.section {
            Some(name) => format!("{}.{}", name, self.path.join(".")),
            None => self.path.join("."),
        }
    }
}

/// Sections read by [`LABEL_FIELDS`], logged for every document.
pub const SECTIONS: [&str; 6] = ["kubernetes", "host", "container", "agent", "ecs", "log"];

/// The complete label schema, in extraction order.
pub const LABEL_FIELDS: [FieldSpec; 15] = [
    FieldSpec::new("app", Some("kubernetes"), &["labels", "app"]),
    FieldSpec::new("namespace", Some("kubernetes"), &["namespace"]),
    FieldSpec::new("pod_name", Some("kubernetes"), &["pod", "name"]),
    FieldSpec::new("deployment_name", Some("kubernetes"), &["deployment", "name"]),
    FieldSpec::new("node_name", Some("kubernetes"), &["node", "name"]),
    FieldSpec::new("container_name", Some("kubernetes"), &["container", "name"]),
    FieldSpec::new("container_runtime", Some("container"), &["runtime"]),
    FieldSpec::new("host_os_name", Some("host"), &["os", "name"]),
    FieldSpec::new("host_os_version", Some("host"), &["os", "version"]),
    FieldSpec::new("agent_version", Some("agent"), &["version"]),
    FieldSpec::new("ecs_version", Some("ecs"), &["version"]),
    FieldSpec::new("stream", None, &["stream"]),
    FieldSpec::new("index_name", None, &["indexname"]),
    FieldSpec::new("import_month", None, &["fields", "import_month"]),
    FieldSpec::new("imported", None, &["fields", "imported"]),
];

/// Stringified null some upstream stages emit instead of omitting a field.
const NONE_SENTINEL: &str = "None";

type RawLabels = Vec<(&'static str, Option<String>)>;

/// Extract the label set for one document.
///
/// Returns `None` when no label survives cleaning, so callers can tell
/// "nothing found" apart from a populated map.
pub fn extract_labels(source: &Value) -> Option<LabelMap> {
    debug!("Source data: {}", source);

    for name in SECTIONS {
        debug!(section_name = name, "Section snapshot: {}", section(source, name));
    }

    let labels = clean_labels(read_labels(source));
    debug!("Extracted labels: {:?}", labels);
    labels
}

/// Read every field of the table. A field whose value cannot be a label is
/// logged and left absent; the remaining fields are still read.
fn read_labels(source: &Value) -> RawLabels {
    LABEL_FIELDS
        .iter()
        .map(|field| match read_label(source, field) {
            Ok(value) => (field.label, value),
            Err(fault) => {
                warn!(
                    label = fault.label,
                    source = %source,
                    "Skipping label: {}",
                    fault
                );
                (field.label, None)
            }
        })
        .collect()
}

fn read_label(source: &Value, field: &FieldSpec) -> Result<Option<String>, ExtractionFault> {
    let root = match field.section {
        Some(name) => section(source, name),
        None => source,
    };

    match lookup(root, field.path) {
        Some(leaf) => scalar_text(leaf).map_err(|found| ExtractionFault {
            label: field.label,
            path: field.dotted_path(),
            found,
        }),
        None => Ok(None),
    }
}

/// Drop absent values and the `"None"` sentinel; an empty result is `None`.
pub fn clean_labels<K, I>(raw: I) -> Option<LabelMap>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Option<String>)>,
{
    let labels: LabelMap = raw
        .into_iter()
        .filter_map(|(label, value)| match value {
            Some(value) if value != NONE_SENTINEL => Some((label.into(), value)),
            _ => None,
        })
        .collect();

    (!labels.is_empty()).then_some(labels)
}
