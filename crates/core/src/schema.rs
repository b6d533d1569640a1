//! Section schema loading, validation and caching.
//!
//! The schema is the single source of truth for which sections an item definition contains,
//! in which order they appear and how much generation budget each one receives by default.
//!
//! Schemas are YAML documents:
//!
//! ```yaml
//! metadata:
//!   title: ISO 26262 Item Definition
//!   work_product: Item Definition (ISO 26262-3:2018, 5.5.1)
//! sections:
//!   - id: item_description
//!     title: Item Description and Scope
//!     order: 1
//!     required: true
//!     default_weight: 1.0
//!     guidance: Identify the item and its purpose.
//!     references: []
//! ```
//!
//! [`SchemaStore`] parses a source once, validates the invariants below and caches the result
//! as an immutable [`Schema`] snapshot:
//! - section ids are unique
//! - `order` is strictly increasing
//! - every referenced id exists and is not the referencing section itself
//! - `default_weight` is finite and positive, and the weights sum to a finite total

use crate::constants::{BUILTIN_SCHEMA_NAME, BUILTIN_SCHEMA_YAML};
use crate::{ItemDefError, ItemDefResult};
use itemdef_types::{NonEmptyText, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Document-level metadata carried by a schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchemaMetadata {
    /// Document title, for example "ISO 26262 Item Definition".
    pub title: NonEmptyText,
    /// Work product the document fulfils.
    pub work_product: NonEmptyText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<String>,
}

/// One section entry of the schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionSchema {
    pub id: SectionId,
    pub title: NonEmptyText,
    /// Position of the section in the document. Strictly increasing across a schema.
    pub order: i64,
    pub required: bool,
    /// Relative generation budget before any focus is applied.
    pub default_weight: f64,
    /// Instructions shown in template mode and handed to the backend in full mode.
    pub guidance: NonEmptyText,
    /// Sections this section must be consistent with.
    pub references: BTreeSet<SectionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_ref: Option<String>,
    /// Generation instruction with `{system_name}`, `{system_id}` and `{datetime_now}`
    /// placeholders. Falls back to `guidance` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// A validated schema snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Schema {
    metadata: SchemaMetadata,
    sections: Vec<SectionSchema>,
}

impl Schema {
    pub fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    /// Sections in ascending `order`.
    pub fn sections(&self) -> &[SectionSchema] {
        &self.sections
    }

    pub fn section(&self, id: &SectionId) -> Option<&SectionSchema> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Sum of all default weights.
    pub fn default_total_weight(&self) -> f64 {
        self.sections.iter().map(|s| s.default_weight).sum()
    }
}

/// Where a schema is read from.
#[derive(Clone, Debug)]
pub enum SchemaSource {
    /// YAML file on disk.
    File(PathBuf),
    /// YAML text held in memory, labelled with `name` for error messages.
    Inline { name: String, yaml: String },
    /// The ISO 26262-3 item definition schema compiled into this crate.
    Builtin,
}

impl SchemaSource {
    /// Human readable name used in errors and logs.
    pub fn name(&self) -> String {
        match self {
            SchemaSource::File(path) => path.display().to_string(),
            SchemaSource::Inline { name, .. } => name.clone(),
            SchemaSource::Builtin => BUILTIN_SCHEMA_NAME.to_string(),
        }
    }

    fn read(&self) -> ItemDefResult<String> {
        match self {
            SchemaSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| ItemDefError::schema_load(self.name(), format!("cannot read: {e}"))),
            SchemaSource::Inline { yaml, .. } => Ok(yaml.clone()),
            SchemaSource::Builtin => Ok(BUILTIN_SCHEMA_YAML.to_string()),
        }
    }
}

/// Loads and caches the section schema.
///
/// Reads share the cached `Arc<Schema>`; [`SchemaStore::reload`] swaps the cache under an
/// exclusive lock. Callers holding an older snapshot keep using it until they drop it.
#[derive(Debug)]
pub struct SchemaStore {
    source: SchemaSource,
    cache: RwLock<Option<Arc<Schema>>>,
}

impl SchemaStore {
    pub fn new(source: SchemaSource) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Store backed by the built-in ISO 26262-3 schema.
    pub fn builtin() -> Self {
        Self::new(SchemaSource::Builtin)
    }

    /// Returns the cached schema, parsing and validating the source on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::SchemaLoad`] if the source is missing, is not valid YAML, does
    /// not match the schema layout, or violates a schema invariant.
    pub fn load(&self) -> ItemDefResult<Arc<Schema>> {
        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(schema));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the cache while we waited for the write lock.
        if let Some(schema) = cache.as_ref() {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(self.read_and_parse()?);
        tracing::info!(
            source = %self.source.name(),
            sections = schema.len(),
            "loaded item definition schema"
        );
        *cache = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Re-reads and re-validates the source, replacing the cached schema.
    ///
    /// On failure the previously cached schema stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::SchemaLoad`] under the same conditions as [`SchemaStore::load`].
    pub fn reload(&self) -> ItemDefResult<Arc<Schema>> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let schema = match self.read_and_parse() {
            Ok(schema) => Arc::new(schema),
            Err(e) => {
                tracing::warn!(source = %self.source.name(), error = %e, "schema reload failed");
                return Err(e);
            }
        };
        tracing::info!(
            source = %self.source.name(),
            sections = schema.len(),
            "reloaded item definition schema"
        );
        *cache = Some(Arc::clone(&schema));
        Ok(schema)
    }

    fn read_and_parse(&self) -> ItemDefResult<Schema> {
        let text = self.source.read()?;
        parse_schema(&text, &self.source.name())
    }
}

/// Parse and validate schema YAML.
///
/// Uses `serde_path_to_error` so that layout errors name the offending field, for example
/// `sections[2].default_weight`.
///
/// # Arguments
///
/// * `yaml_text` - Schema document with `metadata` and `sections`
/// * `source_name` - Label of the source, used in error messages
///
/// # Returns
///
/// A validated [`Schema`] with sections in ascending `order`.
///
/// # Errors
///
/// Returns [`ItemDefError::SchemaLoad`] if the text is not valid YAML, contains unknown or
/// missing fields, or breaks an invariant listed in the module documentation.
pub fn parse_schema(yaml_text: &str, source_name: &str) -> ItemDefResult<Schema> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    let wire = match serde_path_to_error::deserialize::<_, SchemaWire>(deserializer) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            return Err(ItemDefError::schema_load(
                source_name,
                format!("schema mismatch at {path}: {source}"),
            ));
        }
    };

    wire_to_domain(wire, source_name)
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaWire {
    metadata: MetadataWire,
    #[serde(default)]
    sections: Vec<SectionWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataWire {
    title: NonEmptyText,
    work_product: NonEmptyText,
    #[serde(default)]
    standard: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionWire {
    id: String,
    title: NonEmptyText,
    order: i64,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default = "default_weight")]
    default_weight: f64,
    guidance: NonEmptyText,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    clause_ref: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

fn default_required() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn wire_to_domain(wire: SchemaWire, source_name: &str) -> ItemDefResult<Schema> {
    let fail = |reason: String| ItemDefError::schema_load(source_name, reason);

    let mut seen: HashSet<SectionId> = HashSet::new();
    let mut sections = Vec::with_capacity(wire.sections.len());
    let mut previous_order: Option<i64> = None;

    for (index, section) in wire.sections.into_iter().enumerate() {
        let id = SectionId::parse(&section.id)
            .map_err(|e| fail(format!("sections[{index}].id: {e}")))?;

        if !seen.insert(id.clone()) {
            return Err(fail(format!("duplicate section id '{id}'")));
        }

        if let Some(prev) = previous_order {
            if section.order <= prev {
                return Err(fail(format!(
                    "section '{id}' has order {} which does not follow {prev}; order must be strictly increasing",
                    section.order
                )));
            }
        }
        previous_order = Some(section.order);

        if !section.default_weight.is_finite() || section.default_weight <= 0.0 {
            return Err(fail(format!(
                "section '{id}' has default_weight {} which must be a positive number",
                section.default_weight
            )));
        }

        let mut references = BTreeSet::new();
        for reference in &section.references {
            let reference = SectionId::parse(reference)
                .map_err(|e| fail(format!("section '{id}' references: {e}")))?;
            if reference == id {
                return Err(fail(format!("section '{id}' references itself")));
            }
            references.insert(reference);
        }

        sections.push(SectionSchema {
            id,
            title: section.title,
            order: section.order,
            required: section.required,
            default_weight: section.default_weight,
            guidance: section.guidance,
            references,
            clause_ref: non_blank(section.clause_ref),
            prompt: non_blank(section.prompt),
        });
    }

    let total: f64 = sections.iter().map(|s| s.default_weight).sum();
    if !total.is_finite() {
        return Err(fail(format!(
            "sum of default_weight values overflows ({total}); reduce the weights"
        )));
    }

    // References may point forwards, so they can only be checked once every id is known.
    for section in &sections {
        if let Some(missing) = section.references.iter().find(|r| !seen.contains(*r)) {
            return Err(fail(format!(
                "section '{}' references unknown section '{missing}'",
                section.id
            )));
        }
    }

    Ok(Schema {
        metadata: SchemaMetadata {
            title: wire.metadata.title,
            work_product: wire.metadata.work_product,
            standard: non_blank(wire.metadata.standard),
        },
        sections,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
