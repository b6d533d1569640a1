//! Generation inputs and the assembled document.
//!
//! A [`Document`] is produced fresh by every generation request and has no mutators. A new
//! focus or system name means a new document.

use crate::constants::DEFAULT_ITEM_ID_SUFFIX;
use crate::validator::ValidationReport;
use crate::{ItemDefError, ItemDefResult};
use chrono::{DateTime, Utc};
use itemdef_types::{NonEmptyText, SectionId};
use serde::Serialize;
use uuid::Uuid;

/// Whether sections are generated or left as guidance placeholders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Full,
    Template,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Full => f.write_str("full"),
            GenerationMode::Template => f.write_str("template"),
        }
    }
}

/// Immutable per-request input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationContext {
    system_name: NonEmptyText,
    system_id: Option<NonEmptyText>,
    focus_section_id: Option<String>,
    mode: GenerationMode,
    requested_at: DateTime<Utc>,
}

impl GenerationContext {
    /// Context for a fully generated document.
    ///
    /// Blank `system_id` and `focus_section_id` values are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::InvalidInput`] if `system_name` is blank.
    pub fn full(
        system_name: &str,
        system_id: Option<&str>,
        focus_section_id: Option<&str>,
    ) -> ItemDefResult<Self> {
        Ok(Self {
            system_name: parse_system_name(system_name)?,
            system_id: system_id.and_then(|v| NonEmptyText::new(v).ok()),
            focus_section_id: focus_section_id
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            mode: GenerationMode::Full,
            requested_at: Utc::now(),
        })
    }

    /// Context for a blank annotated template.
    pub fn template(system_name: &str) -> ItemDefResult<Self> {
        Ok(Self {
            system_name: parse_system_name(system_name)?,
            system_id: None,
            focus_section_id: None,
            mode: GenerationMode::Template,
            requested_at: Utc::now(),
        })
    }

    pub fn system_name(&self) -> &NonEmptyText {
        &self.system_name
    }

    pub fn system_id(&self) -> Option<&NonEmptyText> {
        self.system_id.as_ref()
    }

    pub fn focus_section_id(&self) -> Option<&str> {
        self.focus_section_id.as_deref()
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// When the request was made. Used as the document timestamp and for `{datetime_now}`.
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Item id used in prompts and metadata.
    ///
    /// The supplied system id, or one derived from the system name, for example
    /// `BATTERY_MANAGEMENT_SYSTEM_DEFAULT`.
    pub fn item_id(&self) -> String {
        match &self.system_id {
            Some(id) => id.to_string(),
            None => format!(
                "{}{}",
                self.system_name.as_str().to_uppercase().replace(' ', "_"),
                DEFAULT_ITEM_ID_SUFFIX
            ),
        }
    }
}

fn parse_system_name(system_name: &str) -> ItemDefResult<NonEmptyText> {
    NonEmptyText::new(system_name)
        .map_err(|_| ItemDefError::InvalidInput("system_name cannot be empty".into()))
}

/// Output of generating one section.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionResult {
    pub id: SectionId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_ref: Option<String>,
    /// Generated text, or the guidance stub in template mode.
    pub content: String,
    pub is_placeholder: bool,
    /// Target length handed to the backend.
    pub word_budget: u32,
    /// Effective weight the budget was derived from.
    pub weight: f64,
}

/// Descriptive metadata of a generated document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub document_id: Uuid,
    pub system_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    pub item_id: String,
    pub mode: GenerationMode,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_section_id: Option<SectionId>,
    pub schema_title: String,
    pub work_product: String,
}

/// A complete item definition: sections in schema order plus metadata and validation report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Document {
    metadata: DocumentMetadata,
    sections: Vec<SectionResult>,
    validation_report: ValidationReport,
}

impl Document {
    pub(crate) fn new(
        metadata: DocumentMetadata,
        sections: Vec<SectionResult>,
        validation_report: ValidationReport,
    ) -> Self {
        Self {
            metadata,
            sections,
            validation_report,
        }
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn sections(&self) -> &[SectionResult] {
        &self.sections
    }

    pub fn validation_report(&self) -> &ValidationReport {
        &self.validation_report
    }

    pub fn mode(&self) -> GenerationMode {
        self.metadata.mode
    }

    /// Serialise the document as pretty JSON for an external persistence sink.
    pub fn to_json(&self) -> ItemDefResult<String> {
        serde_json::to_string_pretty(self).map_err(ItemDefError::Serialization)
    }

    /// Serialise the document as YAML.
    pub fn to_yaml(&self) -> ItemDefResult<String> {
        serde_yaml::to_string(self).map_err(ItemDefError::YamlSerialization)
    }
}
