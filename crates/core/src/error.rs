use crate::backend::BackendError;
use itemdef_types::SectionId;

/// Errors returned by the item definition engine.
///
/// `SchemaLoad`, `UnknownSection` and `GenerationBackend` abort a request before a
/// [`Document`](crate::Document) is produced. Validation problems are never errors; they are
/// reported as findings on the returned document.
#[derive(Debug, thiserror::Error)]
pub enum ItemDefError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load schema from {source_name}: {reason}")]
    SchemaLoad { source_name: String, reason: String },

    #[error("unknown section '{focus}': {reason}")]
    UnknownSection { focus: String, reason: String },

    #[error("content generation failed for section '{section_id}': {source}")]
    GenerationBackend {
        section_id: SectionId,
        #[source]
        source: BackendError,
    },

    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
}

impl ItemDefError {
    pub(crate) fn schema_load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaLoad {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

pub type ItemDefResult<T> = std::result::Result<T, ItemDefError>;
