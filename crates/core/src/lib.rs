//! # Item Definition Core
//!
//! Schema-driven generation of ISO 26262 Item Definition work products.
//!
//! This crate contains the generation engine:
//! - Loading and validating the section schema (YAML) with an atomically reloadable cache
//! - Resolving per-section weights, including the focus boost
//! - Generating section content through a pluggable [`ContentBackend`], or guidance
//!   placeholders in template mode
//! - Assembling the document in schema order and checking it for completeness
//! - Rendering documents to Markdown, JSON or YAML
//!
//! **No host concerns**: reading environment variables, parsing command lines, spawning
//! backend processes and installing a tracing subscriber belong in the `cli` crate.

pub mod assembler;
pub mod backend;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod generator;
pub mod markdown;
pub mod schema;
pub mod validator;
pub mod weights;

pub use assembler::DocumentAssembler;
pub use backend::{BackendError, BackendResult, ContentBackend, UnconfiguredBackend};
pub use config::{EngineConfig, GenerationStrategy};
pub use document::{Document, DocumentMetadata, GenerationContext, GenerationMode, SectionResult};
pub use error::{ItemDefError, ItemDefResult};
pub use itemdef_types::{NonEmptyText, SectionId};
pub use markdown::MarkdownRenderer;
pub use schema::{Schema, SchemaSource, SchemaStore, SectionSchema};
pub use validator::{CompletenessValidator, Severity, ValidationFinding, ValidationReport};

use constants::DEFAULT_SYSTEM_NAME;
use std::sync::Arc;

/// Entry point for callers: generates, describes and renders item definitions.
///
/// The service is cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct ItemDefinitionService {
    store: Arc<SchemaStore>,
    assembler: DocumentAssembler,
    validator: CompletenessValidator,
    renderer: MarkdownRenderer,
}

impl ItemDefinitionService {
    pub fn new(
        store: Arc<SchemaStore>,
        backend: Arc<dyn ContentBackend>,
        config: EngineConfig,
    ) -> Self {
        Self {
            assembler: DocumentAssembler::new(store.clone(), backend, config),
            store,
            validator: CompletenessValidator::new(),
            renderer: MarkdownRenderer::new(),
        }
    }

    /// Service without a content backend. Only templates and schema descriptions succeed.
    pub fn template_only(store: Arc<SchemaStore>, config: EngineConfig) -> Self {
        Self::new(store, Arc::new(UnconfiguredBackend), config)
    }

    /// Generate a complete item definition.
    ///
    /// # Arguments
    ///
    /// * `system_name` - Name of the system under definition; must not be blank
    /// * `system_id` - Item identifier; derived from the name when absent or blank
    /// * `focus` - Section id or full title to emphasise
    ///
    /// # Returns
    ///
    /// The generated [`Document`]. Completeness problems are reported in its validation
    /// report, not as errors.
    ///
    /// # Errors
    ///
    /// - [`ItemDefError::InvalidInput`] if `system_name` is blank
    /// - [`ItemDefError::SchemaLoad`] if the schema cannot be loaded
    /// - [`ItemDefError::UnknownSection`] if `focus` matches no section; nothing is generated
    /// - [`ItemDefError::GenerationBackend`] on the first failing section
    pub fn generate_document(
        &self,
        system_name: &str,
        system_id: Option<&str>,
        focus: Option<&str>,
    ) -> ItemDefResult<Document> {
        let ctx = GenerationContext::full(system_name, system_id, focus)?;
        self.assembler.assemble(&ctx)
    }

    /// Generate a blank annotated template.
    ///
    /// A missing or blank system name defaults to `Unknown System`. The backend is never
    /// called.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::SchemaLoad`] if the schema cannot be loaded.
    pub fn generate_template(&self, system_name: Option<&str>) -> ItemDefResult<Document> {
        let name = system_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_NAME);
        let ctx = GenerationContext::template(name)?;
        self.assembler.assemble(&ctx)
    }

    /// Section definitions of the current schema, in generation order.
    pub fn describe_schema(&self) -> ItemDefResult<Vec<SectionSchema>> {
        Ok(self.store.load()?.sections().to_vec())
    }

    /// Re-read the schema source. On failure the previously loaded schema stays in use.
    pub fn reload_schema(&self) -> ItemDefResult<Arc<Schema>> {
        self.store.reload()
    }

    /// Check an existing document against the current schema.
    pub fn validate(&self, document: &Document) -> ItemDefResult<ValidationReport> {
        let schema = self.store.load()?;
        Ok(self.validator.validate(document, &schema))
    }

    pub fn render_markdown(&self, document: &Document) -> String {
        self.renderer.render(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend(AtomicUsize);

    impl ContentBackend for CountingBackend {
        fn generate(&self, _prompt: &str, word_budget: u32) -> BackendResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("About {word_budget} words of content."))
        }
    }

    fn service() -> (ItemDefinitionService, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend(AtomicUsize::new(0)));
        let service = ItemDefinitionService::new(
            Arc::new(SchemaStore::builtin()),
            backend.clone(),
            EngineConfig::default(),
        );
        (service, backend)
    }

    #[test]
    fn describe_schema_is_stable_without_reload() {
        let (service, _) = service();
        let first = service.describe_schema().unwrap();
        let second = service.describe_schema().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
        assert!(first.windows(2).all(|w| w[0].order < w[1].order));
    }

    #[test]
    fn generate_document_uses_backend_for_every_section() {
        let (service, backend) = service();
        let document = service
            .generate_document("Battery Management System", None, Some("Interfaces and Item Boundary"))
            .unwrap();
        assert_eq!(backend.0.load(Ordering::SeqCst), 7);
        assert!(document.validation_report().passed);
        assert_eq!(
            document.metadata().focus_section_id.as_ref().map(|f| f.as_str()),
            Some("interfaces")
        );
    }

    #[test]
    fn generate_template_defaults_system_name() {
        let (service, backend) = service();
        let document = service.generate_template(None).unwrap();
        assert_eq!(document.metadata().system_name, "Unknown System");
        assert_eq!(document.metadata().item_id, "UNKNOWN_SYSTEM_DEFAULT");
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);

        let document = service.generate_template(Some("  ")).unwrap();
        assert_eq!(document.metadata().system_name, "Unknown System");
    }

    #[test]
    fn template_only_service_cannot_generate_full_documents() {
        let service = ItemDefinitionService::template_only(
            Arc::new(SchemaStore::builtin()),
            EngineConfig::default(),
        );
        assert!(service.generate_template(Some("Brake System")).is_ok());
        let err = service
            .generate_document("Brake System", None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ItemDefError::GenerationBackend {
                source: BackendError::Unavailable(_),
                ..
            }
        ));
    }

    #[test]
    fn reload_schema_picks_up_edited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        let one = "metadata:\n  title: T\n  work_product: W\nsections:\n  - id: desc\n    title: Description\n    order: 1\n    guidance: g\n";
        std::fs::write(&path, one).unwrap();

        let service = ItemDefinitionService::template_only(
            Arc::new(SchemaStore::new(SchemaSource::File(path.clone()))),
            EngineConfig::default(),
        );
        assert_eq!(service.describe_schema().unwrap().len(), 1);

        let two = format!("{one}  - id: notes\n    title: Notes\n    order: 2\n    guidance: g\n");
        std::fs::write(&path, two).unwrap();
        assert_eq!(service.describe_schema().unwrap().len(), 1);
        assert_eq!(service.reload_schema().unwrap().len(), 2);
        assert_eq!(service.describe_schema().unwrap().len(), 2);

        std::fs::write(&path, "sections: [").unwrap();
        assert!(service.reload_schema().is_err());
        assert_eq!(service.describe_schema().unwrap().len(), 2);
    }

    #[test]
    fn blank_system_name_is_rejected() {
        let (service, backend) = service();
        assert!(matches!(
            service.generate_document(" ", None, None),
            Err(ItemDefError::InvalidInput(_))
        ));
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn generated_documents_serialise_and_render() {
        let (service, _) = service();
        let document = service
            .generate_document("Battery Management System", Some("BMS-EV23"), None)
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        assert_eq!(json["metadata"]["item_id"], "BMS-EV23");
        assert_eq!(json["sections"].as_array().unwrap().len(), 7);
        assert_eq!(json["validation_report"]["passed"], true);

        let yaml = document.to_yaml().unwrap();
        assert!(yaml.contains("item_id: BMS-EV23"));

        let md = service.render_markdown(&document);
        assert!(md.starts_with("# ISO 26262 Item Definition: Battery Management System"));

        assert!(service.validate(&document).unwrap().passed);
    }
}
