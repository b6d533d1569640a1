//! Document assembly.
//!
//! `assemble` runs schema load, weight resolution, per-section generation, then validation.
//! Any fatal error aborts the whole request; sections generated before the failure are
//! dropped with it.

use crate::backend::ContentBackend;
use crate::config::{EngineConfig, GenerationStrategy};
use crate::document::{Document, DocumentMetadata, GenerationContext, GenerationMode, SectionResult};
use crate::generator::{PriorSummary, SectionGenerator};
use crate::schema::{Schema, SchemaStore, SectionSchema};
use crate::validator::CompletenessValidator;
use crate::weights::{WeightMap, WeightResolver};
use crate::ItemDefResult;
use itemdef_types::SectionId;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates one generation request from schema to validated [`Document`].
#[derive(Clone)]
pub struct DocumentAssembler {
    store: Arc<SchemaStore>,
    backend: Arc<dyn ContentBackend>,
    config: EngineConfig,
    validator: CompletenessValidator,
}

impl DocumentAssembler {
    pub fn new(
        store: Arc<SchemaStore>,
        backend: Arc<dyn ContentBackend>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
            validator: CompletenessValidator::new(),
        }
    }

    /// Assemble a document for `ctx`.
    ///
    /// The schema snapshot taken at the start is used for the whole request, so a concurrent
    /// reload of the store does not affect a document that is already being generated.
    ///
    /// # Arguments
    ///
    /// * `ctx` - System name and id, optional focus and generation mode
    ///
    /// # Returns
    ///
    /// The assembled [`Document`] with sections in schema order. It always carries its
    /// validation report, whether or not validation passed.
    ///
    /// # Errors
    ///
    /// Returns the first of [`ItemDefError::SchemaLoad`](crate::ItemDefError::SchemaLoad),
    /// [`ItemDefError::UnknownSection`](crate::ItemDefError::UnknownSection) or
    /// [`ItemDefError::GenerationBackend`](crate::ItemDefError::GenerationBackend) raised by any
    /// stage.
    pub fn assemble(&self, ctx: &GenerationContext) -> ItemDefResult<Document> {
        let schema = self.store.load()?;
        let weights = WeightResolver::new(&self.config).resolve(&schema, ctx.focus_section_id())?;

        let strategy = match ctx.mode() {
            // Nothing to parallelise when no backend is called.
            GenerationMode::Template => GenerationStrategy::Sequential,
            GenerationMode::Full => self.config.strategy(),
        };

        tracing::info!(
            system = %ctx.system_name(),
            mode = %ctx.mode(),
            focus = weights.focus().map(|f| f.as_str()).unwrap_or("-"),
            sections = schema.len(),
            ?strategy,
            "assembling item definition"
        );

        let generator = SectionGenerator::new(self.backend.as_ref(), &self.config);
        let sections = match strategy {
            GenerationStrategy::Sequential => {
                generate_sequential(&generator, ctx, &schema, &weights)?
            }
            GenerationStrategy::Concurrent => {
                generate_concurrent(&generator, ctx, &schema, &weights)?
            }
        };

        let report = self
            .validator
            .validate_sections(&sections, ctx.mode(), &schema);

        let metadata = DocumentMetadata {
            document_id: Uuid::new_v4(),
            system_name: ctx.system_name().to_string(),
            system_id: ctx.system_id().map(|id| id.to_string()),
            item_id: ctx.item_id(),
            mode: ctx.mode(),
            generated_at: ctx.requested_at(),
            focus_section_id: weights.focus().cloned(),
            schema_title: schema.metadata().title.to_string(),
            work_product: schema.metadata().work_product.to_string(),
        };

        tracing::info!(
            document_id = %metadata.document_id,
            sections = sections.len(),
            passed = report.passed,
            findings = report.findings.len(),
            "assembled item definition"
        );

        Ok(Document::new(metadata, sections, report))
    }
}

fn effective_weight(weights: &WeightMap, section: &SectionSchema) -> f64 {
    weights.get(&section.id).unwrap_or(section.default_weight)
}

fn is_focus(weights: &WeightMap, section: &SectionSchema) -> bool {
    weights.focus() == Some(&section.id)
}

fn summaries_of(results: &[SectionResult]) -> Vec<PriorSummary> {
    results
        .iter()
        .filter(|r| !r.is_placeholder && !r.content.is_empty())
        .map(PriorSummary::from_result)
        .collect()
}

/// One section at a time in schema order; each prompt sees every earlier section.
fn generate_sequential(
    generator: &SectionGenerator<'_>,
    ctx: &GenerationContext,
    schema: &Schema,
    weights: &WeightMap,
) -> ItemDefResult<Vec<SectionResult>> {
    let mut results: Vec<SectionResult> = Vec::with_capacity(schema.len());
    let mut prior: Vec<PriorSummary> = Vec::new();

    for section in schema.sections() {
        let result = generator.generate(
            ctx,
            section,
            effective_weight(weights, section),
            is_focus(weights, section),
            &prior,
        )?;
        if !result.is_placeholder && !result.content.is_empty() {
            prior.push(PriorSummary::from_result(&result));
        }
        results.push(result);
    }

    Ok(results)
}

/// Sections without references in parallel, then the rest in schema order.
///
/// Collecting into a `Result` stops the rayon pool from starting further sections once one
/// has failed.
fn generate_concurrent(
    generator: &SectionGenerator<'_>,
    ctx: &GenerationContext,
    schema: &Schema,
    weights: &WeightMap,
) -> ItemDefResult<Vec<SectionResult>> {
    let independent: Vec<&SectionSchema> = schema
        .sections()
        .iter()
        .filter(|s| s.references.is_empty())
        .collect();

    tracing::debug!(
        independent = independent.len(),
        dependent = schema.len() - independent.len(),
        "generating independent sections in parallel"
    );

    let generated: Vec<SectionResult> = independent
        .par_iter()
        .map(|section| {
            generator.generate(
                ctx,
                section,
                effective_weight(weights, section),
                is_focus(weights, section),
                &[],
            )
        })
        .collect::<ItemDefResult<Vec<_>>>()?;

    let mut done: HashMap<SectionId, SectionResult> = generated
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut results: Vec<SectionResult> = Vec::with_capacity(schema.len());
    for section in schema.sections() {
        if let Some(result) = done.remove(&section.id) {
            results.push(result);
            continue;
        }
        let prior = summaries_of(&results);
        let result = generator.generate(
            ctx,
            section,
            effective_weight(weights, section),
            is_focus(weights, section),
            &prior,
        )?;
        results.push(result);
    }

    Ok(results)
}
