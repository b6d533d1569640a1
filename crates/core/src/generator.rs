//! Per-section generation.
//!
//! In template mode a section becomes an instructional stub built from its guidance. In full
//! mode the section is turned into a [`GenerationRequest`], rendered to a prompt and sent to
//! the [`ContentBackend`] exactly once.

use crate::backend::{BackendError, ContentBackend};
use crate::config::EngineConfig;
use crate::constants::{
    FOCUS_MARKER, PLACEHOLDER_DATETIME_NOW, PLACEHOLDER_SYSTEM_ID, PLACEHOLDER_SYSTEM_NAME,
    PRIOR_SUMMARY_WORDS,
};
use crate::document::{GenerationContext, GenerationMode, SectionResult};
use crate::schema::SectionSchema;
use crate::{ItemDefError, ItemDefResult};

/// Short digest of an already generated section, given to later prompts for coherence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorSummary {
    pub title: String,
    pub summary: String,
}

impl PriorSummary {
    pub fn from_result(result: &SectionResult) -> Self {
        Self {
            title: result.title.clone(),
            summary: summarise(&result.content, PRIOR_SUMMARY_WORDS),
        }
    }
}

/// Everything the backend is told about one section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_name: String,
    pub item_id: String,
    pub section_title: String,
    pub clause_ref: Option<String>,
    pub guidance: String,
    /// Section prompt with placeholders substituted.
    pub instruction: String,
    pub word_budget: u32,
    pub focused: bool,
    pub prior_sections: Vec<PriorSummary>,
}

impl GenerationRequest {
    /// Render the request as the prompt text handed to the backend.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();

        if self.focused {
            prompt.push_str(FOCUS_MARKER);
            prompt.push(' ');
        }
        prompt.push_str(&self.instruction);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Section: {}", self.section_title));
        if let Some(clause) = &self.clause_ref {
            prompt.push_str(&format!(" (clause {clause})"));
        }
        prompt.push('\n');
        prompt.push_str(&format!("Item: {} ({})\n", self.system_name, self.item_id));
        prompt.push_str(&format!("Guidance: {}\n", self.guidance));
        prompt.push_str(&format!(
            "Target length: about {} words.\n",
            self.word_budget
        ));
        if self.focused {
            prompt.push_str("This section is the focus of the document; treat it in depth.\n");
        }

        if !self.prior_sections.is_empty() {
            prompt.push_str("\nPreviously written sections (stay consistent with them):\n");
            for prior in &self.prior_sections {
                prompt.push_str(&format!("- {}: {}\n", prior.title, prior.summary));
            }
        }

        prompt
    }
}

/// Generates a single [`SectionResult`].
pub struct SectionGenerator<'a> {
    backend: &'a dyn ContentBackend,
    words_per_weight: u32,
    min_words: u32,
    max_words: u32,
}

impl<'a> SectionGenerator<'a> {
    pub fn new(backend: &'a dyn ContentBackend, config: &EngineConfig) -> Self {
        Self {
            backend,
            words_per_weight: config.words_per_weight(),
            min_words: config.min_words(),
            max_words: config.max_words(),
        }
    }

    /// Word budget for `weight`: proportional, clamped to the configured floor and ceiling.
    pub fn word_budget(&self, weight: f64) -> u32 {
        let raw = (weight * f64::from(self.words_per_weight)).round();
        // Float to int casts saturate; NaN becomes 0 and is lifted to the floor.
        (raw as u32).clamp(self.min_words, self.max_words)
    }

    /// Generate one section.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Request context; its mode decides between placeholder and backend content
    /// * `section` - Schema entry being generated
    /// * `weight` - Effective weight from the [`WeightMap`](crate::weights::WeightMap)
    /// * `focused` - Whether this section is the focus of the document
    /// * `prior` - Summaries of earlier sections to stay consistent with; ignored in template
    ///   mode
    ///
    /// # Returns
    ///
    /// The [`SectionResult`] with trimmed content and the word budget derived from `weight`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::GenerationBackend`] if the backend fails, times out, or returns
    /// empty content for a required section.
    pub fn generate(
        &self,
        ctx: &GenerationContext,
        section: &SectionSchema,
        weight: f64,
        focused: bool,
        prior: &[PriorSummary],
    ) -> ItemDefResult<SectionResult> {
        let word_budget = self.word_budget(weight);

        if ctx.mode() == GenerationMode::Template {
            return Ok(SectionResult {
                id: section.id.clone(),
                title: section.title.to_string(),
                clause_ref: section.clause_ref.clone(),
                content: placeholder_content(section, word_budget),
                is_placeholder: true,
                word_budget,
                weight,
            });
        }

        let request = self.build_request(ctx, section, word_budget, focused, prior);
        let prompt = request.render_prompt();

        tracing::debug!(
            section = %section.id,
            word_budget,
            focused,
            prior_sections = prior.len(),
            "requesting section content"
        );

        let content = self
            .backend
            .generate(&prompt, word_budget)
            .map_err(|source| {
                tracing::error!(section = %section.id, error = %source, "backend call failed");
                ItemDefError::GenerationBackend {
                    section_id: section.id.clone(),
                    source,
                }
            })?;

        let content = content.trim().to_string();
        if content.is_empty() && section.required {
            tracing::error!(section = %section.id, "backend returned empty content");
            return Err(ItemDefError::GenerationBackend {
                section_id: section.id.clone(),
                source: BackendError::EmptyContent,
            });
        }

        Ok(SectionResult {
            id: section.id.clone(),
            title: section.title.to_string(),
            clause_ref: section.clause_ref.clone(),
            content,
            is_placeholder: false,
            word_budget,
            weight,
        })
    }

    /// Build the backend request for `section`.
    pub fn build_request(
        &self,
        ctx: &GenerationContext,
        section: &SectionSchema,
        word_budget: u32,
        focused: bool,
        prior: &[PriorSummary],
    ) -> GenerationRequest {
        let item_id = ctx.item_id();
        let date = ctx.requested_at().format("%Y-%m-%d").to_string();
        let template = section
            .prompt
            .as_deref()
            .unwrap_or_else(|| section.guidance.as_str());
        let instruction = template
            .replace(PLACEHOLDER_SYSTEM_NAME, ctx.system_name().as_str())
            .replace(PLACEHOLDER_SYSTEM_ID, &item_id)
            .replace(PLACEHOLDER_DATETIME_NOW, &date);

        GenerationRequest {
            system_name: ctx.system_name().to_string(),
            item_id,
            section_title: section.title.to_string(),
            clause_ref: section.clause_ref.clone(),
            guidance: section.guidance.to_string(),
            instruction,
            word_budget,
            focused,
            prior_sections: prior.to_vec(),
        }
    }
}

fn placeholder_content(section: &SectionSchema, word_budget: u32) -> String {
    let mut out = format!("> **Guidance:** {}\n", section.guidance);
    if let Some(clause) = &section.clause_ref {
        out.push_str(&format!(">\n> **Clause:** {clause}\n"));
    }
    if !section.references.is_empty() {
        let refs = section
            .references
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(">\n> **Keep consistent with:** {refs}\n"));
    }
    out.push_str(&format!(
        ">\n> **Target length:** about {word_budget} words"
    ));
    out
}

/// First `max_words` words of `content`, with an ellipsis when truncated.
pub fn summarise(content: &str, max_words: usize) -> String {
    let mut words = content.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    let mut summary = kept.join(" ");
    if words.next().is_some() {
        summary.push_str(" ...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::schema::parse_schema;
    use std::sync::Mutex;

    /// Records every prompt and answers from a fixed script.
    struct ScriptedBackend {
        reply: BackendResult<String>,
        prompts: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedBackend {
        fn replying(reply: BackendResult<String>) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, u32)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl ContentBackend for ScriptedBackend {
        fn generate(&self, prompt: &str, word_budget: u32) -> BackendResult<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), word_budget));
            self.reply.clone()
        }
    }

    fn sections() -> Vec<SectionSchema> {
        parse_schema(
            r#"metadata:
  title: T
  work_product: W
sections:
  - id: desc
    title: Description
    order: 1
    clause_ref: "5.4.1"
    guidance: Describe the item.
    prompt: "Describe the {system_name} ({system_id}) as of {datetime_now}."
  - id: notes
    title: Notes
    order: 2
    required: false
    guidance: Free-form notes.
    references: [desc]
"#,
            "test",
        )
        .unwrap()
        .sections()
        .to_vec()
    }

    fn full_ctx() -> GenerationContext {
        GenerationContext::full("Battery Management System", Some("BMS-EV23"), None).unwrap()
    }

    #[test]
    fn word_budget_is_monotonic_and_clamped() {
        let backend = ScriptedBackend::replying(Ok("x".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());

        assert_eq!(generator.word_budget(1.0), 150);
        assert_eq!(generator.word_budget(2.0), 300);
        assert!(generator.word_budget(1.5) > generator.word_budget(1.0));
        assert_eq!(generator.word_budget(0.01), 50);
        assert_eq!(generator.word_budget(100.0), 1200);
        assert_eq!(generator.word_budget(f64::NAN), 50);
    }

    #[test]
    fn template_mode_returns_placeholder_without_backend_call() {
        let backend = ScriptedBackend::replying(Ok("unused".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        let ctx = GenerationContext::template("Brake System").unwrap();
        let section = &sections()[1];

        let result = generator.generate(&ctx, section, 1.0, false, &[]).unwrap();
        assert!(result.is_placeholder);
        assert!(result.content.contains("Free-form notes."));
        assert!(result.content.contains("Keep consistent with:** desc"));
        assert!(result.content.contains("about 150 words"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn full_mode_calls_backend_once_with_substituted_prompt() {
        let backend = ScriptedBackend::replying(Ok("  The BMS shall monitor cells.\n".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        let ctx = full_ctx();
        let section = &sections()[0];

        let result = generator.generate(&ctx, section, 2.0, false, &[]).unwrap();
        assert!(!result.is_placeholder);
        assert_eq!(result.content, "The BMS shall monitor cells.");
        assert_eq!(result.word_budget, 300);
        assert_eq!(result.clause_ref.as_deref(), Some("5.4.1"));

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let (prompt, budget) = &calls[0];
        assert_eq!(*budget, 300);
        let date = ctx.requested_at().format("%Y-%m-%d").to_string();
        assert!(prompt.starts_with(&format!(
            "Describe the Battery Management System (BMS-EV23) as of {date}."
        )));
        assert!(prompt.contains("Section: Description (clause 5.4.1)"));
        assert!(!prompt.contains(FOCUS_MARKER));
    }

    #[test]
    fn focused_section_prompt_carries_marker() {
        let backend = ScriptedBackend::replying(Ok("text".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        generator
            .generate(&full_ctx(), &sections()[0], 1.0, true, &[])
            .unwrap();
        assert!(backend.calls()[0].0.starts_with(FOCUS_MARKER));
    }

    #[test]
    fn prior_summaries_are_included_in_prompt() {
        let backend = ScriptedBackend::replying(Ok("text".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        let prior = vec![PriorSummary {
            title: "Description".into(),
            summary: "The BMS monitors the battery.".into(),
        }];
        generator
            .generate(&full_ctx(), &sections()[1], 1.0, false, &prior)
            .unwrap();
        let prompt = &backend.calls()[0].0;
        assert!(prompt.contains("Previously written sections"));
        assert!(prompt.contains("- Description: The BMS monitors the battery."));
        // Without a prompt template the guidance doubles as the instruction.
        assert!(prompt.starts_with("Free-form notes."));
    }

    #[test]
    fn backend_failure_names_the_section() {
        let backend =
            ScriptedBackend::replying(Err(BackendError::Failed("rate limited".into())));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        let err = generator
            .generate(&full_ctx(), &sections()[0], 1.0, false, &[])
            .unwrap_err();
        match err {
            ItemDefError::GenerationBackend { section_id, source } => {
                assert_eq!(section_id.as_str(), "desc");
                assert_eq!(source, BackendError::Failed("rate limited".into()));
            }
            other => panic!("expected GenerationBackend, got {other:?}"),
        }
    }

    #[test]
    fn timeout_is_reported_as_backend_error() {
        let backend = ScriptedBackend::replying(Err(BackendError::Timeout(
            std::time::Duration::from_secs(30),
        )));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());
        let err = generator
            .generate(&full_ctx(), &sections()[0], 1.0, false, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            ItemDefError::GenerationBackend {
                source: BackendError::Timeout(_),
                ..
            }
        ));
    }

    #[test]
    fn empty_content_fails_only_for_required_sections() {
        let backend = ScriptedBackend::replying(Ok("   \n".into()));
        let generator = SectionGenerator::new(&backend, &EngineConfig::default());

        let err = generator
            .generate(&full_ctx(), &sections()[0], 1.0, false, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            ItemDefError::GenerationBackend {
                source: BackendError::EmptyContent,
                ..
            }
        ));

        let optional = generator
            .generate(&full_ctx(), &sections()[1], 1.0, false, &[])
            .unwrap();
        assert!(optional.content.is_empty());
    }

    #[test]
    fn summarise_truncates_on_word_boundary() {
        assert_eq!(summarise("one two three", 5), "one two three");
        assert_eq!(summarise("one  two\nthree four", 2), "one two ...");
        assert_eq!(summarise("", 3), "");
    }
}
