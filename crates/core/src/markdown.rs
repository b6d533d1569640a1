//! Markdown rendering of generated item definitions.
//!
//! Renders a [`Document`] into the work-product layout: a title header, work-product and date
//! lines, then one level-2 section per result. Generated section bodies are sanitised so that
//! they cannot break out of their section.

use crate::document::{Document, GenerationMode, SectionResult};
use crate::validator::{Severity, ValidationReport};

/// Level of the heading each section is rendered under.
const SECTION_HEADING_LEVEL: usize = 2;

const TEMPLATE_NOTE: &str =
    "*Template: replace each guidance block with content specific to this item.*";

/// Service for rendering documents to Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Creates a new `MarkdownRenderer` instance.
    pub fn new() -> Self {
        Self
    }

    /// Render a complete document.
    ///
    /// Layout produced:
    /// ```markdown
    /// # <schema title>: <system name>
    ///
    /// *Work Product: <work product>*
    /// *Generated on: YYYY-MM-DD*
    ///
    /// ## <section title>
    ///
    /// *Clause: <clause>*
    ///
    /// <body>
    /// ```
    ///
    /// Template documents carry a note under the header. Validation findings, if any, are
    /// listed at the end.
    pub fn render(&self, document: &Document) -> String {
        let meta = document.metadata();
        let mut output = String::new();

        output.push_str(&format!("# {}: {}\n\n", meta.schema_title, meta.system_name));
        output.push_str(&format!("*Work Product: {}*  \n", meta.work_product));
        output.push_str(&format!("*Item ID: {}*  \n", meta.item_id));
        output.push_str(&format!(
            "*Generated on: {}*\n",
            meta.generated_at.format("%Y-%m-%d")
        ));
        if meta.mode == GenerationMode::Template {
            output.push('\n');
            output.push_str(TEMPLATE_NOTE);
            output.push('\n');
        }

        for section in document.sections() {
            output.push('\n');
            output.push_str(&self.section_render(section));
        }

        if !document.validation_report().findings.is_empty() {
            output.push('\n');
            output.push_str(&self.findings_render(document.validation_report()));
        }

        output
    }

    fn section_render(&self, section: &SectionResult) -> String {
        let mut output = format!("## {}\n\n", section.title);
        if let Some(clause) = &section.clause_ref {
            output.push_str(&format!("*Clause: {clause}*\n\n"));
        }
        if section.is_placeholder {
            // Placeholders are produced by the engine and are already valid markdown.
            output.push_str(&section.content);
        } else if section.content.is_empty() {
            output.push_str("_No content._");
        } else {
            output.push_str(&self.escape_body(&section.content));
        }
        output.push('\n');
        output
    }

    fn findings_render(&self, report: &ValidationReport) -> String {
        let mut output = String::from("## Validation Findings\n\n");
        for finding in &report.findings {
            let severity = match finding.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            match &finding.section_id {
                Some(id) => output.push_str(&format!(
                    "- **{severity}** `{}` ({id}): {}\n",
                    finding.rule_id, finding.message
                )),
                None => output.push_str(&format!(
                    "- **{severity}** `{}`: {}\n",
                    finding.rule_id, finding.message
                )),
            }
        }
        output
    }

    /// Sanitises generated section content.
    ///
    /// Body rules:
    /// - ATX headings are nested below the section heading (`# A` → `### A`, capped at six)
    /// - Standalone `---`, `***`, `___` → escaped (prevents horizontal rules)
    /// - Lines inside fenced code blocks are left untouched
    fn escape_body(&self, body: &str) -> String {
        let mut in_fence = false;

        body.lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.starts_with("```") {
                    in_fence = !in_fence;
                    return line.to_string();
                }
                if in_fence {
                    return line.to_string();
                }

                if let Some(level) = heading_level(trimmed) {
                    let nested = (level + SECTION_HEADING_LEVEL).min(6);
                    format!("{} {}", "#".repeat(nested), trimmed[level..].trim_start())
                } else if trimmed == "---" || trimmed == "***" || trimmed == "___" {
                    format!(r"\{}", trimmed)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Level of an ATX heading line, if `line` is one.
fn heading_level(line: &str) -> Option<usize> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    match line[level..].chars().next() {
        None | Some(' ') | Some('\t') => Some(level),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::DocumentAssembler;
    use crate::backend::{BackendResult, ContentBackend};
    use crate::config::EngineConfig;
    use crate::document::GenerationContext;
    use crate::schema::{SchemaSource, SchemaStore};
    use crate::validator::{RuleId, ValidationFinding};
    use std::sync::Arc;

    struct FixedBackend(&'static str);

    impl ContentBackend for FixedBackend {
        fn generate(&self, _prompt: &str, _word_budget: u32) -> BackendResult<String> {
            Ok(self.0.to_string())
        }
    }

    fn document(ctx: GenerationContext, reply: &'static str) -> Document {
        let store = Arc::new(SchemaStore::new(SchemaSource::Inline {
            name: "test".into(),
            yaml: r#"metadata:
  title: ISO 26262 Item Definition
  work_product: Item Definition (ISO 26262-3, 5.5.1)
sections:
  - id: desc
    title: Item Description
    order: 1
    clause_ref: "5.4.1"
    guidance: Describe the item.
  - id: notes
    title: Notes
    order: 2
    required: false
    guidance: Anything else.
    references: [desc]
"#
            .into(),
        }));
        DocumentAssembler::new(store, Arc::new(FixedBackend(reply)), EngineConfig::default())
            .assemble(&ctx)
            .unwrap()
    }

    #[test]
    fn renders_header_and_sections() {
        let ctx = GenerationContext::full("Battery Management System", Some("BMS-EV23"), None)
            .unwrap();
        let date = ctx.requested_at().format("%Y-%m-%d").to_string();
        let md = MarkdownRenderer::new().render(&document(ctx, "The BMS monitors cells."));

        assert!(md.starts_with("# ISO 26262 Item Definition: Battery Management System\n"));
        assert!(md.contains("*Work Product: Item Definition (ISO 26262-3, 5.5.1)*"));
        assert!(md.contains("*Item ID: BMS-EV23*"));
        assert!(md.contains(&format!("*Generated on: {date}*")));
        assert!(md.contains("## Item Description\n\n*Clause: 5.4.1*\n\nThe BMS monitors cells.\n"));
        assert!(md.contains("## Notes\n\nThe BMS monitors cells.\n"));
        assert!(!md.contains("Validation Findings"));
        assert!(!md.contains(TEMPLATE_NOTE));
    }

    #[test]
    fn template_documents_keep_guidance_blocks() {
        let md = MarkdownRenderer::new().render(&document(
            GenerationContext::template("Brake System").unwrap(),
            "unused",
        ));
        assert!(md.contains(TEMPLATE_NOTE));
        assert!(md.contains("> **Guidance:** Describe the item."));
        assert!(md.contains("> **Keep consistent with:** desc"));
    }

    #[test]
    fn generated_headings_nest_under_section() {
        let body = "# Overview\ntext\n## Details\n###### Deep\n#hashtag\n---";
        let escaped = MarkdownRenderer::new().escape_body(body);
        assert_eq!(
            escaped,
            "### Overview\ntext\n#### Details\n###### Deep\n#hashtag\n\\---"
        );
    }

    #[test]
    fn fenced_code_is_left_untouched() {
        let body = "```\n# comment\n---\n```\n# Heading";
        let escaped = MarkdownRenderer::new().escape_body(body);
        assert_eq!(escaped, "```\n# comment\n---\n```\n### Heading");
    }

    #[test]
    fn findings_are_appended() {
        let report = ValidationReport {
            passed: false,
            findings: vec![
                ValidationFinding {
                    section_id: None,
                    rule_id: RuleId::EmptyDocument,
                    severity: Severity::Error,
                    message: "document contains no sections".into(),
                },
                ValidationFinding {
                    section_id: Some(itemdef_types::SectionId::parse("notes").unwrap()),
                    rule_id: RuleId::EmptyReferencedSection,
                    severity: Severity::Warning,
                    message: "example".into(),
                },
            ],
        };
        let md = MarkdownRenderer::new().findings_render(&report);
        assert!(md.starts_with("## Validation Findings\n\n"));
        assert!(md.contains("- **error** `empty_document`: document contains no sections\n"));
        assert!(md.contains("- **warning** `empty_referenced_section` (notes): example\n"));
    }
}
