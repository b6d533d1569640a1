//! Structural completeness checks of a document against its schema.
//!
//! Validation never fails. Every broken rule becomes a [`ValidationFinding`] and the caller
//! decides whether to reject the document or surface it with warnings.

use crate::document::{Document, GenerationMode, SectionResult};
use crate::schema::Schema;
use itemdef_types::SectionId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which completeness rule produced a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    MissingRequiredSection,
    EmptyRequiredContent,
    EmptyReferencedSection,
    SectionOrderMismatch,
    UnknownSection,
    EmptyDocument,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::MissingRequiredSection => "missing_required_section",
            RuleId::EmptyRequiredContent => "empty_required_content",
            RuleId::EmptyReferencedSection => "empty_referenced_section",
            RuleId::SectionOrderMismatch => "section_order_mismatch",
            RuleId::UnknownSection => "unknown_section",
            RuleId::EmptyDocument => "empty_document",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    /// Section the finding is about. `None` for document-level findings.
    pub section_id: Option<SectionId>,
    pub rule_id: RuleId,
    pub severity: Severity,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// True when no finding has [`Severity::Error`].
    pub passed: bool,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    fn from_findings(findings: Vec<ValidationFinding>) -> Self {
        let passed = !findings.iter().any(|f| f.severity == Severity::Error);
        Self { passed, findings }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }
}

/// Checks documents for completeness against a schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletenessValidator;

impl CompletenessValidator {
    pub fn new() -> Self {
        Self
    }

    /// Re-validate an existing document.
    pub fn validate(&self, document: &Document, schema: &Schema) -> ValidationReport {
        self.validate_sections(document.sections(), document.mode(), schema)
    }

    /// Validate assembled sections before they are wrapped into a [`Document`].
    ///
    /// # Arguments
    ///
    /// * `sections` - Section results in the order they will appear in the document
    /// * `mode` - Generation mode; placeholders only count as content in template mode
    /// * `schema` - Schema the sections were generated from
    ///
    /// # Returns
    ///
    /// A [`ValidationReport`] listing every broken rule. Findings are ordered by rule:
    /// document-level, presence and content, references, order.
    pub fn validate_sections(
        &self,
        sections: &[SectionResult],
        mode: GenerationMode,
        schema: &Schema,
    ) -> ValidationReport {
        let mut findings = Vec::new();
        let by_id: HashMap<&SectionId, &SectionResult> =
            sections.iter().map(|s| (&s.id, s)).collect();
        // Placeholders count as content in template mode.
        let has_content = |s: &SectionResult| {
            !s.content.trim().is_empty() && (mode == GenerationMode::Template || !s.is_placeholder)
        };

        if sections.is_empty() {
            findings.push(ValidationFinding {
                section_id: None,
                rule_id: RuleId::EmptyDocument,
                severity: Severity::Error,
                message: "document contains no sections".to_string(),
            });
        }

        for section in sections {
            if schema.section(&section.id).is_none() {
                findings.push(ValidationFinding {
                    section_id: Some(section.id.clone()),
                    rule_id: RuleId::UnknownSection,
                    severity: Severity::Error,
                    message: format!("section '{}' is not defined in the schema", section.id),
                });
            }
        }

        for expected in schema.sections().iter().filter(|s| s.required) {
            match by_id.get(&expected.id) {
                None => findings.push(ValidationFinding {
                    section_id: Some(expected.id.clone()),
                    rule_id: RuleId::MissingRequiredSection,
                    severity: Severity::Error,
                    message: format!("required section '{}' is missing", expected.title),
                }),
                Some(result) if !has_content(*result) => findings.push(ValidationFinding {
                    section_id: Some(expected.id.clone()),
                    rule_id: RuleId::EmptyRequiredContent,
                    severity: Severity::Error,
                    message: format!("required section '{}' has no content", expected.title),
                }),
                Some(_) => {}
            }
        }

        // Placeholder documents carry no real content to cross-check.
        if mode == GenerationMode::Full {
            for section in schema.sections() {
                if !by_id.contains_key(&section.id) {
                    continue;
                }
                for reference in &section.references {
                    let Some(target) = schema.section(reference) else {
                        continue;
                    };
                    let satisfied = by_id.get(reference).is_some_and(|r| has_content(*r));
                    if !satisfied {
                        findings.push(ValidationFinding {
                            section_id: Some(section.id.clone()),
                            rule_id: RuleId::EmptyReferencedSection,
                            severity: if target.required {
                                Severity::Error
                            } else {
                                Severity::Warning
                            },
                            message: format!(
                                "section '{}' references '{}' which has no content",
                                section.id, reference
                            ),
                        });
                    }
                }
            }
        }

        let known: HashSet<&SectionId> = schema.sections().iter().map(|s| &s.id).collect();
        let actual: Vec<&SectionId> = sections
            .iter()
            .map(|s| &s.id)
            .filter(|id| known.contains(id))
            .collect();
        let expected: Vec<&SectionId> = schema
            .sections()
            .iter()
            .map(|s| &s.id)
            .filter(|id| by_id.contains_key(id))
            .collect();
        if let Some(position) = actual.iter().zip(&expected).position(|(a, e)| a != e) {
            findings.push(ValidationFinding {
                section_id: Some(actual[position].clone()),
                rule_id: RuleId::SectionOrderMismatch,
                severity: Severity::Error,
                message: format!(
                    "section '{}' appears at position {} where schema order expects '{}'",
                    actual[position],
                    position + 1,
                    expected[position]
                ),
            });
        }

        let report = ValidationReport::from_findings(findings);
        if !report.passed {
            tracing::warn!(
                errors = report.errors().count(),
                warnings = report.warnings().count(),
                "document failed completeness validation"
            );
        }
        report
    }
}
