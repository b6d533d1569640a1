//! Effective section weights.
//!
//! A focus directive shifts generation budget towards one section without growing the total:
//! the focus weight is multiplied by the boost factor, then every weight is scaled so that the
//! sum matches the schema's default total again.

use crate::config::EngineConfig;
use crate::schema::Schema;
use crate::{ItemDefError, ItemDefResult};
use itemdef_types::SectionId;
use std::collections::BTreeMap;

/// Effective weight per section id.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightMap {
    weights: BTreeMap<SectionId, f64>,
    focus: Option<SectionId>,
}

impl WeightMap {
    pub fn get(&self, id: &SectionId) -> Option<f64> {
        self.weights.get(id).copied()
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// The canonical id of the focus section, if a focus was applied.
    pub fn focus(&self) -> Option<&SectionId> {
        self.focus.as_ref()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, f64)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }
}

/// Computes [`WeightMap`]s from a schema and an optional focus.
#[derive(Clone, Copy, Debug)]
pub struct WeightResolver {
    boost_factor: f64,
}

impl WeightResolver {
    /// Create a resolver from validated configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            boost_factor: config.boost_factor(),
        }
    }

    /// Resolve effective weights.
    ///
    /// Without a focus the schema defaults are returned unchanged. With a focus, the matching
    /// section is boosted and all weights are renormalised to the default total.
    ///
    /// # Arguments
    ///
    /// * `schema` - Validated schema snapshot providing the default weights
    /// * `focus` - Optional section id or title to emphasise
    ///
    /// # Returns
    ///
    /// A [`WeightMap`] with one positive weight per schema section and the canonical focus id,
    /// if one was applied.
    ///
    /// # Errors
    ///
    /// Returns [`ItemDefError::UnknownSection`] if `focus` matches no section, or matches more
    /// than one section case-insensitively.
    pub fn resolve(&self, schema: &Schema, focus: Option<&str>) -> ItemDefResult<WeightMap> {
        let mut weights: BTreeMap<SectionId, f64> = schema
            .sections()
            .iter()
            .map(|s| (s.id.clone(), s.default_weight))
            .collect();

        let Some(focus) = focus else {
            return Ok(WeightMap {
                weights,
                focus: None,
            });
        };

        let focus_id = match_focus(schema, focus)?;
        let default_total = schema.default_total_weight();

        // Shares stay within [0, boost_factor], so the boost cannot overflow.
        for w in weights.values_mut() {
            *w /= default_total;
        }
        if let Some(share) = weights.get_mut(&focus_id) {
            *share *= self.boost_factor;
        }
        let boosted_total: f64 = weights.values().sum();
        for w in weights.values_mut() {
            *w = *w / boosted_total * default_total;
        }

        tracing::debug!(
            focus = %focus_id,
            boost_factor = self.boost_factor,
            weight = weights.get(&focus_id).copied().unwrap_or_default(),
            "applied focus boost"
        );

        Ok(WeightMap {
            weights,
            focus: Some(focus_id),
        })
    }
}

/// Match a caller-supplied focus string against the schema.
///
/// An exact id match wins. Otherwise the focus is compared case-insensitively with every
/// section id and full title; exactly one section must match. Partial titles such as
/// `Operating Modes` for "Operating Modes and States" are not accepted.
///
/// # Errors
///
/// Returns [`ItemDefError::UnknownSection`] for a blank, unmatched or ambiguous focus. The
/// reason lists the known section ids.
pub fn match_focus(schema: &Schema, focus: &str) -> ItemDefResult<SectionId> {
    let wanted = focus.trim();
    let unknown = |reason: String| ItemDefError::UnknownSection {
        focus: focus.to_string(),
        reason,
    };

    if wanted.is_empty() {
        return Err(unknown("focus must not be empty".into()));
    }

    if let Some(section) = schema.sections().iter().find(|s| s.id.as_str() == wanted) {
        return Ok(section.id.clone());
    }

    let lowered = wanted.to_lowercase();
    let candidates: Vec<&SectionId> = schema
        .sections()
        .iter()
        .filter(|s| {
            s.id.as_str().eq_ignore_ascii_case(&lowered)
                || s.title.as_str().to_lowercase() == lowered
        })
        .map(|s| &s.id)
        .collect();

    match candidates.as_slice() {
        [only] => Ok((*only).clone()),
        [] => {
            let known = schema
                .sections()
                .iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Err(unknown(format!(
                "no section has this id or full title; partial matches are not accepted \
                 (known sections: {known})"
            )))
        }
        many => Err(unknown(format!(
            "ambiguous focus, matches {}",
            many.iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
