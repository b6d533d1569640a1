//! Constants used throughout the item definition engine.
//!
//! Tunable generation parameters here are only defaults; the effective values live in
//! [`EngineConfig`](crate::config::EngineConfig).

/// Default multiplier applied to the focus section's weight before renormalisation.
pub const DEFAULT_BOOST_FACTOR: f64 = 2.0;

/// Default number of target words per unit of weight.
pub const DEFAULT_WORDS_PER_WEIGHT: u32 = 150;

/// Default lower bound on any section's word budget.
pub const DEFAULT_MIN_WORDS: u32 = 50;

/// Default upper bound on any section's word budget.
pub const DEFAULT_MAX_WORDS: u32 = 1200;

/// Number of words kept from each earlier section when summarising it for later prompts.
pub const PRIOR_SUMMARY_WORDS: usize = 60;

/// Marker prepended to the prompt of the focus section.
pub const FOCUS_MARKER: &str = "[FOCUS AREA - IMPORTANT]";

/// System name used by template generation when the caller does not supply one.
pub const DEFAULT_SYSTEM_NAME: &str = "Unknown System";

/// Suffix of the item id derived from the system name when no system id is given.
pub const DEFAULT_ITEM_ID_SUFFIX: &str = "_DEFAULT";

/// Source name reported for the schema compiled into the crate.
pub const BUILTIN_SCHEMA_NAME: &str = "builtin:item_definition_iso26262";

/// ISO 26262-3 item definition schema compiled into the crate.
pub const BUILTIN_SCHEMA_YAML: &str = include_str!("../templates/item_definition_iso26262.yaml");

/// Prompt placeholders substituted at generation time.
pub const PLACEHOLDER_SYSTEM_NAME: &str = "{system_name}";
pub const PLACEHOLDER_SYSTEM_ID: &str = "{system_id}";
pub const PLACEHOLDER_DATETIME_NOW: &str = "{datetime_now}";
