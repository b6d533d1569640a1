//! Validated text primitives shared across the item definition crates.
//!
//! - [`NonEmptyText`]: trimmed text guaranteed to contain at least one non-whitespace character.
//! - [`SectionId`]: stable, machine-friendly key identifying one section of a document schema.

/// Rejection reasons for the primitives in this crate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// Nothing was left after trimming
    #[error("text must contain at least one non-whitespace character")]
    Empty,

    /// The input is not a valid section identifier
    #[error("invalid section id '{id}': {reason}")]
    InvalidSectionId { id: String, reason: &'static str },
}

/// Trimmed text with at least one visible character.
///
/// Used for system names, section titles and guidance: values that end up in prompts and
/// headings, where a blank or padded string would produce a broken document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trim `input` and keep it if anything remains.
    ///
    /// # Errors
    ///
    /// [`TypesError::Empty`] for empty or whitespace-only input.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a schema section, for example `functional_behavior`.
///
/// Section ids appear in focus arguments, validation findings and cross-section references,
/// so they are restricted to a conservative form:
/// - 1 to 64 characters
/// - lowercase ASCII letters, digits, `_` and `-`
/// - must start with a letter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(String);

impl SectionId {
    const MAX_LEN: usize = 64;

    /// Parses and validates a section id.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidSectionId`] if `input` breaks any of the rules above.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let id = input.as_ref();
        let invalid = |reason| TypesError::InvalidSectionId {
            id: id.to_owned(),
            reason,
        };

        if id.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(invalid("exceeds 64 characters"));
        }
        if !id.as_bytes()[0].is_ascii_lowercase() {
            return Err(invalid("must start with a lowercase letter"));
        }

        let ok = id
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-'));
        if !ok {
            return Err(invalid(
                "only lowercase letters, digits, '_' and '-' are allowed",
            ));
        }

        Ok(Self(id.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for SectionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SectionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SectionId::parse(&s).map_err(serde::de::Error::custom)
    }
}
