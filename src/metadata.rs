use crate::epub::MetadataError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;

// ── NormalizedMetadata ────────────────────────────────────────────────────────

/// Bibliographic metadata extracted from an EPUB package document.
///
/// A value of this type always has a non-empty title and primary language;
/// [`NormalizedMetadata::new`] is the only way to build one.
///
/// Serializes (with `serde_json`) in the field order
/// `title`, `creators`, `identifiers`, `primaryLanguage`,
/// `dateOfPublication`, `publisher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetadata {
    title: String,
    creators: Vec<String>,
    identifiers: Vec<Identifier>,
    primary_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_of_publication: Option<PublicationDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
}

impl NormalizedMetadata {
    /// Validate and assemble a record.
    ///
    /// Fails with [`MetadataError::MissingTitle`] or
    /// [`MetadataError::MissingLanguage`] when either required field is empty.
    pub fn new(
        title: impl Into<String>,
        creators: Vec<String>,
        identifiers: Vec<Identifier>,
        primary_language: impl Into<String>,
        date_of_publication: Option<PublicationDate>,
        publisher: Option<String>,
    ) -> Result<Self, MetadataError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(MetadataError::MissingTitle);
        }
        let primary_language = primary_language.into();
        if primary_language.trim().is_empty() {
            return Err(MetadataError::MissingLanguage);
        }

        Ok(Self {
            title,
            creators,
            identifiers,
            primary_language,
            date_of_publication,
            publisher,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Creators in document order; empty when the book names none.
    pub fn creators(&self) -> &[String] {
        &self.creators
    }

    pub fn first_creator(&self) -> Option<&str> {
        self.creators.first().map(String::as_str)
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn primary_language(&self) -> &str {
        &self.primary_language
    }

    pub fn date_of_publication(&self) -> Option<&PublicationDate> {
        self.date_of_publication.as_ref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ── Identifier ────────────────────────────────────────────────────────────────

/// A `dc:identifier` value with its optional `opf:scheme` (e.g. `"ISBN"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

impl Identifier {
    pub fn new(id: impl Into<String>, scheme: Option<String>) -> Self {
        Self {
            id: id.into(),
            scheme,
        }
    }
}

// ── PublicationDate ───────────────────────────────────────────────────────────

/// A `dc:date` value.
///
/// Producers frequently write dates that do not follow the permitted
/// profile; those are kept as [`PublicationDate::Invalid`] with the raw text
/// instead of failing the extraction. An invalid date serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicationDate {
    Valid(NaiveDate),
    Invalid(String),
}

impl PublicationDate {
    /// Parse an EPUB date: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, or a date-time
    /// (RFC 3339, or without offset). Time and offset are dropped.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        parse_calendar_date(text)
            .map(Self::Valid)
            .unwrap_or_else(|| Self::Invalid(raw.to_string()))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Valid(date) => Some(*date),
            Self::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match text.len() {
        4 if all_digits(text) => return NaiveDate::from_ymd_opt(text.parse().ok()?, 1, 1),
        7 => {
            let (year, month) = text.split_once('-')?;
            if all_digits(year) && all_digits(month) {
                return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1);
            }
            return None;
        }
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.date())
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Invalid(raw) => write!(f, "invalid date ({raw})"),
        }
    }
}

impl Serialize for PublicationDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
            Self::Invalid(_) => serializer.serialize_none(),
        }
    }
}
