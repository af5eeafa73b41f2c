//! Format classification: map a source reference to a [`FormatTag`].
//!
//! Classification is a pure function of the reference string. It lower-cases
//! the reference, takes the text after the last `.`, and looks that suffix up
//! in a fixed table. Every input maps to exactly one tag; `Unknown` is a
//! terminal classification, not a fallthrough to some default strategy.
//!
//! The suffix is taken from the whole reference, not from a parsed URL path,
//! so `report.pdf?dl=1` has the suffix `pdf?dl=1` and classifies as
//! `Unknown`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Pdf,
    Docx,
    Pptx,
    Txt,
    Image,
    /// Never produced by [`classify`]; selected by the webpage entry point.
    Webpage,
    Unknown,
}

/// Suffix table consulted by [`classify`].
const SUFFIXES: &[(&str, FormatTag)] = &[
    ("pdf", FormatTag::Pdf),
    ("docx", FormatTag::Docx),
    ("txt", FormatTag::Txt),
    ("pptx", FormatTag::Pptx),
    ("png", FormatTag::Image),
    ("jpg", FormatTag::Image),
    ("jpeg", FormatTag::Image),
    ("gif", FormatTag::Image),
    ("bmp", FormatTag::Image),
];

/// Classify a source reference by its (case-insensitive) trailing suffix.
pub fn classify(reference: &str) -> FormatTag {
    let lowered = reference.to_lowercase();
    let Some((_, suffix)) = lowered.rsplit_once('.') else {
        return FormatTag::Unknown;
    };
    SUFFIXES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, tag)| *tag)
        .unwrap_or(FormatTag::Unknown)
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Pdf => "pdf",
            FormatTag::Docx => "docx",
            FormatTag::Pptx => "pptx",
            FormatTag::Txt => "txt",
            FormatTag::Image => "image",
            FormatTag::Webpage => "webpage",
            FormatTag::Unknown => "unknown",
        }
    }

    /// Every suffix that classifies to a supported tag, in table order.
    pub fn supported_suffixes() -> impl Iterator<Item = &'static str> {
        SUFFIXES.iter().map(|(s, _)| *s)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
