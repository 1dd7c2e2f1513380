//! Canonical occupation, industry and classification codes
//!
//! Source tables spell the same code many ways: `"10"`, `"0010"`, `"10.0"`,
//! `"11-1011"`, `"111011"`, `"11-1011.00"`. This module reduces all of them to
//! the canonical fixed-width forms used as join keys:
//!
//! * occupation and industry codes: exactly 4 ASCII digits, zero padded
//! * classification (SOC) codes: `NN-NNNN`
//!
//! Values that cannot be reduced to the target shape normalize to `None`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Characters removed before a code is interpreted
const FORMATTING_CHARS: [char; 5] = ['-', '/', ' ', '\u{a0}', '.'];

static FOUR_DIGIT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}(\.0+)?$").expect("valid occupation pattern"));

static CLASSIFICATION_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{6}|\d{2}\D+\d{4}(\.\d+)?)$").expect("valid classification pattern")
});

static FLOAT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.0+$").expect("valid float suffix pattern"));

static TOKEN_DELIMITERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[;,/|&]|\sand\s").expect("valid delimiter pattern"));

/// Shape a column is expected to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeShape {
    /// CPS occupation code (1 to 4 digits)
    Occupation,
    /// CPS industry code (same shape as occupation)
    Industry,
    /// SOC classification code (6 digits or NN-NNNN)
    Classification,
}

impl CodeShape {
    /// Human readable name used in logs and errors
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Occupation => "occupation",
            Self::Industry => "industry",
            Self::Classification => "classification",
        }
    }

    /// Whether a trimmed, non-empty cell looks like a code of this shape
    #[must_use]
    pub fn matches(&self, cell: &str) -> bool {
        let cell = cell.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');
        match self {
            Self::Occupation | Self::Industry => FOUR_DIGIT_SHAPE.is_match(cell),
            Self::Classification => CLASSIFICATION_SHAPE.is_match(cell),
        }
    }

    /// Normalize a raw cell into the canonical string for this shape
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Option<String> {
        match self {
            Self::Occupation | Self::Industry => normalize_four_digit(raw),
            Self::Classification => normalize_classification(raw),
        }
    }
}

impl fmt::Display for CodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip formatting noise and require what remains to be all digits
fn clean_digits(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !FORMATTING_CHARS.contains(c))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

fn normalize_four_digit(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    // Spreadsheet exports write integer codes as floats ("10.0")
    let integral = FLOAT_SUFFIX
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let digits = clean_digits(integral)?;
    let tail = &digits[digits.len().saturating_sub(4)..];
    Some(format!("{tail:0>4}"))
}

fn normalize_classification(raw: &str) -> Option<String> {
    let digits = clean_digits(raw)?;
    if digits.len() < 6 {
        return None;
    }
    Some(format!("{}-{}", &digits[..2], &digits[2..6]))
}

/// Split a cell holding several codes ("11-1011/11-1021", "13-2011 and 13-2082")
#[must_use]
pub fn split_code_tokens(raw: &str) -> SmallVec<[&str; 2]> {
    TOKEN_DELIMITERS
        .split(raw)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

macro_rules! code_newtype {
    ($(#[$meta:meta])* $name:ident, $shape:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Normalize a raw value, returning `None` when it has the wrong shape
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                $shape.normalize(raw).map(Self)
            }

            /// The canonical string form
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

code_newtype!(
    /// 4-digit zero-padded CPS occupation code
    OccupationCode,
    CodeShape::Occupation
);

code_newtype!(
    /// 4-digit zero-padded CPS industry code
    IndustryCode,
    CodeShape::Industry
);

code_newtype!(
    /// SOC classification code in `NN-NNNN` form
    ClassificationCode,
    CodeShape::Classification
);

impl ClassificationCode {
    /// Major-group codes end in `0000` and are less specific than detailed codes
    #[must_use]
    pub fn is_major_group(&self) -> bool {
        self.0.ends_with("0000")
    }
}
