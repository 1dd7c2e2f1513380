//! Person-level survey records at each pipeline stage
//!
//! A respondent moves through three shapes: [`PersonRecord`] after ingest,
//! [`ClassifiedPersonRecord`] after the crosswalk join and [`PanelRecord`]
//! after the exposure join. The weight travels unchanged through all three.

use std::fmt;

use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::traits::{ArrowSchema, Weighted};
use crate::codes::{ClassificationCode, IndustryCode, OccupationCode};

/// Respondent sex as coded by CPS (1 = male, 2 = female)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    /// Code 1
    Male,
    /// Code 2
    Female,
}

impl Sex {
    /// Parse a CPS code or label; anything else (including 9 = NIU) is `None`
    #[must_use]
    pub fn from_code(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let code = raw.strip_suffix(".0").unwrap_or(raw);
        match code.to_ascii_lowercase().as_str() {
            "1" | "m" | "male" => Some(Self::Male),
            "2" | "f" | "female" => Some(Self::Female),
            _ => None,
        }
    }

    /// Label written to output tables
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Sex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::from_code(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown sex label '{label}'")))
    }
}

/// A slim, typed survey respondent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// 4-digit occupation code, absent when the source value did not normalize
    pub occupation_code: Option<OccupationCode>,
    /// Person-level weight
    pub weight: f64,
    /// State FIPS code
    pub state_code: Option<i32>,
    /// Age in years
    pub age: Option<f64>,
    /// Sex
    pub sex: Option<Sex>,
    /// 4-digit industry code
    pub industry_code: Option<IndustryCode>,
}

fn person_fields() -> Vec<Field> {
    vec![
        Field::new("occupation_code", DataType::Utf8, true),
        Field::new("weight", DataType::Float64, false),
        Field::new("state_code", DataType::Int32, true),
        Field::new("age", DataType::Float64, true),
        Field::new("sex", DataType::Utf8, true),
        Field::new("industry_code", DataType::Utf8, true),
    ]
}

impl ArrowSchema for PersonRecord {
    fn schema() -> Schema {
        Schema::new(person_fields())
    }
}

impl Weighted for PersonRecord {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// A respondent after the occupation→classification join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPersonRecord {
    /// 4-digit occupation code
    pub occupation_code: Option<OccupationCode>,
    /// Person-level weight
    pub weight: f64,
    /// State FIPS code
    pub state_code: Option<i32>,
    /// Age in years
    pub age: Option<f64>,
    /// Sex
    pub sex: Option<Sex>,
    /// 4-digit industry code
    pub industry_code: Option<IndustryCode>,
    /// SOC code, absent when the occupation did not match the crosswalk
    pub classification_code: Option<ClassificationCode>,
}

impl ClassifiedPersonRecord {
    /// Attach a classification code to a person
    #[must_use]
    pub fn from_person(person: PersonRecord, classification_code: Option<ClassificationCode>) -> Self {
        Self {
            occupation_code: person.occupation_code,
            weight: person.weight,
            state_code: person.state_code,
            age: person.age,
            sex: person.sex,
            industry_code: person.industry_code,
            classification_code,
        }
    }
}

impl ArrowSchema for ClassifiedPersonRecord {
    fn schema() -> Schema {
        let mut fields = person_fields();
        fields.push(Field::new("classification_code", DataType::Utf8, true));
        Schema::new(fields)
    }
}

impl Weighted for ClassifiedPersonRecord {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// One respondent of the terminal analysis panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRecord {
    /// 4-digit occupation code
    pub occupation_code: Option<OccupationCode>,
    /// Person-level weight
    pub weight: f64,
    /// State FIPS code
    pub state_code: Option<i32>,
    /// Age in years
    pub age: Option<f64>,
    /// Sex
    pub sex: Option<Sex>,
    /// 4-digit industry code
    pub industry_code: Option<IndustryCode>,
    /// SOC code
    pub classification_code: Option<ClassificationCode>,
    /// Exposure score of the SOC code
    pub exposure: Option<f64>,
}

impl PanelRecord {
    /// Attach an exposure score to a classified respondent
    #[must_use]
    pub fn from_classified(person: ClassifiedPersonRecord, exposure: Option<f64>) -> Self {
        Self {
            occupation_code: person.occupation_code,
            weight: person.weight,
            state_code: person.state_code,
            age: person.age,
            sex: person.sex,
            industry_code: person.industry_code,
            classification_code: person.classification_code,
            exposure,
        }
    }
}

impl ArrowSchema for PanelRecord {
    fn schema() -> Schema {
        let mut fields = person_fields();
        fields.push(Field::new("classification_code", DataType::Utf8, true));
        fields.push(Field::new("exposure", DataType::Float64, true));
        Schema::new(fields)
    }
}

impl Weighted for PanelRecord {
    fn weight(&self) -> f64 {
        self.weight
    }
}
