//! Historical column names for survey and reference fields
//!
//! CPS extracts have renamed their variables several times (IPUMS vs. Census
//! public-use names, pre- and post-2010 occupation codes). A field is resolved
//! by walking its alias list in order; the first alias present in the table
//! wins regardless of where that column sits.

use crate::table::{Column, RawTable};

/// Known names for one logical field, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAliases {
    /// Logical field name
    pub field: &'static str,
    /// Header names to try, matched case-insensitively
    pub aliases: &'static [&'static str],
}

/// Occupation code of the respondent's main job
pub const OCCUPATION: FieldAliases = FieldAliases {
    field: "occupation",
    aliases: &["OCC", "OCC2010", "OCC1990", "PEIOOCC", "A_OCC", "occupation_code"],
};

/// Person-level ASEC supplement weight
pub const WEIGHT: FieldAliases = FieldAliases {
    field: "weight",
    aliases: &["ASECWT", "MARSUPWT", "weight"],
};

/// State FIPS code
pub const STATE: FieldAliases = FieldAliases {
    field: "state",
    aliases: &["STATEFIP", "GESTFIPS", "state_code"],
};

/// Age in years
pub const AGE: FieldAliases = FieldAliases {
    field: "age",
    aliases: &["AGE", "A_AGE", "PRTAGE"],
};

/// Sex (1 = male, 2 = female)
pub const SEX: FieldAliases = FieldAliases {
    field: "sex",
    aliases: &["SEX", "A_SEX", "PESEX"],
};

/// Industry code of the respondent's main job
pub const INDUSTRY: FieldAliases = FieldAliases {
    field: "industry",
    aliases: &["IND", "IND1990", "PEIOIND", "A_IND", "industry_code"],
};

/// Classification code in task inventories and pre-built crosswalks
pub const CLASSIFICATION: FieldAliases = FieldAliases {
    field: "classification",
    aliases: &["classification_code", "soc", "soc_code", "onetsoc_code", "O*NET-SOC Code"],
};

/// Task importance score
pub const TASK_IMPORTANCE: FieldAliases = FieldAliases {
    field: "task_importance",
    aliases: &["task_importance", "importance", "IM"],
};

/// Share of working time spent on a task
pub const TASK_TIME: FieldAliases = FieldAliases {
    field: "task_time",
    aliases: &["task_time", "time", "time_weight", "FT"],
};

/// Survey identifiers and period fields that are never occupation codes
pub const PERSON_IDENTIFIERS: FieldAliases = FieldAliases {
    field: "identifier",
    aliases: &["YEAR", "MONTH", "SERIAL", "PERNUM", "CPSID", "CPSIDP", "HRHHID", "PULINENO"],
};

/// Occupation code column of a pre-built crosswalk
pub const CROSSWALK_OCCUPATION: FieldAliases = FieldAliases {
    field: "crosswalk occupation",
    aliases: &["occupation_code", "occ", "census_code"],
};

impl FieldAliases {
    /// Return the first alias present in `table`
    #[must_use]
    pub fn resolve<'t>(&self, table: &'t RawTable) -> Option<&'t Column> {
        self.aliases
            .iter()
            .find_map(|alias| table.column_ignore_case(alias))
    }

    /// Whether `name` is one of this field's aliases
    #[must_use]
    pub fn names(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}
