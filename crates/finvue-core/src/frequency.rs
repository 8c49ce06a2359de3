//! Reporting period definitions.
//!
//! This module defines [`PeriodType`], the annual/quarterly split applied to
//! observations based on the filing form that reported them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Form marker of an annual report.
pub const ANNUAL_FORM: &str = "10-K";

/// Form marker of a quarterly report.
pub const QUARTERLY_FORM: &str = "10-Q";

/// Period type for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    /// Annual reporting period (10-K).
    #[default]
    Annual,
    /// Quarterly reporting period (10-Q).
    Quarterly,
}

impl PeriodType {
    /// Classifies a filing form marker.
    ///
    /// Only the exact `10-K` and `10-Q` markers are recognised; amendments and
    /// other forms (8-K, S-1, ...) belong to neither period.
    #[must_use]
    pub fn from_form(form: &str) -> Option<Self> {
        match form {
            ANNUAL_FORM => Some(Self::Annual),
            QUARTERLY_FORM => Some(Self::Quarterly),
            _ => None,
        }
    }

    /// Returns the form marker for this period type.
    #[must_use]
    pub const fn form(&self) -> &'static str {
        match self {
            Self::Annual => ANNUAL_FORM,
            Self::Quarterly => QUARTERLY_FORM,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annual => write!(f, "Annual ({ANNUAL_FORM})"),
            Self::Quarterly => write!(f, "Quarterly ({QUARTERLY_FORM})"),
        }
    }
}
