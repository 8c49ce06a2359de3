//! Core data types for disclosure data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Cik`] - Central Index Key, the stable entity identifier
//! - [`Entity`] / [`Directory`] - Companies listed in the ticker directory
//! - [`ConceptKey`] / [`Concept`] - Taxonomy-qualified financial facts and their labels
//! - [`Observation`] / [`ConceptSeries`] - Reported values, split by period
//! - [`ConceptDocument`] / [`CompanyFacts`] - Upstream payloads
//! - [`PeriodRow`] / [`RatioRow`] - Normalized rows consumed by charts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;
use crate::frequency::PeriodType;

/// Largest value representable in ten decimal digits.
const MAX_CIK: u64 = 9_999_999_999;

/// Default taxonomy for bare concept tags.
pub const DEFAULT_TAXONOMY: &str = "us-gaap";

/// Unit preferred when a concept reports several.
pub const PREFERRED_UNIT: &str = "USD";

/// Central Index Key identifying an SEC registrant.
///
/// Always rendered zero-padded to ten digits, which is the form the upstream
/// expects in URLs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cik(u64);

impl Cik {
    /// Creates a CIK from its numeric value.
    pub fn new(value: u64) -> crate::Result<Self> {
        if value > MAX_CIK {
            return Err(DataError::InvalidParameter(format!(
                "CIK {value} has more than 10 digits"
            )));
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the zero-padded 10-digit form.
    #[must_use]
    pub fn padded(&self) -> String {
        format!("{:010}", self.0)
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

impl FromStr for Cik {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("CIK")
            .or_else(|| s.strip_prefix("cik"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DataError::InvalidParameter(format!("Invalid CIK: {s:?}")));
        }
        let value = digits
            .parse::<u64>()
            .map_err(|e| DataError::InvalidParameter(format!("Invalid CIK {s:?}: {e}")))?;
        Self::new(value)
    }
}

/// A company listed in the ticker directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Central Index Key.
    pub cik_str: Cik,
    /// Ticker symbol.
    pub ticker: String,
    /// Company name.
    pub title: String,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(cik: Cik, ticker: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            cik_str: cik,
            ticker: ticker.into(),
            title: title.into(),
        }
    }

    /// Returns the entity's CIK.
    #[must_use]
    pub const fn cik(&self) -> Cik {
        self.cik_str
    }
}

/// The full ticker directory, keyed by the upstream's row index.
///
/// Serializes back into the upstream shape: `{"0": {cik_str, ticker, title}, ...}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Directory(BTreeMap<u64, Entity>);

impl Directory {
    /// Builds a directory from entities, indexing them in order.
    #[must_use]
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self((0u64..).zip(entities).collect())
    }

    /// Iterates over the entities in directory order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.0.values()
    }

    /// Returns the first entity in directory order.
    #[must_use]
    pub fn first(&self) -> Option<&Entity> {
        self.0.values().next()
    }

    /// Finds an entity by ticker, ignoring case.
    #[must_use]
    pub fn find_ticker(&self, ticker: &str) -> Option<&Entity> {
        self.0
            .values()
            .find(|e| e.ticker.eq_ignore_ascii_case(ticker.trim()))
    }

    /// Finds an entity by CIK.
    #[must_use]
    pub fn find_cik(&self, cik: Cik) -> Option<&Entity> {
        self.0.values().find(|e| e.cik_str == cik)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A taxonomy-qualified concept key such as `us-gaap:Assets`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConceptKey {
    taxonomy: String,
    tag: String,
}

impl ConceptKey {
    /// Creates a key, validating both parts.
    pub fn new(taxonomy: impl Into<String>, tag: impl Into<String>) -> crate::Result<Self> {
        let taxonomy = taxonomy.into();
        let tag = tag.into();
        for part in [&taxonomy, &tag] {
            if part.is_empty()
                || !part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(DataError::InvalidParameter(format!(
                    "Invalid concept key part: {part:?}"
                )));
            }
        }
        Ok(Self { taxonomy, tag })
    }

    /// Creates a `us-gaap` key.
    pub fn us_gaap(tag: impl Into<String>) -> crate::Result<Self> {
        Self::new(DEFAULT_TAXONOMY, tag)
    }

    /// Returns the taxonomy (e.g. `us-gaap`, `dei`).
    #[must_use]
    pub fn taxonomy(&self) -> &str {
        &self.taxonomy
    }

    /// Returns the tag (e.g. `Assets`).
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.taxonomy, self.tag)
    }
}

impl FromStr for ConceptKey {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((taxonomy, tag)) => Self::new(taxonomy, tag),
            None => Self::us_gaap(s.trim()),
        }
    }
}

impl TryFrom<String> for ConceptKey {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConceptKey> for String {
    fn from(key: ConceptKey) -> Self {
        key.to_string()
    }
}

/// Short labels used as row fields.
pub mod labels {
    /// Total assets.
    pub const ASSETS: &str = "Assets";
    /// Total liabilities.
    pub const LIABILITIES: &str = "Liabilities";
    /// Stockholders' equity.
    pub const EQUITY: &str = "Equity";
    /// Revenue.
    pub const REVENUE: &str = "Revenue";
    /// Net income (loss).
    pub const NET_INCOME: &str = "NetIncome";
    /// Net cash from operating activities.
    pub const OPERATING_CASH_FLOW: &str = "OperatingCashFlow";
    /// Net cash from investing activities.
    pub const INVESTING_CASH_FLOW: &str = "InvestingCashFlow";
    /// Net cash from financing activities.
    pub const FINANCING_CASH_FLOW: &str = "FinancingCashFlow";
}

/// Built-in label/tag pairs; the first five make up the dashboard set.
const BUILTIN_CONCEPTS: [(&str, &str); 8] = [
    (labels::ASSETS, "Assets"),
    (labels::LIABILITIES, "Liabilities"),
    (labels::EQUITY, "StockholdersEquity"),
    (labels::REVENUE, "Revenues"),
    (labels::NET_INCOME, "NetIncomeLoss"),
    (labels::OPERATING_CASH_FLOW, "NetCashProvidedByUsedInOperatingActivities"),
    (labels::INVESTING_CASH_FLOW, "NetCashProvidedByUsedInInvestingActivities"),
    (labels::FINANCING_CASH_FLOW, "NetCashProvidedByUsedInFinancingActivities"),
];

/// A financial concept with its short internal label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Concept {
    /// Short label, used as the row field name.
    pub label: String,
    /// Taxonomy-qualified key.
    pub key: ConceptKey,
}

impl Concept {
    /// Creates a concept.
    #[must_use]
    pub fn new(label: impl Into<String>, key: ConceptKey) -> Self {
        Self {
            label: label.into(),
            key,
        }
    }

    /// The concepts fetched for the dashboard: balance sheet and income
    /// statement headline figures.
    #[must_use]
    pub fn dashboard_set() -> Vec<Self> {
        builtin(5)
    }

    /// The concepts used for the statement view, including cash flows.
    #[must_use]
    pub fn statement_set() -> Vec<Self> {
        builtin(BUILTIN_CONCEPTS.len())
    }

    /// Looks up a built-in concept by label, ignoring case.
    #[must_use]
    pub fn by_label(label: &str) -> Option<Self> {
        Self::statement_set()
            .into_iter()
            .find(|c| c.label.eq_ignore_ascii_case(label))
    }
}

fn builtin(count: usize) -> Vec<Concept> {
    BUILTIN_CONCEPTS
        .iter()
        .take(count)
        .map(|(label, tag)| Concept {
            label: (*label).to_string(),
            key: ConceptKey {
                taxonomy: DEFAULT_TAXONOMY.to_string(),
                tag: (*tag).to_string(),
            },
        })
        .collect()
}

/// One reported value for one concept and period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Start of the period, for duration facts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    /// End of the period.
    pub end: NaiveDate,
    /// Reported value.
    pub val: f64,
    /// Accession number of the filing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accn: Option<String>,
    /// Fiscal year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<i32>,
    /// Fiscal period (FY, Q1, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp: Option<String>,
    /// Filing form type (10-K, 10-Q, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    /// Filing date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filed: Option<NaiveDate>,
    /// Calendar frame (CY2023, CY2023Q4I, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    /// Unit of measure; not part of the upstream entry, filled in when the
    /// observation is lifted out of its unit bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Observation {
    /// Creates an observation with only the required fields set.
    #[must_use]
    pub const fn new(end: NaiveDate, val: f64) -> Self {
        Self {
            start: None,
            end,
            val,
            accn: None,
            fy: None,
            fp: None,
            form: None,
            filed: None,
            frame: None,
            unit: None,
        }
    }

    /// Sets the filing form.
    #[must_use]
    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    /// Returns the period this observation belongs to, if any.
    #[must_use]
    pub fn period_type(&self) -> Option<PeriodType> {
        self.form.as_deref().and_then(PeriodType::from_form)
    }
}

/// Picks the preferred unit bucket and tags each observation with its unit.
fn pick_unit(units: &BTreeMap<String, Vec<Observation>>) -> Vec<Observation> {
    let bucket = units
        .get_key_value(PREFERRED_UNIT)
        .or_else(|| units.iter().next());

    match bucket {
        Some((unit, values)) => values
            .iter()
            .cloned()
            .map(|mut o| {
                o.unit = Some(unit.clone());
                o
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Observations of one concept split into annual and quarterly partitions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptSeries {
    /// Observations from annual filings, ascending by end date.
    pub annual: Vec<Observation>,
    /// Observations from quarterly filings, ascending by end date.
    pub quarterly: Vec<Observation>,
}

impl ConceptSeries {
    /// An empty series, used as the fallback for failed fetches.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            annual: Vec::new(),
            quarterly: Vec::new(),
        }
    }

    /// Partitions observations by filing form and sorts each partition
    /// ascending by end date. Observations from other forms are dropped.
    #[must_use]
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut series = Self::empty();
        for obs in observations {
            match obs.period_type() {
                Some(PeriodType::Annual) => series.annual.push(obs),
                Some(PeriodType::Quarterly) => series.quarterly.push(obs),
                None => {}
            }
        }
        series.annual.sort_by_key(|o| o.end);
        series.quarterly.sort_by_key(|o| o.end);
        series
    }

    /// Returns the partition for a period type.
    #[must_use]
    pub fn get(&self, period_type: PeriodType) -> &[Observation] {
        match period_type {
            PeriodType::Annual => &self.annual,
            PeriodType::Quarterly => &self.quarterly,
        }
    }

    /// Most recent annual observation.
    #[must_use]
    pub fn latest_annual(&self) -> Option<&Observation> {
        self.annual.last()
    }

    /// Returns true if both partitions are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annual.is_empty() && self.quarterly.is_empty()
    }
}

/// Label → series for one company.
pub type CompanyMetrics = BTreeMap<String, ConceptSeries>;

/// Ticker → label → series for a whole fetch cycle.
pub type MetricsTable = BTreeMap<String, CompanyMetrics>;

/// Payload of the company-concept endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDocument {
    /// CIK of the reporting entity.
    pub cik: Cik,
    /// Taxonomy of the concept.
    pub taxonomy: String,
    /// Tag of the concept.
    pub tag: String,
    /// Human readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Entity name.
    #[serde(default)]
    pub entity_name: String,
    /// Observations grouped by unit.
    pub units: BTreeMap<String, Vec<Observation>>,
}

impl ConceptDocument {
    /// Observations in the preferred unit (`USD`), else the first unit.
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        pick_unit(&self.units)
    }
}

/// Facts reported for one tag in the company-facts payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    /// Human readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Observations grouped by unit.
    #[serde(default)]
    pub units: BTreeMap<String, Vec<Observation>>,
}

/// Payload of the company-facts endpoint: every fact an entity reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFacts {
    /// CIK of the reporting entity.
    pub cik: Cik,
    /// Entity name.
    #[serde(default)]
    pub entity_name: String,
    /// Facts organized by taxonomy and tag.
    #[serde(default)]
    pub facts: BTreeMap<String, BTreeMap<String, FactSet>>,
}

impl CompanyFacts {
    /// Observations for a concept, in the preferred unit.
    ///
    /// Returns an empty list when the entity never reported the concept.
    #[must_use]
    pub fn observations(&self, key: &ConceptKey) -> Vec<Observation> {
        self.facts
            .get(key.taxonomy())
            .and_then(|taxonomy| taxonomy.get(key.tag()))
            .map(|set| pick_unit(&set.units))
            .unwrap_or_default()
    }
}

/// Merged multi-concept record for one reporting date.
///
/// Serializes flat: `{"date": "2023-12-31", "Assets": 100.0, ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodRow {
    /// Period end date.
    pub date: NaiveDate,
    /// Values keyed by concept label.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl PeriodRow {
    /// Creates an empty row for a date.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    /// Returns the value for a label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied()
    }

    /// Sets the value for a label, overwriting any earlier value.
    pub fn set(&mut self, label: impl Into<String>, value: f64) {
        self.values.insert(label.into(), value);
    }

    /// Sets a value and returns the row.
    #[must_use]
    pub fn with(mut self, label: impl Into<String>, value: f64) -> Self {
        self.set(label, value);
        self
    }
}

/// Ratios derived from a [`PeriodRow`].
///
/// Each ratio is 0 when its denominator is zero or an operand is missing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioRow {
    /// Period end date.
    pub date: NaiveDate,
    /// Assets / Liabilities.
    pub current_ratio: f64,
    /// Liabilities / Equity.
    pub debt_to_equity: f64,
    /// NetIncome / Equity.
    pub return_on_equity: f64,
    /// NetIncome / Revenue.
    pub profit_margin: f64,
}
