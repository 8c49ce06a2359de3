//! Reshaping of per-concept observations into per-date rows.
//!
//! Everything here is pure: no I/O, no hidden state, and no failure modes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;

use finvue_core::{
    CompanyFacts, Concept, ConceptSeries, Observation, PeriodRow, PeriodType, RatioRow, labels,
};

/// Merges observation lists into one row per period end date.
///
/// For every observation the row for its date is found or created, and the
/// field named by the concept's label is set to the observation's value.
/// Later writes for the same (date, label) overwrite earlier ones. Rows come
/// back sorted ascending by date, one per distinct date. The result does not
/// depend on the order in which distinct labels are supplied.
pub fn merge_by_date<'a, I>(series: I) -> Vec<PeriodRow>
where
    I: IntoIterator<Item = (&'a str, &'a [Observation])>,
{
    let mut rows: BTreeMap<NaiveDate, PeriodRow> = BTreeMap::new();

    for (label, observations) in series {
        for obs in observations {
            rows.entry(obs.end)
                .or_insert_with(|| PeriodRow::new(obs.end))
                .set(label, obs.val);
        }
    }

    rows.into_values().collect()
}

/// `numerator / denominator`, or 0 when either is missing, the denominator is
/// zero, or the quotient is not finite.
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => {
            let q = n / d;
            if q.is_finite() { q } else { 0.0 }
        }
        _ => 0.0,
    }
}

/// Derives the four ratios for each row.
///
/// Missing operands and zero denominators yield 0, so "no data" and "zero"
/// are indistinguishable in the output.
#[must_use]
pub fn compute_ratios(rows: &[PeriodRow]) -> Vec<RatioRow> {
    rows.iter()
        .map(|row| RatioRow {
            date: row.date,
            current_ratio: ratio(row.get(labels::ASSETS), row.get(labels::LIABILITIES)),
            debt_to_equity: ratio(row.get(labels::LIABILITIES), row.get(labels::EQUITY)),
            return_on_equity: ratio(row.get(labels::NET_INCOME), row.get(labels::EQUITY)),
            profit_margin: ratio(row.get(labels::NET_INCOME), row.get(labels::REVENUE)),
        })
        .collect()
}

/// Merges one period partition of a company's series.
pub fn merge_series<'a, I>(series: I, period_type: PeriodType) -> Vec<PeriodRow>
where
    I: IntoIterator<Item = (&'a String, &'a ConceptSeries)>,
{
    merge_by_date(
        series
            .into_iter()
            .map(|(label, s)| (label.as_str(), s.get(period_type))),
    )
}

/// Annual and quarterly rows plus annual ratios for one company.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementView {
    /// Entity name.
    pub entity_name: String,
    /// Rows built from annual (10-K) observations.
    pub annual: Vec<PeriodRow>,
    /// Rows built from quarterly (10-Q) observations.
    pub quarterly: Vec<PeriodRow>,
    /// Ratios derived from the annual rows.
    pub ratios: Vec<RatioRow>,
}

/// Builds the statement view from a company-facts payload.
///
/// Concepts the entity never reported simply contribute no fields.
#[must_use]
pub fn statement_rows(facts: &CompanyFacts, concepts: &[Concept]) -> StatementView {
    let series: BTreeMap<String, ConceptSeries> = concepts
        .iter()
        .map(|c| {
            (
                c.label.clone(),
                ConceptSeries::from_observations(facts.observations(&c.key)),
            )
        })
        .collect();

    let annual = merge_series(&series, PeriodType::Annual);
    let quarterly = merge_series(&series, PeriodType::Quarterly);
    let ratios = compute_ratios(&annual);

    StatementView {
        entity_name: facts.entity_name.clone(),
        annual,
        quarterly,
        ratios,
    }
}

/// Converts rows to a `DataFrame` with a `date` column followed by one
/// nullable column per label, in label order.
pub fn rows_to_frame(rows: &[PeriodRow]) -> PolarsResult<DataFrame> {
    let labels: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.values.keys().map(String::as_str))
        .collect();

    let mut columns = Vec::with_capacity(labels.len() + 1);
    columns.push(Column::new(
        "date".into(),
        rows.iter().map(|r| r.date.to_string()).collect::<Vec<_>>(),
    ));
    for label in labels {
        columns.push(Column::new(
            label.into(),
            rows.iter().map(|r| r.get(label)).collect::<Vec<Option<f64>>>(),
        ));
    }

    DataFrame::new(columns)
}

/// Converts ratio rows to a `DataFrame`.
pub fn ratios_to_frame(rows: &[RatioRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new(
            "date".into(),
            rows.iter().map(|r| r.date.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "currentRatio".into(),
            rows.iter().map(|r| r.current_ratio).collect::<Vec<_>>(),
        ),
        Column::new(
            "debtToEquity".into(),
            rows.iter().map(|r| r.debt_to_equity).collect::<Vec<_>>(),
        ),
        Column::new(
            "returnOnEquity".into(),
            rows.iter().map(|r| r.return_on_equity).collect::<Vec<_>>(),
        ),
        Column::new(
            "profitMargin".into(),
            rows.iter().map(|r| r.profit_margin).collect::<Vec<_>>(),
        ),
    ])
}
