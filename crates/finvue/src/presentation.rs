//! Chart and overview models, plus sinks that render them.
//!
//! Nothing here fetches or reshapes data beyond picking series out of the
//! fan-out table; rows and ratios come from [`crate::normalize`].

use std::io::{self, Write};

use chrono::NaiveDate;
use polars::prelude::{DataFrame, PolarsResult};

use finvue_core::{Concept, Entity, MetricsTable, Observation, PeriodRow, PeriodType, RatioRow};

use crate::normalize::{
    StatementView, compute_ratios, merge_series, ratios_to_frame, rows_to_frame,
};

/// Placeholder for a metric with no annual observation.
pub const MISSING: &str = "N/A";

/// Fixed series colours, indexed by series position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colors: &'static [&'static str],
}

impl Palette {
    /// The default eight-colour palette.
    pub const DEFAULT: Self = Self {
        colors: &[
            "#3498db", "#e74c3c", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
        ],
    };

    /// Colour for the series at `index`; wraps around past the last colour.
    #[must_use]
    pub fn color(&self, index: usize) -> &'static str {
        self.colors[index % self.colors.len()]
    }

    /// Number of distinct colours.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false; a palette has at least one colour.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a chart draws its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per period.
    Bar,
    /// A line through the periods.
    Line,
}

/// One plotted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Period end date.
    pub date: NaiveDate,
    /// Reported value.
    pub value: f64,
}

/// One entity's values for the selected concept.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Entity title, shown in the legend.
    pub name: String,
    /// Series colour.
    pub color: &'static str,
    /// Points, ascending by date.
    pub points: Vec<Point>,
}

/// A chart ready for a rendering widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Chart heading.
    pub title: String,
    /// Drawing style.
    pub kind: ChartKind,
    /// One series per selected entity, in selection order.
    pub series: Vec<Series>,
}

/// Latest annual value of one concept for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewEntry {
    /// Entity title.
    pub title: String,
    /// Latest annual value, if the entity reported one.
    pub value: Option<f64>,
}

impl OverviewEntry {
    /// `$1,234,567` or `N/A`.
    #[must_use]
    pub fn display_value(&self) -> String {
        self.value
            .map_or_else(|| MISSING.to_string(), |v| format!("${}", format_grouped(v)))
    }
}

/// Overview card for one concept.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewCard {
    /// Concept label.
    pub label: String,
    /// Upstream tag, used as the card heading.
    pub tag: String,
    /// One entry per selected entity.
    pub entries: Vec<OverviewEntry>,
}

/// Everything the dashboard shows for one fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Label of the charted concept.
    pub metric: String,
    /// Overview cards, one per concept.
    pub overview: Vec<OverviewCard>,
    /// Annual (10-K) bar chart.
    pub annual: Chart,
    /// Quarterly (10-Q) line chart.
    pub quarterly: Chart,
    /// Annual rows of the first selected entity.
    pub rows: Vec<PeriodRow>,
    /// Ratios derived from [`rows`](Self::rows).
    pub ratios: Vec<RatioRow>,
}

fn points(observations: &[Observation]) -> Vec<Point> {
    observations
        .iter()
        .map(|o| Point {
            date: o.end,
            value: o.val,
        })
        .collect()
}

impl DashboardView {
    /// Builds the view for the selected entities from a fan-out table.
    ///
    /// Entities missing from the table, or concepts missing for an entity,
    /// produce empty series and `N/A` overview entries.
    #[must_use]
    pub fn build(
        entities: &[Entity],
        table: &MetricsTable,
        concepts: &[Concept],
        selected_label: &str,
    ) -> Self {
        Self::build_with_palette(entities, table, concepts, selected_label, Palette::DEFAULT)
    }

    /// Like [`build`](Self::build) with a custom palette.
    #[must_use]
    pub fn build_with_palette(
        entities: &[Entity],
        table: &MetricsTable,
        concepts: &[Concept],
        selected_label: &str,
        palette: Palette,
    ) -> Self {
        let series_for = |entity: &Entity, label: &str| {
            table
                .get(&entity.ticker)
                .and_then(|metrics| metrics.get(label))
        };

        let overview = concepts
            .iter()
            .map(|concept| OverviewCard {
                label: concept.label.clone(),
                tag: concept.key.tag().to_string(),
                entries: entities
                    .iter()
                    .map(|entity| OverviewEntry {
                        title: entity.title.clone(),
                        value: series_for(entity, &concept.label)
                            .and_then(|s| s.latest_annual())
                            .map(|o| o.val),
                    })
                    .collect(),
            })
            .collect();

        let heading = concepts
            .iter()
            .find(|c| c.label == selected_label)
            .map_or(selected_label, |c| c.key.tag());

        let chart = |period_type: PeriodType, kind: ChartKind, title: &str| Chart {
            title: format!("{heading} {title}"),
            kind,
            series: entities
                .iter()
                .enumerate()
                .map(|(i, entity)| Series {
                    name: entity.title.clone(),
                    color: palette.color(i),
                    points: series_for(entity, selected_label)
                        .map(|s| points(s.get(period_type)))
                        .unwrap_or_default(),
                })
                .collect(),
        };

        let rows = entities
            .first()
            .and_then(|e| table.get(&e.ticker))
            .map(|metrics| merge_series(metrics, PeriodType::Annual))
            .unwrap_or_default();
        let ratios = compute_ratios(&rows);

        Self {
            metric: selected_label.to_string(),
            overview,
            annual: chart(PeriodType::Annual, ChartKind::Bar, "Annual Data (10-K)"),
            quarterly: chart(PeriodType::Quarterly, ChartKind::Line, "Quarterly Data (10-Q)"),
            rows,
            ratios,
        }
    }
}

/// Formats a number with comma thousands separators and at most two
/// fraction digits.
#[must_use]
pub fn format_grouped(value: f64) -> String {
    let rendered = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let frac = frac_part.trim_end_matches('0');
    let sign = if value < 0.0 && rendered.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

/// Destination for rendered dashboard states.
pub trait RenderSink {
    /// A fetch cycle is in progress.
    fn loading(&mut self) -> io::Result<()>;

    /// A fatal error banner.
    fn error(&mut self, message: &str) -> io::Result<()>;

    /// A completed dashboard.
    fn dashboard(&mut self, view: &DashboardView) -> io::Result<()>;

    /// The statement view of one company.
    fn statement(&mut self, view: &StatementView) -> io::Result<()>;
}

/// Renders views as plain text.
#[derive(Debug)]
pub struct TextSink<W> {
    out: W,
}

impl<W: Write> TextSink<W> {
    /// Wraps a writer.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn chart(&mut self, chart: &Chart) -> io::Result<()> {
        let style = match chart.kind {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
        };
        writeln!(self.out, "\n{} [{style}]", chart.title)?;
        for series in &chart.series {
            writeln!(self.out, "  {} ({})", series.name, series.color)?;
            if series.points.is_empty() {
                writeln!(self.out, "    {MISSING}")?;
            }
            for p in &series.points {
                writeln!(self.out, "    {}  {}", p.date, format_grouped(p.value))?;
            }
        }
        Ok(())
    }

    fn frame(&mut self, heading: &str, frame: PolarsResult<DataFrame>) -> io::Result<()> {
        writeln!(self.out, "\n{heading}")?;
        let frame = frame.map_err(|e| io::Error::other(e.to_string()))?;
        if frame.height() == 0 {
            return writeln!(self.out, "  {MISSING}");
        }
        writeln!(self.out, "{frame}")
    }

    fn ratios(&mut self, ratios: &[RatioRow]) -> io::Result<()> {
        writeln!(self.out, "\nRatios")?;
        if ratios.is_empty() {
            return writeln!(self.out, "  {MISSING}");
        }
        for r in ratios {
            writeln!(
                self.out,
                "  {}  current={:.2}  debt/equity={:.2}  roe={:.2}  margin={:.2}",
                r.date, r.current_ratio, r.debt_to_equity, r.return_on_equity, r.profit_margin
            )?;
        }
        Ok(())
    }
}

impl<W: Write> RenderSink for TextSink<W> {
    fn loading(&mut self) -> io::Result<()> {
        writeln!(self.out, "Loading...")
    }

    fn error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "Error: {message}")
    }

    fn dashboard(&mut self, view: &DashboardView) -> io::Result<()> {
        writeln!(self.out, "Financial Overview")?;
        for card in &view.overview {
            writeln!(self.out, "  {}", card.tag)?;
            for entry in &card.entries {
                writeln!(self.out, "    {}: {}", entry.title, entry.display_value())?;
            }
        }

        self.chart(&view.annual)?;
        self.chart(&view.quarterly)?;
        self.ratios(&view.ratios)?;
        self.out.flush()
    }

    fn statement(&mut self, view: &StatementView) -> io::Result<()> {
        writeln!(self.out, "{}", view.entity_name)?;
        self.frame("Annual (10-K)", rows_to_frame(&view.annual))?;
        self.frame("Quarterly (10-Q)", rows_to_frame(&view.quarterly))?;
        self.frame("Ratios", ratios_to_frame(&view.ratios))?;
        self.out.flush()
    }
}
