//! Chart configurations for the dashboard.
//!
//! Charts are built with `charming` and sent to the client as ECharts option
//! JSON, ready to be passed to `chart.setOption`.

use charming::{
    Chart,
    component::{Axis, Grid, Title, VisualMap, VisualMapPiece},
    element::{AxisPointer, AxisPointerType, AxisType, Tooltip, Trigger},
    series::{Bar, Line},
};
use serde::Serialize;
use serde_json::Value;
use time::Month;

use crate::{
    Error,
    analytics::{CategorySpending, MonthlyTotal, parse_month},
};

/// A dashboard chart with its ID and ECharts configuration.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardChart {
    /// A kebab-case ID the client can use for the chart's container.
    pub id: &'static str,
    /// The ECharts option object.
    pub options: Value,
}

impl DashboardChart {
    fn new(id: &'static str, chart: Chart) -> Result<Self, Error> {
        let options = serde_json::to_value(&chart)
            .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

        Ok(Self { id, options })
    }
}

/// Formats `YYYY-MM` months as a three-letter abbreviation and the year, e.g. "Jan 2025".
fn month_label(month: &str) -> String {
    let Ok(date) = parse_month(month) else {
        return month.to_owned();
    };

    let abbreviation = match date.month() {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    };

    format!("{abbreviation} {}", date.year())
}

fn grid() -> Grid {
    Grid::new()
        .left("3%")
        .right("4%")
        .bottom("3%")
        .contain_label(true)
}

fn axis_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}

/// A line chart of the net income per month, red below zero and green above.
pub fn net_income_chart(monthly_totals: &[MonthlyTotal]) -> Result<DashboardChart, Error> {
    let labels: Vec<String> = monthly_totals
        .iter()
        .map(|total| month_label(&total.month))
        .collect();
    let values: Vec<f64> = monthly_totals.iter().map(|total| total.net).collect();

    let chart = Chart::new()
        .title(
            Title::new()
                .text("Net income")
                .subtext("Last twelve months"),
        )
        .tooltip(axis_tooltip())
        .grid(grid())
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(Axis::new().type_(AxisType::Value))
        .visual_map(VisualMap::new().show(false).pieces(vec![
            VisualMapPiece::new().lte(-1).color("red"),
            VisualMapPiece::new().gte(0).color("green"),
        ]))
        .series(Line::new().name("Net Income").data(values));

    DashboardChart::new("net-income-chart", chart)
}

/// A bar chart of this month's expenses per category, largest first.
pub fn expenses_chart(spending: &[CategorySpending]) -> Result<DashboardChart, Error> {
    let labels: Vec<String> = spending
        .iter()
        .map(|category| category.name.clone())
        .collect();
    let values: Vec<f64> = spending.iter().map(|category| category.total).collect();

    let chart = Chart::new()
        .title(
            Title::new()
                .text("Expenses")
                .subtext("This month, grouped by category"),
        )
        .tooltip(axis_tooltip())
        .grid(grid())
        .x_axis(Axis::new().type_(AxisType::Category).data(labels))
        .y_axis(Axis::new().type_(AxisType::Value))
        .series(Bar::new().name("Expenses").data(values));

    DashboardChart::new("expenses-chart", chart)
}
