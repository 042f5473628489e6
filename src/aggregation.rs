//! Mark arithmetic. Nothing in here touches the database.
//!
//! Two different null policies are in play and both are intended:
//!
//! * Inside one marker's report a criterion without a mark counts as 0 towards
//!   that marker's weighted total, unless the marker has not entered a single
//!   mark, in which case the total is `None`.
//! * Combining two values (first with second marker, coursework with practice)
//!   uses [`average`], which halves a value whose counterpart is missing. A
//!   single marker's 80 therefore averages to 40, not 80.

use crate::schema::{
    Criterion, CriterionSummary, MarkerSlot, Report, ReportSummary, ReportType, SlotMarks,
};
use chrono::{DateTime, Utc};

pub const NOT_MARKED: &str = "Not marked";
pub const NEVER_MODIFIED: &str = "Never";

/// Null tolerant mean of two marks.
///
/// A missing side is not skipped: the present value is divided by two.
pub fn average(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a / 2.0),
        (None, Some(b)) => Some(b / 2.0),
        (Some(a), Some(b)) => Some((a + b) / 2.0),
    }
}

/// Weighted sum over the criteria of `report_type`, `None` only when no criterion has a mark
pub fn weighted_total(report_type: ReportType, marks: &SlotMarks) -> Option<f64> {
    let criteria = report_type.criteria();
    if criteria.iter().all(|c| marks.get(*c).is_none()) {
        return None;
    }

    // summing in whole percent keeps e.g. five 80s at exactly 80
    let sum: f64 = criteria
        .iter()
        .map(|c| marks.get(*c).unwrap_or(0.0) * c.weight_percent() as f64)
        .sum();
    Some(sum / 100.0)
}

pub fn weighted_coursework_total(marks: &SlotMarks) -> Option<f64> {
    weighted_total(ReportType::Coursework, marks)
}

pub fn weighted_practice_total(marks: &SlotMarks) -> Option<f64> {
    weighted_total(ReportType::Practice, marks)
}

/// Combines the coursework and practice averages into the final mark.
///
/// This is [`average`] of the two, so one missing component halves the
/// other. The printed form is produced by [`overall_line`].
pub fn overall_total(coursework_avg: Option<f64>, practice_avg: Option<f64>) -> Option<f64> {
    average(coursework_avg, practice_avg)
}

pub fn format_mark(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => NOT_MARKED.to_string(),
    }
}

pub fn format_last_modified(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => NEVER_MODIFIED.to_string(),
    }
}

/// `Total Marks:(<coursework>x80%)+(<practice>x20%)=<total>`
pub fn overall_line(coursework_avg: Option<f64>, practice_avg: Option<f64>) -> String {
    format!(
        "Total Marks:({}x80%)+({}x20%)={}",
        format_mark(coursework_avg),
        format_mark(practice_avg),
        format_mark(overall_total(coursework_avg, practice_avg))
    )
}

fn criterion_summary(report: &Report, criterion: Criterion) -> CriterionSummary {
    let first_mark = report.first.marks.get(criterion);
    let second_mark = report.second.marks.get(criterion);
    CriterionSummary {
        criterion,
        title: criterion.title(),
        weight: criterion.weight(),
        first_mark,
        second_mark,
        average: average(first_mark, second_mark),
        first_comment: report.first.comment(criterion).map(str::to_string),
        second_comment: report.second.comment(criterion).map(str::to_string),
    }
}

/// Per criterion and per slot numbers of one report
pub fn summarize(report: &Report) -> ReportSummary {
    let first_total = weighted_total(report.report_type, &report.slot(MarkerSlot::First).marks);
    let second_total = weighted_total(report.report_type, &report.slot(MarkerSlot::Second).marks);

    ReportSummary {
        report_id: report.report_id,
        report_type: report.report_type,
        state: report.state(),
        criteria: report
            .report_type
            .criteria()
            .iter()
            .map(|c| criterion_summary(report, *c))
            .collect(),
        first_total,
        second_total,
        average_total: average(first_total, second_total),
        first_last_modified: format_last_modified(report.first.last_modified),
        second_last_modified: format_last_modified(report.second.last_modified),
    }
}
