//! Loading, updating and aggregating the reports of a student.
//!
//! Every function takes the `RequestContext` of the caller and checks access
//! before it touches anything. A marker asking for a student that does not
//! exist gets the very same answer as for a student of another marker.

pub mod submission;

pub use self::submission::{SlotSubmission, SubmittedField};

use crate::aggregation;
use crate::auth::{can_edit_report_slot, can_view_report, is_administrator};
use crate::error::MarkingError;
use crate::fields;
use crate::model;
use crate::schema::{
    self, AssignmentResult, DashboardRow, MarkerAssignment, MarkerSlot, MarkerSummary, OwnSlot,
    Report, ReportType, RequestContext, SlotStatus, Student, StudentReportView,
};
use chrono::{DateTime, Utc};
use futures::future::{try_join, try_join_all};
use log::{debug, info, warn};
use sqlx::SqlitePool;
use std::collections::HashSet;

pub const UNKNOWN_MARKER: &str = "Unknown";

pub(crate) async fn fetch_student(db: &SqlitePool, id: &str) -> Result<Option<Student>, MarkingError> {
    let student = sqlx::query_as::<_, model::Student>(model::SELECT_STUDENT)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(student.map(Student::from))
}

async fn fetch_report(
    db: &SqlitePool,
    student_id: &str,
    report_type: ReportType,
) -> Result<Option<Report>, MarkingError> {
    let row = sqlx::query(fields::select_by_student(report_type))
        .bind(student_id)
        .fetch_optional(db)
        .await?;

    match row {
        Some(r) => Ok(Some(model::report_from_row(report_type, &r)?)),
        None => Ok(None),
    }
}

async fn marker_name(db: &SqlitePool, email: Option<&str>) -> Result<String, MarkingError> {
    let email = match email {
        Some(e) => e,
        None => return Ok(UNKNOWN_MARKER.to_string()),
    };

    let name: Option<String> = sqlx::query_scalar("SELECT Name FROM Marker WHERE Email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(name.unwrap_or_else(|| UNKNOWN_MARKER.to_string()))
}

/// The student, if the caller may see it. Otherwise the uniform denial.
async fn visible_student(
    ctx: &RequestContext,
    db: &SqlitePool,
    student_id: &str,
) -> Result<Student, MarkingError> {
    let is_admin = is_administrator(&ctx.identity);
    if !schema::is_valid_student_id(student_id) {
        return Err(MarkingError::validation("Invalid student ID"));
    }

    match fetch_student(db, student_id).await? {
        Some(s) if can_view_report(&ctx.identity, &s) => Ok(s),
        _ => {
            warn!("{} was refused student {}", ctx.identity.email, student_id);
            Err(MarkingError::denied(is_admin, &format!("Student {}", student_id)))
        }
    }
}

pub async fn load_report(
    db: &SqlitePool,
    student_id: &str,
    report_type: ReportType,
) -> Result<Report, MarkingError> {
    match fetch_report(db, student_id, report_type).await? {
        Some(r) => Ok(r),
        None => Err(MarkingError::not_found(format!(
            "No {} report found for student {}",
            report_type.label(),
            student_id
        ))),
    }
}

/**
 * Writes the marks and comments of one slot and stamps its LastModified.
 *
 * Access is checked first and all values are validated before the
 * transaction starts, so a refused or invalid submission changes nothing.
 * All columns of the slot including the timestamp go out in a single
 * UPDATE inside one transaction. Returns the new timestamp.
 */
pub async fn update_report_slot(
    ctx: &RequestContext,
    db: &SqlitePool,
    report: &Report,
    slot: MarkerSlot,
    submission: &SlotSubmission,
) -> Result<DateTime<Utc>, MarkingError> {
    let is_admin = is_administrator(&ctx.identity);
    let student = match fetch_student(db, &report.student_id).await? {
        Some(s) if can_edit_report_slot(&ctx.identity, &s, report, slot) => s,
        _ => {
            warn!(
                "{} may not edit {} of student {} as {}",
                ctx.identity.email,
                report.report_type.label(),
                report.student_id,
                slot.label()
            );
            return Err(MarkingError::denied(is_admin, "The report"));
        }
    };

    let values = submission.validate(report.report_type)?;
    let unmarked: Vec<&str> = values
        .iter()
        .filter(|v| v.mark.is_none())
        .map(|v| v.criterion.name())
        .collect();
    debug!("unmarked criteria in this submission: {:?}", unmarked);
    let now = Utc::now();

    let mut tx = db.begin().await?;

    let mut query = sqlx::query(fields::update_statement(report.report_type, slot));
    for v in values {
        query = query.bind(v.mark).bind(v.comment);
    }
    query = query.bind(now).bind(report.report_id).bind(&report.student_id);

    let rows_affected = match query.execute(&mut *tx).await {
        Ok(r) => r.rows_affected(),
        Err(e) => return Err(MarkingError::persistence("Error while saving the report", e)),
    };
    if rows_affected != 1 {
        // dropping the transaction rolls it back
        return Err(MarkingError::denied(is_admin, "The report"));
    }

    if let Err(e) = tx.commit().await {
        return Err(MarkingError::persistence("Error while committing the report", e));
    }

    info!(
        "{} saved {} ({}) of student {}",
        ctx.identity.email,
        report.report_type.label(),
        slot.label(),
        student.id
    );
    Ok(now)
}

/// loads the report of a student and hands it to [`update_report_slot`]
pub async fn submit_marks(
    ctx: &RequestContext,
    db: &SqlitePool,
    student_id: &str,
    report_type: ReportType,
    slot: MarkerSlot,
    submission: &SlotSubmission,
) -> Result<DateTime<Utc>, MarkingError> {
    let student = visible_student(ctx, db, student_id).await?;
    let report = match fetch_report(db, &student.id, report_type).await? {
        Some(r) => r,
        None => {
            return Err(MarkingError::denied(
                is_administrator(&ctx.identity),
                &format!("The {} report", report_type.label()),
            ))
        }
    };

    update_report_slot(ctx, db, &report, slot, submission).await
}

fn own_slots(ctx: &RequestContext, student: &Student, reports: &[&Report]) -> Vec<OwnSlot> {
    let mut slots = vec![];
    if is_administrator(&ctx.identity) {
        return slots;
    }

    for slot in MarkerSlot::ALL {
        if student.marker_for(slot) != Some(ctx.identity.email.as_str()) {
            continue;
        }
        for report in reports {
            slots.push(OwnSlot {
                slot,
                report_type: report.report_type,
                status: if report.slot(slot).last_modified.is_some() {
                    SlotStatus::Marked
                } else {
                    SlotStatus::NotMarked
                },
            });
        }
    }
    slots
}

async fn dashboard_row(
    ctx: &RequestContext,
    db: &SqlitePool,
    row: model::DashboardStudent,
) -> Result<DashboardRow, MarkingError> {
    let student = row.student();
    let (coursework, practice) = try_join(
        fetch_report(db, &student.id, ReportType::Coursework),
        fetch_report(db, &student.id, ReportType::Practice),
    )
    .await?;

    let reports: Vec<&Report> = coursework.iter().chain(practice.iter()).collect();
    let own_slots = own_slots(ctx, &student, &reports);

    Ok(DashboardRow {
        own_slots,
        coursework_state: coursework.as_ref().map(|r| r.state()),
        practice_state: practice.as_ref().map(|r| r.state()),
        first_marker_name: row.first_marker_name,
        second_marker_name: row.second_marker_name,
        coursework_report_id: row.coursework_report_id,
        practice_report_id: row.practice_report_id,
        student,
    })
}

/**
 * The student list of the dashboard.
 *
 * Administrators get every student ordered by marker names, markers only
 * their own students with first marker assignments on top.
 */
pub async fn dashboard(ctx: &RequestContext, db: &SqlitePool) -> Result<Vec<DashboardRow>, MarkingError> {
    let rows = if is_administrator(&ctx.identity) {
        sqlx::query_as::<_, model::DashboardStudent>(
            r#"
            SELECT s.ID as id, s.FirstName as first_name, s.LastName as last_name, s.Programme as programme,
                   s.FirstMarker as first_marker, s.SecondMarker as second_marker,
                   m1.Name as first_marker_name, m2.Name as second_marker_name,
                   c.ReportID as coursework_report_id, p.ReportID as practice_report_id
            FROM Student s
            LEFT JOIN Coursework c ON s.ID = c.StudentID
            LEFT JOIN Practice p ON s.ID = p.StudentID
            LEFT JOIN Marker m1 ON s.FirstMarker = m1.Email
            LEFT JOIN Marker m2 ON s.SecondMarker = m2.Email
            ORDER BY m1.Name, m2.Name, s.ID
        "#,
        )
        .fetch_all(db)
        .await?
    } else {
        let email = &ctx.identity.email;
        sqlx::query_as::<_, model::DashboardStudent>(
            r#"
            SELECT s.ID as id, s.FirstName as first_name, s.LastName as last_name, s.Programme as programme,
                   s.FirstMarker as first_marker, s.SecondMarker as second_marker,
                   m1.Name as first_marker_name, m2.Name as second_marker_name,
                   c.ReportID as coursework_report_id, p.ReportID as practice_report_id
            FROM Student s
            LEFT JOIN Coursework c ON s.ID = c.StudentID
            LEFT JOIN Practice p ON s.ID = p.StudentID
            LEFT JOIN Marker m1 ON s.FirstMarker = m1.Email
            LEFT JOIN Marker m2 ON s.SecondMarker = m2.Email
            WHERE s.FirstMarker = ? OR s.SecondMarker = ?
            ORDER BY
                CASE
                    WHEN s.FirstMarker = ? THEN 0
                    WHEN s.SecondMarker = ? THEN 1
                    ELSE 2
                END,
                s.FirstMarker,
                s.SecondMarker,
                s.ID
        "#,
        )
        .bind(email)
        .bind(email)
        .bind(email)
        .bind(email)
        .fetch_all(db)
        .await?
    };

    debug!("dashboard of {} has {} students", ctx.identity.email, rows.len());
    try_join_all(rows.into_iter().map(|row| dashboard_row(ctx, db, row))).await
}

/**
 * The aggregated, read only view of one student for the view page, the
 * printable report and the PDF export.
 */
pub async fn view_student(
    ctx: &RequestContext,
    db: &SqlitePool,
    student_id: &str,
) -> Result<StudentReportView, MarkingError> {
    let student = visible_student(ctx, db, student_id).await?;
    build_view(ctx, db, student).await
}

async fn build_view(
    ctx: &RequestContext,
    db: &SqlitePool,
    student: Student,
) -> Result<StudentReportView, MarkingError> {
    let (coursework, practice) = try_join(
        fetch_report(db, &student.id, ReportType::Coursework),
        fetch_report(db, &student.id, ReportType::Practice),
    )
    .await?;

    let first_marker_name = marker_name(db, student.marker_for(MarkerSlot::First)).await?;
    let second_marker_name = marker_name(db, student.marker_for(MarkerSlot::Second)).await?;

    // the edit buttons depend on any report of the student
    let any_report = coursework.as_ref().or(practice.as_ref());
    let can_edit = |slot: MarkerSlot| match any_report {
        Some(r) => can_edit_report_slot(&ctx.identity, &student, r, slot),
        None => false,
    };
    let can_edit_first = can_edit(MarkerSlot::First);
    let can_edit_second = can_edit(MarkerSlot::Second);

    let coursework = coursework.as_ref().map(aggregation::summarize);
    let practice = practice.as_ref().map(aggregation::summarize);

    let coursework_avg = coursework.as_ref().and_then(|s| s.average_total);
    let practice_avg = practice.as_ref().and_then(|s| s.average_total);

    Ok(StudentReportView {
        overall_total: aggregation::overall_total(coursework_avg, practice_avg),
        overall_line: aggregation::overall_line(coursework_avg, practice_avg),
        student,
        first_marker_name,
        second_marker_name,
        coursework,
        practice,
        can_edit_first,
        can_edit_second,
    })
}

fn require_admin(ctx: &RequestContext, what: &str) -> Result<(), MarkingError> {
    if is_administrator(&ctx.identity) {
        return Ok(());
    }
    warn!("{} is no administrator and tried to {}", ctx.identity.email, what);
    Err(MarkingError::access_denied(format!(
        "Only administrators may {}",
        what
    )))
}

/// the view of every student, for the csv export
pub async fn export_all(ctx: &RequestContext, db: &SqlitePool) -> Result<Vec<StudentReportView>, MarkingError> {
    require_admin(ctx, "export reports")?;

    let students = sqlx::query_as::<_, model::Student>(
        r#"
        SELECT ID as id, FirstName as first_name, LastName as last_name, Programme as programme,
               FirstMarker as first_marker, SecondMarker as second_marker
        FROM Student ORDER BY ID
    "#,
    )
    .fetch_all(db)
    .await?;

    try_join_all(
        students
            .into_iter()
            .map(|s| build_view(ctx, db, Student::from(s))),
    )
    .await
}

pub async fn list_markers(ctx: &RequestContext, db: &SqlitePool) -> Result<Vec<MarkerSummary>, MarkingError> {
    require_admin(ctx, "list markers")?;

    let markers = sqlx::query_as::<_, model::MarkerSummary>(
        "SELECT Email as email, Name as name FROM Marker ORDER BY Name",
    )
    .fetch_all(db)
    .await?;
    Ok(markers.into_iter().map(MarkerSummary::from).collect())
}

pub(crate) fn normalize(marker: &Option<String>) -> Option<String> {
    match marker {
        Some(m) if !m.trim().is_empty() => Some(m.trim().to_string()),
        _ => None,
    }
}

/**
 * Sets first and second marker for a batch of students.
 *
 * Each student is updated on its own. A bad entry lands in the matching
 * bucket of the result and the rest of the batch still goes through.
 */
pub async fn bulk_assign_markers(
    ctx: &RequestContext,
    db: &SqlitePool,
    assignments: Vec<MarkerAssignment>,
) -> Result<AssignmentResult, MarkingError> {
    require_admin(ctx, "assign markers")?;

    let known: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT Email FROM Marker")
        .fetch_all(db)
        .await?
        .into_iter()
        .collect();

    let mut result = AssignmentResult::default();
    for assignment in assignments {
        let student_id = assignment.student_id.trim().to_string();
        if !schema::is_valid_student_id(&student_id) {
            result.id_invalid.push(student_id);
            continue;
        }

        let first = normalize(&assignment.first_marker);
        let second = normalize(&assignment.second_marker);
        if [&first, &second]
            .iter()
            .any(|m| matches!(m, Some(email) if !known.contains(email)))
        {
            result.marker_unknown.push(student_id);
            continue;
        }

        match sqlx::query("UPDATE Student SET FirstMarker = ?, SecondMarker = ? WHERE ID = ?")
            .bind(&first)
            .bind(&second)
            .bind(&student_id)
            .execute(db)
            .await
        {
            Ok(r) if r.rows_affected() == 0 => result.student_not_found.push(student_id),
            Ok(_) => result.assigned.push(student_id),
            Err(e) => {
                warn!("assigning markers to {} failed ({})", student_id, e);
                result.failed.push(student_id);
            }
        }
    }

    info!(
        "{} assigned markers: {} saved, {} rejected",
        ctx.identity.email,
        result.assigned.len(),
        result.id_invalid.len()
            + result.student_not_found.len()
            + result.marker_unknown.len()
            + result.failed.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests;
