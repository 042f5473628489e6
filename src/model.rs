use crate::fields;
use crate::schema::{self, MarkerSlot, ReportType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Marker {
    pub email: String,
    pub name: String,
    pub password: String,
    pub administrator: bool,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub programme: String,
    pub first_marker: Option<String>,
    pub second_marker: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct DashboardStudent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub programme: String,
    pub first_marker: Option<String>,
    pub second_marker: Option<String>,
    pub first_marker_name: Option<String>,
    pub second_marker_name: Option<String>,
    pub coursework_report_id: Option<i64>,
    pub practice_report_id: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct MarkerSummary {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Session {
    pub email: String,
    pub pending_password_change: bool,
    pub last_refresh: i64,
}

pub const SELECT_MARKER: &str = r#"
    SELECT Email as email, Name as name, Password as password, Administrator as administrator, LastLogin as last_login
    FROM Marker WHERE Email = ?
"#;

pub const SELECT_STUDENT: &str = r#"
    SELECT ID as id, FirstName as first_name, LastName as last_name, Programme as programme,
           FirstMarker as first_marker, SecondMarker as second_marker
    FROM Student WHERE ID = ?
"#;

impl From<Marker> for schema::Marker {
    fn from(m: Marker) -> Self {
        schema::Marker {
            email: m.email,
            name: m.name,
            password: m.password,
            administrator: m.administrator,
            last_login: m.last_login,
        }
    }
}

impl From<Student> for schema::Student {
    fn from(s: Student) -> Self {
        schema::Student {
            id: s.id,
            first_name: s.first_name,
            last_name: s.last_name,
            programme: s.programme,
            first_marker: s.first_marker,
            second_marker: s.second_marker,
        }
    }
}

impl From<MarkerSummary> for schema::MarkerSummary {
    fn from(m: MarkerSummary) -> Self {
        schema::MarkerSummary {
            email: m.email,
            name: m.name,
        }
    }
}

impl DashboardStudent {
    pub fn student(&self) -> schema::Student {
        schema::Student {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            programme: self.programme.clone(),
            first_marker: self.first_marker.clone(),
            second_marker: self.second_marker.clone(),
        }
    }
}

fn slot_from_row(
    report_type: ReportType,
    slot: MarkerSlot,
    row: &SqliteRow,
) -> Result<schema::SlotReport, sqlx::Error> {
    let mut slot_report = schema::SlotReport::default();
    for d in fields::slot_descriptors(report_type, slot) {
        let mark: Option<f64> = row.try_get(d.mark)?;
        let comment: Option<String> = row.try_get(d.comment)?;
        slot_report.marks.set(d.criterion, mark);
        slot_report.comments.insert(d.criterion, comment);
    }
    slot_report.last_modified = row.try_get(fields::last_modified_column(slot))?;
    Ok(slot_report)
}

/// reads a `SELECT *` row of the Coursework or Practice table
pub fn report_from_row(report_type: ReportType, row: &SqliteRow) -> Result<schema::Report, sqlx::Error> {
    Ok(schema::Report {
        report_id: row.try_get("ReportID")?,
        student_id: row.try_get("StudentID")?,
        report_type,
        first: slot_from_row(report_type, MarkerSlot::First, row)?,
        second: slot_from_row(report_type, MarkerSlot::Second, row)?,
    })
}
