use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// student ids are exactly eight digits
pub fn is_valid_student_id(id: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    match PATTERN.get_or_init(|| Regex::new(r"^[0-9]{8}$").ok()) {
        Some(re) => re.is_match(id),
        None => false,
    }
}

/// The two kinds of report every student has
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportType {
    Coursework,
    Practice,
}

impl ReportType {
    pub const ALL: [ReportType; 2] = [ReportType::Coursework, ReportType::Practice];

    /// parses the `type` request parameter ("course" or "practice")
    pub fn from_param(param: &str) -> Option<ReportType> {
        match param {
            "course" | "coursework" => Some(ReportType::Coursework),
            "practice" => Some(ReportType::Practice),
            _ => None,
        }
    }

    pub fn param(&self) -> &'static str {
        match self {
            ReportType::Coursework => "course",
            ReportType::Practice => "practice",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportType::Coursework => "Coursework",
            ReportType::Practice => "Practice",
        }
    }

    /// criteria in the order they are shown and stored
    pub fn criteria(&self) -> &'static [Criterion] {
        match self {
            ReportType::Coursework => &COURSEWORK_CRITERIA,
            ReportType::Practice => &PRACTICE_CRITERIA,
        }
    }
}

/// first marker (FM) or second marker (SM)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerSlot {
    First,
    Second,
}

impl MarkerSlot {
    pub const ALL: [MarkerSlot; 2] = [MarkerSlot::First, MarkerSlot::Second];

    /// parses the `marker` request parameter ("first" or "second")
    pub fn from_param(param: &str) -> Option<MarkerSlot> {
        match param {
            "first" => Some(MarkerSlot::First),
            "second" => Some(MarkerSlot::Second),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            MarkerSlot::First => "FM",
            MarkerSlot::Second => "SM",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarkerSlot::First => "1st Marker",
            MarkerSlot::Second => "2nd Marker",
        }
    }
}

pub const COURSEWORK_CRITERIA: [Criterion; 5] = [
    Criterion::ProjectDefinition,
    Criterion::ContextReview,
    Criterion::Methodology,
    Criterion::Evaluation,
    Criterion::Structure,
];

pub const PRACTICE_CRITERIA: [Criterion; 3] = [
    Criterion::Communication,
    Criterion::PosterStructure,
    Criterion::Interview,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Criterion {
    ProjectDefinition,
    ContextReview,
    Methodology,
    Evaluation,
    Structure,
    Communication,
    PosterStructure,
    Interview,
}

impl Criterion {
    pub fn report_type(&self) -> ReportType {
        match self {
            Criterion::ProjectDefinition
            | Criterion::ContextReview
            | Criterion::Methodology
            | Criterion::Evaluation
            | Criterion::Structure => ReportType::Coursework,
            Criterion::Communication | Criterion::PosterStructure | Criterion::Interview => {
                ReportType::Practice
            }
        }
    }

    /// weight in whole percent, the criteria of one report type add up to 100
    pub fn weight_percent(&self) -> u8 {
        match self {
            Criterion::ProjectDefinition => 10,
            Criterion::ContextReview => 15,
            Criterion::Methodology => 50,
            Criterion::Evaluation => 15,
            Criterion::Structure => 10,
            Criterion::Communication => 50,
            Criterion::PosterStructure => 25,
            Criterion::Interview => 25,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight_percent() as f64 / 100.0
    }

    /// column stem, also used in form field names
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::ProjectDefinition => "ProjectDefinition",
            Criterion::ContextReview => "ContextReview",
            Criterion::Methodology => "Methodology",
            Criterion::Evaluation => "Evaluation",
            Criterion::Structure => "Structure",
            Criterion::Communication => "Communication",
            Criterion::PosterStructure => "PosterStructure",
            Criterion::Interview => "Interview",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Criterion::ProjectDefinition => "Project Definition and Planning",
            Criterion::ContextReview => "Context Review and Subject Knowledge",
            Criterion::Methodology => "Project Methodology and Implementation",
            Criterion::Evaluation => "Critical Evaluation and Conclusions",
            Criterion::Structure => "Structure and Presentation",
            Criterion::Communication => "Communication of Information",
            Criterion::PosterStructure => "Poster Structure and Aesthetics",
            Criterion::Interview => "Interview",
        }
    }
}

/// The marks one marker gave on one report. A criterion that is missing
/// from the map is the same as an explicit `None` ("not yet marked").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotMarks {
    marks: BTreeMap<Criterion, Option<f64>>,
}

impl SlotMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: Criterion, mark: Option<f64>) -> Self {
        self.set(criterion, mark);
        self
    }

    pub fn set(&mut self, criterion: Criterion, mark: Option<f64>) {
        self.marks.insert(criterion, mark);
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.marks.get(&criterion).copied().flatten()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SlotReport {
    pub marks: SlotMarks,
    pub comments: BTreeMap<Criterion, Option<String>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl SlotReport {
    pub fn comment(&self, criterion: Criterion) -> Option<&str> {
        self.comments.get(&criterion).and_then(|c| c.as_deref())
    }
}

/// unmarked -> partially marked -> fully marked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MarkingState {
    Unmarked,
    PartiallyMarked,
    FullyMarked,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub report_id: i64,
    pub student_id: String,
    pub report_type: ReportType,
    pub first: SlotReport,
    pub second: SlotReport,
}

impl Report {
    pub fn slot(&self, slot: MarkerSlot) -> &SlotReport {
        match slot {
            MarkerSlot::First => &self.first,
            MarkerSlot::Second => &self.second,
        }
    }

    pub fn state(&self) -> MarkingState {
        let criteria = self.report_type.criteria();
        let mut set = 0;
        for slot in MarkerSlot::ALL {
            let marks = &self.slot(slot).marks;
            set += criteria.iter().filter(|c| marks.get(**c).is_some()).count();
        }

        if set == 0 {
            MarkingState::Unmarked
        } else if set == criteria.len() * MarkerSlot::ALL.len() {
            MarkingState::FullyMarked
        } else {
            MarkingState::PartiallyMarked
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub programme: String,
    pub first_marker: Option<String>,
    pub second_marker: Option<String>,
}

impl Student {
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn marker_for(&self, slot: MarkerSlot) -> Option<&str> {
        match slot {
            MarkerSlot::First => self.first_marker.as_deref(),
            MarkerSlot::Second => self.second_marker.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoginStatus {
    FirstLogin,
    Active,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub administrator: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl Marker {
    /// a marker is on first login while the stored credential is still the hash of the email
    pub fn login_status(&self) -> LoginStatus {
        if self.password == sha256::digest(self.email.as_str()) {
            LoginStatus::FirstLogin
        } else {
            LoginStatus::Active
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Role {
    Administrator,
    Marker,
}

/// A marker that passed authentication with a completed password change
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// A marker that authenticated with the default credential and has to
/// change the password before anything else.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingIdentity {
    pub email: String,
}

/// Everything a report operation gets to know about the caller
#[derive(Clone, Debug, PartialEq)]
pub struct RequestContext {
    pub identity: Identity,
    pub api_key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerSummary {
    pub email: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    Marked,
    NotMarked,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardRow {
    pub student: Student,
    pub first_marker_name: Option<String>,
    pub second_marker_name: Option<String>,
    pub coursework_report_id: Option<i64>,
    pub practice_report_id: Option<i64>,
    pub coursework_state: Option<MarkingState>,
    pub practice_state: Option<MarkingState>,
    /// status of the slots the caller holds for this student (empty for administrators)
    pub own_slots: Vec<OwnSlot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnSlot {
    pub slot: MarkerSlot,
    pub report_type: ReportType,
    pub status: SlotStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CriterionSummary {
    pub criterion: Criterion,
    pub title: &'static str,
    pub weight: f64,
    pub first_mark: Option<f64>,
    pub second_mark: Option<f64>,
    pub average: Option<f64>,
    pub first_comment: Option<String>,
    pub second_comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportSummary {
    pub report_id: i64,
    pub report_type: ReportType,
    pub state: MarkingState,
    pub criteria: Vec<CriterionSummary>,
    pub first_total: Option<f64>,
    pub second_total: Option<f64>,
    pub average_total: Option<f64>,
    pub first_last_modified: String,
    pub second_last_modified: String,
}

/// The read only, fully aggregated view of one student. This is what the
/// view page, the printable report and the exports consume.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudentReportView {
    pub student: Student,
    pub first_marker_name: String,
    pub second_marker_name: String,
    pub coursework: Option<ReportSummary>,
    pub practice: Option<ReportSummary>,
    pub overall_total: Option<f64>,
    pub overall_line: String,
    pub can_edit_first: bool,
    pub can_edit_second: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MarkerAssignment {
    pub student_id: String,
    /// empty or `None` clears the slot
    pub first_marker: Option<String>,
    pub second_marker: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct AssignmentResult {
    pub assigned: Vec<String>,
    pub id_invalid: Vec<String>,
    pub student_not_found: Vec<String>,
    pub marker_unknown: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadStudent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub programme: String,
    pub first_marker: Option<String>,
    pub second_marker: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct UploadStudentResult {
    pub valid: Vec<UploadStudent>,
    pub id_invalid: Vec<UploadStudent>,
    pub marker_unknown: Vec<UploadStudent>,
    pub id_conflict: Vec<UploadStudent>,
}
