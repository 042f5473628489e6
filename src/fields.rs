//! Maps a (slot, criterion) pair onto the columns of the report tables.
//!
//! Column names never get assembled from request data. Every name used in a
//! query comes out of the tables below, and the UPDATE statements are fixed
//! strings with one placeholder per value.

use crate::schema::{Criterion, MarkerSlot, ReportType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub slot: MarkerSlot,
    pub criterion: Criterion,
    /// column (and form field) holding the mark, e.g. `FM_Methodology`
    pub mark: &'static str,
    /// column (and form field) holding the comment, e.g. `FM_MethodologyComments`
    pub comment: &'static str,
}

pub fn descriptor(slot: MarkerSlot, criterion: Criterion) -> FieldDescriptor {
    use Criterion::*;
    use MarkerSlot::*;

    let (mark, comment) = match (slot, criterion) {
        (First, ProjectDefinition) => ("FM_ProjectDefinition", "FM_ProjectDefinitionComments"),
        (First, ContextReview) => ("FM_ContextReview", "FM_ContextReviewComments"),
        (First, Methodology) => ("FM_Methodology", "FM_MethodologyComments"),
        (First, Evaluation) => ("FM_Evaluation", "FM_EvaluationComments"),
        (First, Structure) => ("FM_Structure", "FM_StructureComments"),
        (First, Communication) => ("FM_Communication", "FM_CommunicationComments"),
        (First, PosterStructure) => ("FM_PosterStructure", "FM_PosterStructureComments"),
        (First, Interview) => ("FM_Interview", "FM_InterviewComments"),
        (Second, ProjectDefinition) => ("SM_ProjectDefinition", "SM_ProjectDefinitionComments"),
        (Second, ContextReview) => ("SM_ContextReview", "SM_ContextReviewComments"),
        (Second, Methodology) => ("SM_Methodology", "SM_MethodologyComments"),
        (Second, Evaluation) => ("SM_Evaluation", "SM_EvaluationComments"),
        (Second, Structure) => ("SM_Structure", "SM_StructureComments"),
        (Second, Communication) => ("SM_Communication", "SM_CommunicationComments"),
        (Second, PosterStructure) => ("SM_PosterStructure", "SM_PosterStructureComments"),
        (Second, Interview) => ("SM_Interview", "SM_InterviewComments"),
    };

    FieldDescriptor {
        slot,
        criterion,
        mark,
        comment,
    }
}

/// descriptors of one slot in the order of `ReportType::criteria`
pub fn slot_descriptors(report_type: ReportType, slot: MarkerSlot) -> Vec<FieldDescriptor> {
    report_type
        .criteria()
        .iter()
        .map(|c| descriptor(slot, *c))
        .collect()
}

pub fn last_modified_column(slot: MarkerSlot) -> &'static str {
    match slot {
        MarkerSlot::First => "FM_LastModified",
        MarkerSlot::Second => "SM_LastModified",
    }
}

pub fn table(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::Coursework => "Coursework",
        ReportType::Practice => "Practice",
    }
}

/// Binds: (mark, comment) for every criterion in `ReportType::criteria`
/// order, then the LastModified timestamp, then ReportID and StudentID.
pub fn update_statement(report_type: ReportType, slot: MarkerSlot) -> &'static str {
    match (report_type, slot) {
        (ReportType::Coursework, MarkerSlot::First) => {
            r#"
            UPDATE Coursework SET
                FM_ProjectDefinition = ?, FM_ProjectDefinitionComments = ?,
                FM_ContextReview = ?, FM_ContextReviewComments = ?,
                FM_Methodology = ?, FM_MethodologyComments = ?,
                FM_Evaluation = ?, FM_EvaluationComments = ?,
                FM_Structure = ?, FM_StructureComments = ?,
                FM_LastModified = ?
            WHERE ReportID = ? AND StudentID = ?
            "#
        }
        (ReportType::Coursework, MarkerSlot::Second) => {
            r#"
            UPDATE Coursework SET
                SM_ProjectDefinition = ?, SM_ProjectDefinitionComments = ?,
                SM_ContextReview = ?, SM_ContextReviewComments = ?,
                SM_Methodology = ?, SM_MethodologyComments = ?,
                SM_Evaluation = ?, SM_EvaluationComments = ?,
                SM_Structure = ?, SM_StructureComments = ?,
                SM_LastModified = ?
            WHERE ReportID = ? AND StudentID = ?
            "#
        }
        (ReportType::Practice, MarkerSlot::First) => {
            r#"
            UPDATE Practice SET
                FM_Communication = ?, FM_CommunicationComments = ?,
                FM_PosterStructure = ?, FM_PosterStructureComments = ?,
                FM_Interview = ?, FM_InterviewComments = ?,
                FM_LastModified = ?
            WHERE ReportID = ? AND StudentID = ?
            "#
        }
        (ReportType::Practice, MarkerSlot::Second) => {
            r#"
            UPDATE Practice SET
                SM_Communication = ?, SM_CommunicationComments = ?,
                SM_PosterStructure = ?, SM_PosterStructureComments = ?,
                SM_Interview = ?, SM_InterviewComments = ?,
                SM_LastModified = ?
            WHERE ReportID = ? AND StudentID = ?
            "#
        }
    }
}

pub fn select_by_student(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::Coursework => "SELECT * FROM Coursework WHERE StudentID = ?",
        ReportType::Practice => "SELECT * FROM Practice WHERE StudentID = ?",
    }
}

pub fn insert_empty(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::Coursework => "INSERT INTO Coursework(StudentID) VALUES (?)",
        ReportType::Practice => "INSERT INTO Practice(StudentID) VALUES (?)",
    }
}
