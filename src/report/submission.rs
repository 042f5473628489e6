use crate::error::MarkingError;
use crate::fields;
use crate::schema::{Criterion, MarkerSlot, ReportType};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// What the edit form sent for one criterion, still unparsed
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SubmittedField {
    pub mark: Option<String>,
    pub comment: Option<String>,
}

/// The raw content of an edit form for one slot
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SlotSubmission {
    pub fields: BTreeMap<Criterion, SubmittedField>,
}

/// a field after validation, ready to be bound
#[derive(Debug, PartialEq)]
pub(crate) struct ValidatedField {
    pub criterion: Criterion,
    pub mark: Option<f64>,
    pub comment: String,
}

impl SlotSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: Criterion, mark: &str, comment: &str) -> Self {
        self.fields.insert(
            criterion,
            SubmittedField {
                mark: Some(mark.to_string()),
                comment: Some(comment.to_string()),
            },
        );
        self
    }

    /**
     * Picks the fields of one slot out of posted form data.
     *
     * The keys are the column names, e.g. `FM_Methodology` and
     * `FM_MethodologyComments`. Keys of the other slot or of unknown
     * fields are ignored.
     */
    pub fn from_form(report_type: ReportType, slot: MarkerSlot, form: &HashMap<String, String>) -> Self {
        let mut submission = SlotSubmission::new();
        for d in fields::slot_descriptors(report_type, slot) {
            let mark = form.get(d.mark).cloned();
            let comment = form.get(d.comment).cloned();
            if mark.is_some() || comment.is_some() {
                submission
                    .fields
                    .insert(d.criterion, SubmittedField { mark, comment });
            }
        }
        submission
    }

    /**
     * Parses every criterion of `report_type` in storage order.
     *
     * An empty or absent mark becomes `None`, an absent comment the empty
     * string. The first bad value fails the whole submission.
     */
    pub(crate) fn validate(&self, report_type: ReportType) -> Result<Vec<ValidatedField>, MarkingError> {
        if let Some(c) = self.fields.keys().find(|c| c.report_type() != report_type) {
            return Err(MarkingError::validation(format!(
                "{} is not a criterion of the {} report",
                c.name(),
                report_type.label()
            )));
        }

        let mut values = vec![];
        for criterion in report_type.criteria() {
            let field = self.fields.get(criterion);
            let mark = parse_mark(*criterion, field.and_then(|f| f.mark.as_deref()))?;
            let comment = field.and_then(|f| f.comment.clone()).unwrap_or_default();
            values.push(ValidatedField {
                criterion: *criterion,
                mark,
                comment,
            });
        }
        Ok(values)
    }
}

fn parse_mark(criterion: Criterion, raw: Option<&str>) -> Result<Option<f64>, MarkingError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(r) => r,
    };

    let mark = match raw.parse::<f64>() {
        Ok(m) if m.is_finite() => m,
        _ => {
            return Err(MarkingError::validation(format!(
                "Mark for {} must be a number",
                criterion.name()
            )))
        }
    };

    if !(0.0..=100.0).contains(&mark) {
        return Err(MarkingError::validation(format!(
            "Mark for {} must be between 0 and 100",
            criterion.name()
        )));
    }
    Ok(Some(mark))
}
