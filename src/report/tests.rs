use super::*;
use crate::error::NO_ACCESS;
use crate::schema::{Criterion, MarkingState, Role};
use crate::testing::{self, ADMIN, ALICE, BOB, CAROL};
use time_test::time_test;

fn all_marks(report_type: ReportType, mark: &str) -> SlotSubmission {
    report_type
        .criteria()
        .iter()
        .fold(SlotSubmission::new(), |s, c| s.with(*c, mark, "well done"))
}

fn assert_no_access(result: Result<impl std::fmt::Debug, MarkingError>) {
    match result {
        Err(MarkingError::AccessDenied { message }) => assert_eq!(message, NO_ACCESS),
        other => panic!("expected the uniform denial, got {:?}", other),
    }
}

#[actix_rt::test]
async fn second_marker_alone_halves_the_totals() {
    let db = testing::seeded_db().await;
    let bob = testing::ctx(BOB, Role::Marker);

    submit_marks(
        &bob,
        &db,
        "10000001",
        ReportType::Coursework,
        MarkerSlot::Second,
        &all_marks(ReportType::Coursework, "80"),
    )
    .await
    .unwrap();

    let view = view_student(&bob, &db, "10000001").await.unwrap();
    let coursework = view.coursework.unwrap();
    assert_eq!(coursework.first_total, None);
    assert_eq!(coursework.second_total, Some(80.0));
    assert_eq!(coursework.average_total, Some(40.0));
    assert_eq!(coursework.state, MarkingState::PartiallyMarked);
    assert_eq!(coursework.first_last_modified, aggregation::NEVER_MODIFIED);

    assert_eq!(view.practice.unwrap().average_total, None);
    assert_eq!(view.overall_total, Some(20.0));
    assert_eq!(view.overall_line, "Total Marks:(40.00%x80%)+(Not markedx20%)=20.00%");

    assert_eq!(view.first_marker_name, "Alice Archer");
    assert_eq!(view.second_marker_name, "Bob Baker");
    assert!(!view.can_edit_first);
    assert!(view.can_edit_second);
}

#[actix_rt::test]
async fn out_of_range_mark_changes_nothing() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);
    let report = load_report(&db, "10000001", ReportType::Coursework).await.unwrap();

    let submission = all_marks(ReportType::Coursework, "70").with(Criterion::Methodology, "150", "");
    match update_report_slot(&alice, &db, &report, MarkerSlot::First, &submission).await {
        Err(MarkingError::Validation { message }) => {
            assert_eq!(message, "Mark for Methodology must be between 0 and 100")
        }
        other => panic!("unexpected {:?}", other),
    }

    let after = load_report(&db, "10000001", ReportType::Coursework).await.unwrap();
    assert_eq!(after, report);
    assert_eq!(after.first.last_modified, None);
}

#[actix_rt::test]
async fn update_writes_one_slot_and_stamps_it() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);
    let report = load_report(&db, "10000002", ReportType::Practice).await.unwrap();

    let submission = SlotSubmission::new()
        .with(Criterion::Communication, "65", "clear slides")
        .with(Criterion::Interview, "", "did not attend");
    let stamp = update_report_slot(&alice, &db, &report, MarkerSlot::Second, &submission)
        .await
        .unwrap();

    let after = load_report(&db, "10000002", ReportType::Practice).await.unwrap();
    assert_eq!(after.second.marks.get(Criterion::Communication), Some(65.0));
    assert_eq!(after.second.marks.get(Criterion::Interview), None);
    assert_eq!(after.second.comment(Criterion::Interview), Some("did not attend"));
    assert_eq!(after.second.comment(Criterion::PosterStructure), Some(""));
    assert_eq!(
        after.second.last_modified.map(|t| t.timestamp_millis()),
        Some(stamp.timestamp_millis())
    );

    // the first marker's slot is untouched
    assert_eq!(after.first, report.first);
    assert_eq!(after.state(), MarkingState::PartiallyMarked);
}

#[actix_rt::test]
async fn refused_update_changes_nothing() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);
    let carol = testing::ctx(CAROL, Role::Marker);
    let report = load_report(&db, "10000001", ReportType::Coursework).await.unwrap();
    let submission = all_marks(ReportType::Coursework, "55");

    // Alice is first marker of 10000001, not second
    assert_no_access(update_report_slot(&alice, &db, &report, MarkerSlot::Second, &submission).await);
    // Carol has nothing to do with 10000001
    assert_no_access(update_report_slot(&carol, &db, &report, MarkerSlot::First, &submission).await);

    let after = load_report(&db, "10000001", ReportType::Coursework).await.unwrap();
    assert_eq!(after, report);
}

#[actix_rt::test]
async fn update_of_a_report_that_does_not_match_its_student_is_refused() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);
    let mut report = load_report(&db, "10000001", ReportType::Coursework).await.unwrap();
    let other = load_report(&db, "10000002", ReportType::Coursework).await.unwrap();
    report.report_id = other.report_id;

    assert_no_access(
        update_report_slot(
            &alice,
            &db,
            &report,
            MarkerSlot::First,
            &all_marks(ReportType::Coursework, "10"),
        )
        .await,
    );
    let untouched = load_report(&db, "10000002", ReportType::Coursework).await.unwrap();
    assert_eq!(untouched, other);
}

#[actix_rt::test]
async fn missing_and_foreign_students_look_the_same_to_markers() {
    let db = testing::seeded_db().await;
    let carol = testing::ctx(CAROL, Role::Marker);
    let admin = testing::ctx(ADMIN, Role::Administrator);

    let foreign = view_student(&carol, &db, "10000001").await;
    let missing = view_student(&carol, &db, "99999999").await;
    assert_eq!(
        foreign.as_ref().map_err(|e| e.to_string()).err(),
        missing.as_ref().map_err(|e| e.to_string()).err()
    );
    assert_no_access(foreign);
    assert_no_access(missing);

    assert!(matches!(
        view_student(&admin, &db, "99999999").await,
        Err(MarkingError::NotFound { .. })
    ));
    assert!(matches!(
        view_student(&carol, &db, "1234").await,
        Err(MarkingError::Validation { .. })
    ));

    assert_no_access(
        submit_marks(
            &carol,
            &db,
            "99999999",
            ReportType::Practice,
            MarkerSlot::First,
            &SlotSubmission::new(),
        )
        .await,
    );
}

#[actix_rt::test]
async fn administrators_may_mark_any_slot() {
    let db = testing::seeded_db().await;
    let admin = testing::ctx(ADMIN, Role::Administrator);

    for slot in MarkerSlot::ALL {
        submit_marks(
            &admin,
            &db,
            "10000004",
            ReportType::Practice,
            slot,
            &all_marks(ReportType::Practice, "50"),
        )
        .await
        .unwrap();
    }

    let view = view_student(&admin, &db, "10000004").await.unwrap();
    let practice = view.practice.unwrap();
    assert_eq!(practice.state, MarkingState::FullyMarked);
    assert_eq!(practice.average_total, Some(50.0));
    assert_eq!(view.first_marker_name, UNKNOWN_MARKER);
    assert!(view.can_edit_first && view.can_edit_second);
}

#[actix_rt::test]
async fn dashboard_shows_own_students_first_marker_slots_on_top() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);

    submit_marks(
        &alice,
        &db,
        "10000001",
        ReportType::Coursework,
        MarkerSlot::First,
        &all_marks(ReportType::Coursework, "60"),
    )
    .await
    .unwrap();

    let rows = dashboard(&alice, &db).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.student.id.as_str()).collect();
    assert_eq!(ids, vec!["10000001", "10000002"]);

    let first = &rows[0];
    assert_eq!(first.first_marker_name.as_deref(), Some("Alice Archer"));
    assert_eq!(first.coursework_state, Some(MarkingState::PartiallyMarked));
    assert_eq!(first.practice_state, Some(MarkingState::Unmarked));
    assert_eq!(
        first.own_slots,
        vec![
            OwnSlot {
                slot: MarkerSlot::First,
                report_type: ReportType::Coursework,
                status: SlotStatus::Marked
            },
            OwnSlot {
                slot: MarkerSlot::First,
                report_type: ReportType::Practice,
                status: SlotStatus::NotMarked
            },
        ]
    );
    assert!(rows[1]
        .own_slots
        .iter()
        .all(|s| s.slot == MarkerSlot::Second && s.status == SlotStatus::NotMarked));
}

#[actix_rt::test]
async fn dashboard_of_administrators_lists_everybody() {
    let db = testing::seeded_db().await;
    let admin = testing::ctx(ADMIN, Role::Administrator);

    let rows = dashboard(&admin, &db).await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.student.id.as_str()).collect();
    assert_eq!(ids, vec!["10000004", "10000001", "10000002", "10000003"]);
    assert!(rows.iter().all(|r| r.own_slots.is_empty()));
    assert_eq!(rows[3].second_marker_name, None);

    let carol = testing::ctx(CAROL, Role::Marker);
    let rows = dashboard(&carol, &db).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[actix_rt::test]
async fn bulk_assign_is_best_effort() {
    time_test!();
    let db = testing::seeded_db().await;
    let admin = testing::ctx(ADMIN, Role::Administrator);

    let assignment = |id: &str, first: Option<&str>, second: Option<&str>| MarkerAssignment {
        student_id: id.to_string(),
        first_marker: first.map(str::to_string),
        second_marker: second.map(str::to_string),
    };

    let result = bulk_assign_markers(
        &admin,
        &db,
        vec![
            assignment("10000004", Some(CAROL), Some(BOB)),
            assignment("10000003", Some(CAROL), Some("")),
            assignment("123", Some(ALICE), None),
            assignment("10000001", Some("ghost@uni.ac.uk"), None),
            assignment("99999999", Some(ALICE), None),
        ],
    )
    .await
    .unwrap();

    assert_eq!(result.assigned, vec!["10000004", "10000003"]);
    assert_eq!(result.id_invalid, vec!["123"]);
    assert_eq!(result.marker_unknown, vec!["10000001"]);
    assert_eq!(result.student_not_found, vec!["99999999"]);
    assert!(result.failed.is_empty());

    let student = fetch_student(&db, "10000004").await.unwrap().unwrap();
    assert_eq!(student.first_marker.as_deref(), Some(CAROL));
    assert_eq!(student.second_marker.as_deref(), Some(BOB));

    // the rejected entry kept its markers
    let student = fetch_student(&db, "10000001").await.unwrap().unwrap();
    assert_eq!(student.first_marker.as_deref(), Some(ALICE));
}

#[actix_rt::test]
async fn admin_operations_are_refused_to_markers() {
    let db = testing::seeded_db().await;
    let alice = testing::ctx(ALICE, Role::Marker);

    assert!(matches!(
        bulk_assign_markers(&alice, &db, vec![]).await,
        Err(MarkingError::AccessDenied { .. })
    ));
    assert!(matches!(
        export_all(&alice, &db).await,
        Err(MarkingError::AccessDenied { .. })
    ));
    assert!(matches!(
        list_markers(&alice, &db).await,
        Err(MarkingError::AccessDenied { .. })
    ));
}

#[actix_rt::test]
async fn export_and_marker_list() {
    let db = testing::seeded_db().await;
    let admin = testing::ctx(ADMIN, Role::Administrator);

    let views = export_all(&admin, &db).await.unwrap();
    let ids: Vec<&str> = views.iter().map(|v| v.student.id.as_str()).collect();
    assert_eq!(ids, vec!["10000001", "10000002", "10000003", "10000004"]);
    assert!(views.iter().all(|v| v.overall_total.is_none()));
    assert_eq!(views[2].second_marker_name, UNKNOWN_MARKER);

    let markers = list_markers(&admin, &db).await.unwrap();
    let names: Vec<&str> = markers.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Admin Adams", "Alice Archer", "Bob Baker", "Carol Carter"]);
}
