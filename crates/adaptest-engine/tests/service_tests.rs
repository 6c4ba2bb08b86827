//! End-to-end tests of `TestingService` over the in-memory store.

use std::sync::Arc;

use adaptest_core::assessment::ValidityStatus;
use adaptest_core::error::EngineError;
use adaptest_core::model::{
    Category, DifficultyLabel, IrtParams, Item, QualityFlag, SessionStatus,
};
use adaptest_core::statistics::ReportFilters;
use adaptest_core::store::Store;
use adaptest_engine::{AnswerSubmission, EngineConfig, SubmitOutcome, TestingService};
use adaptest_store::MemoryStore;

fn item(id: &str, b: f64, difficulty: DifficultyLabel) -> Item {
    Item {
        id: id.into(),
        text: format!("question {id}"),
        category: Category::Logic,
        difficulty,
        params: IrtParams { a: 1.2, b, c: 0.2 },
        p_value: None,
        response_count: 0,
        quality: QualityFlag::Normal,
    }
}

fn graded_pool(size: usize) -> Vec<Item> {
    (0..size)
        .map(|n| {
            let b = -2.0 + 4.0 * (n as f64) / (size.max(2) as f64 - 1.0);
            let difficulty = if b < -0.67 {
                DifficultyLabel::Easy
            } else if b > 0.67 {
                DifficultyLabel::Hard
            } else {
                DifficultyLabel::Medium
            };
            item(&format!("q{n:03}"), b, difficulty)
        })
        .collect()
}

fn service(pool: Vec<Item>) -> TestingService<MemoryStore> {
    TestingService::new(Arc::new(MemoryStore::new(pool)), EngineConfig::default())
}

fn submission(item_id: &str, correct: bool, secs: f64) -> AnswerSubmission {
    AnswerSubmission {
        item_id: item_id.into(),
        answer: if correct { "right" } else { "wrong" }.into(),
        correct,
        response_time_secs: Some(secs),
    }
}

/// Drive a session to completion with a fixed correctness pattern, cycling
/// the pattern if the session outlasts it.
async fn run_session(
    service: &TestingService<MemoryStore>,
    user: &str,
    pattern: &[bool],
    secs: f64,
) -> (uuid::Uuid, SubmitOutcome) {
    let start = service.start_session(user).await.unwrap();
    let mut item_id = start.item.id.clone();
    let mut n = 0usize;
    loop {
        let correct = pattern[n % pattern.len()];
        n += 1;
        let outcome = service
            .submit_answer(start.session.id, submission(&item_id, correct, secs))
            .await
            .unwrap();
        match outcome {
            SubmitOutcome::Next { item, .. } => item_id = item.id,
            completed => return (start.session.id, completed),
        }
    }
}

#[tokio::test]
async fn full_session_completes_and_assesses() {
    let service = service(graded_pool(40));
    let (session_id, outcome) = run_session(&service, "alice", &[true, false], 20.0).await;

    let SubmitOutcome::Completed {
        session,
        assessment,
        ..
    } = outcome
    else {
        panic!("expected completion");
    };
    assert_eq!(session.id, session_id);
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.completed_at.is_some());
    assert!(session.theta.is_some());

    // The completion already wrote the assessment; a later call returns it.
    let again = service.assess_validity(session_id, false).await.unwrap();
    assert_eq!(again.id, assessment.id);
    assert_eq!(again.status, assessment.status);
}

#[tokio::test]
async fn session_never_repeats_an_item() {
    let service = service(graded_pool(40));
    let start = service.start_session("bob").await.unwrap();
    let mut served = vec![start.item.id.clone()];
    let mut item_id = start.item.id.clone();

    loop {
        let outcome = service
            .submit_answer(start.session.id, submission(&item_id, true, 15.0))
            .await
            .unwrap();
        match outcome {
            SubmitOutcome::Next { item, .. } => {
                assert!(
                    !served.contains(&item.id),
                    "item {} served twice",
                    item.id
                );
                served.push(item.id.clone());
                item_id = item.id;
            }
            SubmitOutcome::Completed { .. } => break,
        }
    }
}

#[tokio::test]
async fn cross_session_exposure_is_excluded() {
    let service = service(graded_pool(40));
    let (_, _) = run_session(&service, "carol", &[true, false], 20.0).await;

    let seen = service.store().items_seen_by_user("carol").await.unwrap();
    assert!(!seen.is_empty());

    let start = service.start_session("carol").await.unwrap();
    assert!(!seen.contains(&start.item.id));
}

#[tokio::test]
async fn second_start_while_active_is_rejected() {
    let service = service(graded_pool(10));
    let start = service.start_session("dave").await.unwrap();

    let err = service.start_session("dave").await.unwrap_err();
    match err {
        EngineError::SessionAlreadyActive {
            user_id,
            session_id,
        } => {
            assert_eq!(user_id, "dave");
            assert_eq!(session_id, start.session.id);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cadence_blocks_a_quick_restart() {
    let mut config = EngineConfig::default();
    config.session_cadence_secs = 3600;
    let service = TestingService::new(Arc::new(MemoryStore::new(graded_pool(40))), config);

    let start = service.start_session("erin").await.unwrap();
    let mut item_id = start.item.id.clone();
    loop {
        match service
            .submit_answer(start.session.id, submission(&item_id, true, 20.0))
            .await
            .unwrap()
        {
            SubmitOutcome::Next { item, .. } => item_id = item.id,
            SubmitOutcome::Completed { .. } => break,
        }
    }

    let err = service.start_session("erin").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::CadenceNotElapsed { remaining_secs, .. } if remaining_secs > 0
    ));
}

#[tokio::test]
async fn empty_pool_yields_no_eligible_items() {
    let service = service(Vec::new());
    let err = service.start_session("frank").await.unwrap_err();
    assert!(matches!(err, EngineError::NoEligibleItems { .. }));

    // No orphaned session was left behind.
    assert!(service
        .store()
        .active_session_for_user("frank")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn submit_after_completion_is_rejected() {
    let service = service(graded_pool(40));
    let (session_id, _) = run_session(&service, "gina", &[true], 20.0).await;

    let err = service
        .submit_answer(session_id, submission("q000", true, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed(_)));
}

#[tokio::test]
async fn unknown_item_submission_leaves_no_record() {
    let service = service(graded_pool(10));
    let start = service.start_session("pia").await.unwrap();

    let err = service
        .submit_answer(
            start.session.id,
            submission("does-not-exist", true, 10.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownItem { .. }));

    // Nothing was persisted for the rejected submission.
    let responses = service
        .store()
        .list_responses(start.session.id)
        .await
        .unwrap();
    assert!(responses.is_empty());

    // The session keeps accepting valid answers at sequence 0.
    service
        .submit_answer(start.session.id, submission(&start.item.id, true, 10.0))
        .await
        .unwrap();
    let responses = service
        .store()
        .list_responses(start.session.id)
        .await
        .unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].sequence, 0);
}

#[tokio::test]
async fn assess_in_progress_session_is_rejected() {
    let service = service(graded_pool(10));
    let start = service.start_session("hana").await.unwrap();

    let err = service
        .assess_validity(start.session.id, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionNotEligibleForAssessment(_)
    ));
}

#[tokio::test]
async fn abandoned_session_gets_incomplete_status() {
    let service = service(graded_pool(10));
    let start = service.start_session("ivan").await.unwrap();
    service
        .submit_answer(start.session.id, submission(&start.item.id, true, 12.0))
        .await
        .unwrap();

    let session = service.abandon_session(start.session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Abandoned);

    let assessment = service
        .assess_validity(start.session.id, false)
        .await
        .unwrap();
    assert_eq!(assessment.status, ValidityStatus::Incomplete);
    assert!(assessment.flags.is_empty());

    // Abandoning twice is a closed-session error.
    let err = service.abandon_session(start.session.id).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed(_)));
}

#[tokio::test]
async fn override_survives_forced_reassessment() {
    let service = service(graded_pool(40));
    let (session_id, _) = run_session(&service, "judy", &[true, false], 20.0).await;

    let overridden = service
        .override_validity(
            session_id,
            ValidityStatus::Valid,
            "admin-1",
            "verified with proctor footage",
        )
        .await
        .unwrap();
    assert_eq!(overridden.status, ValidityStatus::Valid);
    let record = overridden.override_record.as_ref().unwrap();
    assert_eq!(record.admin_id, "admin-1");

    let reassessed = service.assess_validity(session_id, true).await.unwrap();
    assert_eq!(reassessed.status, ValidityStatus::Valid);
    assert!(reassessed.override_record.is_some());
}

#[tokio::test]
async fn short_override_reason_is_rejected() {
    let service = service(graded_pool(40));
    let (session_id, _) = run_session(&service, "kate", &[true], 20.0).await;

    let err = service
        .override_validity(session_id, ValidityStatus::Valid, "admin-1", "ok")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOverrideReason { .. }));

    // The stored assessment is untouched.
    let stored = service.assess_validity(session_id, false).await.unwrap();
    assert!(stored.override_record.is_none());
}

#[tokio::test]
async fn override_without_assessment_is_not_found() {
    let service = service(graded_pool(10));
    let err = service
        .override_validity(
            uuid::Uuid::new_v4(),
            ValidityStatus::Valid,
            "admin-1",
            "long enough reason",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AssessmentNotFound(_)));
}

#[tokio::test]
async fn rapid_answers_flag_the_session() {
    let service = service(graded_pool(40));
    // Every answer in one second: rapid-response and total-time flags fire.
    let (_, outcome) = run_session(&service, "liam", &[true, false], 1.0).await;

    let SubmitOutcome::Completed { assessment, .. } = outcome else {
        panic!("expected completion");
    };
    assert_ne!(assessment.status, ValidityStatus::Valid);
    assert!(!assessment.flags.is_empty());
}

#[tokio::test]
async fn report_counts_assessments() {
    let service = service(graded_pool(60));
    run_session(&service, "mia", &[true, false], 20.0).await;
    run_session(&service, "noah", &[false, true], 20.0).await;

    let report = service
        .report_validity(&ReportFilters::default())
        .await
        .unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.override_count, 0);
    let counted: usize = report.status_counts.values().sum();
    assert_eq!(counted, 2);
}

#[tokio::test]
async fn concurrent_submissions_are_serialized() {
    let service = Arc::new(service(graded_pool(40)));
    let start = service.start_session("omar").await.unwrap();
    let session_id = start.session.id;
    let first_item = start.item.id.clone();

    // Two racing submissions for the same session: both are accepted in
    // some order, and the response log ends up with distinct sequences.
    let a = {
        let service = Arc::clone(&service);
        let item = first_item.clone();
        tokio::spawn(async move {
            service
                .submit_answer(session_id, submission(&item, true, 15.0))
                .await
        })
    };
    let b = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .submit_answer(session_id, submission(&first_item, false, 15.0))
                .await
        })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let responses = service.store().list_responses(session_id).await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_ne!(responses[0].sequence, responses[1].sequence);
}
