use std::sync::Arc;

use pacer_core::model::{QuestionStatus, SessionStatus};
use pacer_core::time::fixed_clock;
use services::{AppServices, lock_runtime};
use storage::repository::{InMemoryRepository, SessionRepository, Storage};

fn shared_storage() -> (InMemoryRepository, Storage) {
    let repo = InMemoryRepository::new();
    let storage = Storage {
        question_types: Arc::new(repo.clone()),
        templates: Arc::new(repo.clone()),
        sessions: Arc::new(repo.clone()),
        stats: Arc::new(repo.clone()),
        settings: Arc::new(repo.clone()),
        snapshots: Arc::new(repo.clone()),
        backup: Arc::new(repo.clone()),
    };
    (repo, storage)
}

#[tokio::test]
async fn full_practice_review_roundtrip() {
    let app = AppServices::in_memory(fixed_clock()).await.unwrap();
    let practice = app.practice();
    let runtime = app.runtime();

    // default template: 40+40+15+20+20 questions
    let seq = practice.refresh().await.unwrap();
    assert_eq!(seq.total_questions(), 135);
    assert_eq!(seq.sequence().first(), Some(&1));

    practice.start().await.unwrap();
    assert!(lock_runtime(&runtime).is_running());
    assert_eq!(lock_runtime(&runtime).current_question(), Some(1));

    // question 1: 3 seconds
    lock_runtime(&runtime).tick(3000);
    practice.next_question().await.unwrap();
    assert_eq!(lock_runtime(&runtime).current_question(), Some(2));
    assert_eq!(lock_runtime(&runtime).question_time(1), 3000);

    // question 2: 2 seconds, then jump into the second section
    lock_runtime(&runtime).tick(2000);
    practice.select_question(50).await.unwrap();
    assert_eq!(lock_runtime(&runtime).current_question(), Some(50));
    assert_eq!(lock_runtime(&runtime).current_index(), 1);
    assert_eq!(lock_runtime(&runtime).question_time(2), 2000);

    // question 50: 1.5 seconds, skipped
    lock_runtime(&runtime).tick(1500);
    practice.skip_current().await.unwrap();
    assert_eq!(lock_runtime(&runtime).current_question(), Some(51));
    assert!(lock_runtime(&runtime).skipped_questions().contains(&50));
    assert_eq!(lock_runtime(&runtime).question_time(50), 1500);

    // question 51: half a second, then end
    lock_runtime(&runtime).tick(500);
    practice.end().await.unwrap();
    assert_eq!(lock_runtime(&runtime).question_time(51), 500);
    assert_eq!(lock_runtime(&runtime).timers().total_ms, 7000);

    // review: mark a few outcomes and save
    let review = app.review();
    let (seq, mut sheet) = review.begin().await.unwrap();
    sheet.set_status(1, QuestionStatus::Correct);
    sheet.set_status(2, QuestionStatus::Wrong);
    sheet.set_status(50, QuestionStatus::Skip);
    let session_id = review.save(&seq, &sheet, Some("evening drill".into())).await.unwrap();

    // reconstruction: per-item record sums equal the item aggregates
    let detail = app.records().detail(session_id).await.unwrap().unwrap();
    assert_eq!(detail.session.status(), SessionStatus::Ended);
    assert_eq!(detail.session.total_time_ms(), 7000);
    assert_eq!(detail.session.name(), Some("evening drill"));
    assert_eq!(detail.records.len(), 135);
    assert_eq!(detail.items.len(), 5);

    for item in &detail.items {
        let sum: u64 = detail
            .records
            .iter()
            .filter(|record| record.session_item_id == item.id)
            .map(|record| record.actual_time_ms)
            .sum();
        assert_eq!(sum, item.actual_time_ms, "attribution mismatch for item");
    }
    let per_item: Vec<u64> = detail.items.iter().map(|item| item.actual_time_ms).collect();
    assert_eq!(per_item, vec![5000, 2000, 0, 0, 0]);

    assert_eq!(detail.status_of(1), QuestionStatus::Correct);
    assert_eq!(detail.status_of(2), QuestionStatus::Wrong);
    assert_eq!(detail.status_of(50), QuestionStatus::Skip);
    assert_eq!(detail.status_of(3), QuestionStatus::Unanswered);

    // one ended session contributed exactly one daily stat row
    let daily = app.stats().daily().await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].total_sessions(), 1);
    assert_eq!(daily[0].total_time_ms(), 7000);
}

#[tokio::test]
async fn draft_then_save_reuses_one_session_row() {
    let app = AppServices::in_memory(fixed_clock()).await.unwrap();
    let practice = app.practice();
    let runtime = app.runtime();

    practice.start().await.unwrap();
    lock_runtime(&runtime).tick(1000);
    practice.end().await.unwrap();

    let review = app.review();
    let (seq, sheet) = review.begin().await.unwrap();

    let draft_id = review.ensure_session_saved(&seq).await.unwrap();
    let again = review.ensure_session_saved(&seq).await.unwrap();
    assert_eq!(draft_id, again);

    let stored = app.storage().sessions.get_session(draft_id).await.unwrap().unwrap();
    assert_eq!(stored.status(), SessionStatus::Running);

    let saved_id = review.save(&seq, &sheet, None).await.unwrap();
    assert_eq!(saved_id, draft_id);

    let (rows, overview) = app.records().list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(overview.total_sessions, 1);
    assert_eq!(rows[0].total_questions, 135);

    // drafts do not count toward daily stats; the finalize does, once
    let daily = app.stats().daily().await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].total_sessions(), 1);
}

#[tokio::test]
async fn reordering_changes_traversal_but_not_grid_numbers() {
    let app = AppServices::in_memory(fixed_clock()).await.unwrap();
    let practice = app.practice();
    let runtime = app.runtime();

    let seq = practice.refresh().await.unwrap();
    let base_order: Vec<_> = seq.ordered_items().iter().map(|item| item.id).collect();
    let reversed: Vec<_> = base_order.iter().rev().copied().collect();
    lock_runtime(&runtime).set_order(reversed.clone()).unwrap();

    let seq = practice.refresh().await.unwrap();
    // last base item has 20 questions numbered 116..=135; traversal starts there
    assert_eq!(seq.sequence().first(), Some(&116));
    assert_eq!(lock_runtime(&runtime).current_question(), Some(116));

    // grid numbering is untouched by the reorder
    assert_eq!(seq.slots()[0].number, 1);
    assert_eq!(seq.slots()[0].template_item_id, base_order[0]);

    // a custom order that is a permutation survives refresh
    let seq = practice.refresh().await.unwrap();
    let still: Vec<_> = seq.ordered_items().iter().map(|item| item.id).collect();
    assert_eq!(still, reversed);
}

#[tokio::test]
async fn interrupted_run_restores_paused() {
    let (_repo, storage) = shared_storage();
    {
        let app = AppServices::with_storage(storage.clone(), fixed_clock()).await.unwrap();
        let practice = app.practice();
        practice.start().await.unwrap();
        lock_runtime(&app.runtime()).tick(4200);
        // pause persists the snapshot with the accumulated time
        practice.pause().await.unwrap();
        practice.resume().await.unwrap();
    }

    // a fresh app over the same store plays the part of a reloaded page
    let app = AppServices::with_storage(storage, fixed_clock()).await.unwrap();
    let runtime = app.runtime();
    assert!(lock_runtime(&runtime).is_running());
    assert!(lock_runtime(&runtime).is_paused(), "restored runs must wait for an explicit resume");
    assert_eq!(lock_runtime(&runtime).timers().total_ms, 4200);

    // ticks stay frozen until the user resumes
    lock_runtime(&runtime).tick(1000);
    assert_eq!(lock_runtime(&runtime).timers().total_ms, 4200);
    lock_runtime(&runtime).resume().unwrap();
    lock_runtime(&runtime).tick(1000);
    assert_eq!(lock_runtime(&runtime).timers().total_ms, 5200);
}

#[tokio::test]
async fn record_detail_edits_are_idempotent_per_question() {
    let app = AppServices::in_memory(fixed_clock()).await.unwrap();
    let practice = app.practice();

    practice.start().await.unwrap();
    lock_runtime(&app.runtime()).tick(1000);
    practice.end().await.unwrap();
    let session_id = practice.save(Some("to edit".into())).await.unwrap();

    let records = app.records();
    let mut detail = records.detail(session_id).await.unwrap().unwrap();
    detail.set_status(1, QuestionStatus::Correct);
    detail.mark_batch(1, QuestionStatus::Wrong);
    records.save_statuses(&detail).await.unwrap();
    // saving twice must not duplicate rows
    records.save_statuses(&detail).await.unwrap();

    let detail = records.detail(session_id).await.unwrap().unwrap();
    assert_eq!(detail.records.len(), 135);
    assert_eq!(detail.status_of(1), QuestionStatus::Correct);
    assert_eq!(detail.status_of(41), QuestionStatus::Wrong);
    assert_eq!(detail.status_of(80), QuestionStatus::Wrong);
    assert_eq!(detail.counts().wrong, 40);

    records.delete(session_id).await.unwrap();
    assert!(records.detail(session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn mock_mode_cannot_pause() {
    let app = AppServices::in_memory(fixed_clock()).await.unwrap();
    let practice = app.practice();
    let runtime = app.runtime();

    lock_runtime(&runtime)
        .set_mode(pacer_core::model::Mode::Mock)
        .unwrap();
    practice.start().await.unwrap();

    let err = practice.pause().await.unwrap_err();
    assert!(matches!(err, services::PracticeError::PauseUnavailable));
    assert!(!lock_runtime(&runtime).is_paused());
}
