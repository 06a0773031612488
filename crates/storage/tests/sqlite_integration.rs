use std::collections::BTreeMap;

use chrono::Duration;
use pacer_core::model::{
    AppSettings, ColorScheme, DailyStat, Mode, QuestionRecord, QuestionRecordId, QuestionStatus,
    QuestionType, QuestionTypeId, Session, SessionId, SessionItem, SessionItemId,
    SessionItemSnapshot, SessionStatus, Template, TemplateId, TemplateItem, TemplateItemId,
    ThemeMode,
};
use pacer_core::runtime::SessionRuntime;
use pacer_core::time::fixed_now;
use storage::repository::{
    BackupRepository, QuestionTypeRepository, SessionRepository, SettingsRepository,
    SnapshotRepository, StatsRepository, StorageError, TemplateRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_question_type(name: &str) -> QuestionType {
    QuestionType::new(
        QuestionTypeId::random(),
        name,
        Some("短".into()),
        Some("#2F6FED".into()),
        fixed_now(),
    )
    .unwrap()
}

fn build_template(items_spec: &[(u32, u32)]) -> (Template, Vec<TemplateItem>) {
    let id = TemplateId::random();
    let items: Vec<TemplateItem> = items_spec
        .iter()
        .enumerate()
        .map(|(index, &(count, minutes))| {
            TemplateItem::new(
                TemplateItemId::random(),
                id,
                QuestionTypeId::random(),
                count,
                minutes,
                u32::try_from(index).unwrap(),
            )
        })
        .collect();
    let template = Template::new(id, "模板", None, true, &items, fixed_now()).unwrap();
    (template, items)
}

fn build_session(template_id: TemplateId, order: Vec<TemplateItemId>) -> Session {
    let snapshot: Vec<SessionItemSnapshot> = order
        .iter()
        .map(|id| SessionItemSnapshot {
            template_item_id: *id,
            question_type_id: QuestionTypeId::random(),
            question_count: 2,
            planned_minutes: 5,
        })
        .collect();
    Session::new(
        SessionId::random(),
        Some("sqlite roundtrip".into()),
        Mode::Mock,
        template_id,
        order,
        snapshot,
        SessionStatus::Ended,
        fixed_now(),
        Some(fixed_now() + Duration::minutes(30)),
        1_800_000,
        2,
    )
    .unwrap()
}

#[tokio::test]
async fn template_rows_roundtrip_and_cascade() {
    let repo = connect("memdb_templates").await;

    let question_type = build_question_type("言语理解");
    repo.upsert_question_type(&question_type).await.unwrap();
    let fetched = repo
        .get_question_type(question_type.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, question_type);

    let (mut template, items) = build_template(&[(40, 30), (15, 20)]);
    repo.upsert_template(&template, &items).await.unwrap();

    let stored = repo.get_template(template.id()).await.unwrap().unwrap();
    assert_eq!(stored.total_questions(), 55);
    let stored_items = repo.get_template_items(template.id()).await.unwrap();
    assert_eq!(stored_items.len(), 2);
    assert_eq!(stored_items[0].order_index(), 0);

    // shrinking the item set leaves no orphans
    let next_items = vec![TemplateItem::new(
        TemplateItemId::random(),
        template.id(),
        QuestionTypeId::random(),
        5,
        5,
        0,
    )];
    template
        .update("模板", None, true, &next_items, fixed_now())
        .unwrap();
    repo.upsert_template(&template, &next_items).await.unwrap();
    assert_eq!(repo.get_template_items(template.id()).await.unwrap().len(), 1);

    repo.delete_template(template.id()).await.unwrap();
    assert!(repo.get_template(template.id()).await.unwrap().is_none());
    assert!(repo.get_template_items(template.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_rows_roundtrip_with_json_columns() {
    let repo = connect("memdb_sessions").await;

    let (template, items) = build_template(&[(2, 5), (2, 5)]);
    repo.upsert_template(&template, &items).await.unwrap();

    let order: Vec<TemplateItemId> = items.iter().map(|item| item.id()).collect();
    let session = build_session(template.id(), order.clone());

    let session_items: Vec<SessionItem> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            SessionItem::new(
                SessionItemId::random(),
                session.id(),
                item.id(),
                60_000,
                300_000,
                2,
                0,
                u32::try_from(index).unwrap(),
            )
        })
        .collect();
    repo.create_session(&session, &session_items).await.unwrap();

    let records: Vec<QuestionRecord> = (1_u32..=4)
        .map(|number| {
            QuestionRecord::new(
                QuestionRecordId::random(),
                session.id(),
                session_items[usize::from(number > 2)].id,
                number,
                15_000,
                150_000,
                QuestionStatus::Correct,
            )
            .unwrap()
        })
        .collect();
    repo.append_question_records(&records).await.unwrap();

    let stored = repo.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(stored.custom_order(), order.as_slice());
    assert_eq!(stored.item_snapshot().len(), 2);
    assert_eq!(stored.name(), Some("sqlite roundtrip"));
    assert_eq!(stored.mode(), Mode::Mock);
    assert_eq!(stored.total_time_ms(), 1_800_000);

    let stored_records = repo.get_question_records(session.id()).await.unwrap();
    assert_eq!(stored_records.len(), 4);
    assert_eq!(stored_records[0].question_index, 1);

    // the status index answers the restore query
    let running = repo
        .list_sessions_by_status(SessionStatus::Running)
        .await
        .unwrap();
    assert!(running.is_empty());
    let ended = repo
        .list_sessions_by_status(SessionStatus::Ended)
        .await
        .unwrap();
    assert_eq!(ended.len(), 1);

    // overwrite replaces the whole triple
    let replacement_item = SessionItem::new(
        SessionItemId::random(),
        session.id(),
        items[0].id(),
        90_000,
        300_000,
        2,
        1,
        0,
    );
    let replacement_record = QuestionRecord::new(
        QuestionRecordId::random(),
        session.id(),
        replacement_item.id,
        1,
        90_000,
        150_000,
        QuestionStatus::Wrong,
    )
    .unwrap();
    repo.overwrite_session(
        &session,
        std::slice::from_ref(&replacement_item),
        std::slice::from_ref(&replacement_record),
    )
    .await
    .unwrap();
    assert_eq!(repo.get_session_items(session.id()).await.unwrap().len(), 1);
    assert_eq!(
        repo.get_question_records(session.id()).await.unwrap().len(),
        1
    );

    repo.delete_session(session.id()).await.unwrap();
    assert!(repo.get_session(session.id()).await.unwrap().is_none());
    assert!(repo.get_session_items(session.id()).await.unwrap().is_empty());
    assert!(repo
        .get_question_records(session.id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn update_session_requires_existing_row() {
    let repo = connect("memdb_update_session").await;
    let session = build_session(TemplateId::random(), Vec::new());
    let err = repo.update_session(&session).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn stats_settings_and_snapshot_roundtrip() {
    let repo = connect("memdb_misc").await;

    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    repo.accumulate_daily_stat(&DailyStat::new(date, 1, 600_000, 0.5))
        .await
        .unwrap();
    let merged = repo
        .accumulate_daily_stat(&DailyStat::new(date, 2, 400_000, 0.75))
        .await
        .unwrap();
    assert_eq!(merged.total_sessions(), 3);
    assert_eq!(merged.total_time_ms(), 1_000_000);
    assert_eq!(repo.list_daily_stats().await.unwrap().len(), 1);

    assert!(repo.get_settings().await.unwrap().is_none());
    let mut ratio = BTreeMap::new();
    ratio.insert(QuestionTypeId::random(), 0.4);
    let settings =
        AppSettings::from_persisted(ThemeMode::Dark, ColorScheme::Citrus, Some(120), Some(ratio))
            .unwrap();
    repo.put_settings(&settings).await.unwrap();
    assert_eq!(repo.get_settings().await.unwrap().unwrap(), settings);

    assert!(repo.load_snapshot().await.unwrap().is_none());
    let mut runtime = SessionRuntime::new(Mode::Practice);
    runtime.set_template(TemplateId::random()).unwrap();
    runtime.start(fixed_now()).unwrap();
    runtime.tick(1234);
    let snapshot = runtime.snapshot();
    repo.save_snapshot(&snapshot).await.unwrap();
    assert_eq!(repo.load_snapshot().await.unwrap().unwrap(), snapshot);
    repo.clear_snapshot().await.unwrap();
    assert!(repo.load_snapshot().await.unwrap().is_none());
}

#[tokio::test]
async fn backup_export_import_replaces_target_store() {
    let source = connect("memdb_backup_source").await;
    let target = connect("memdb_backup_target").await;

    let question_type = build_question_type("资料分析");
    source.upsert_question_type(&question_type).await.unwrap();
    let (template, items) = build_template(&[(3, 10)]);
    source.upsert_template(&template, &items).await.unwrap();
    let session = build_session(template.id(), items.iter().map(|i| i.id()).collect());
    source.create_session(&session, &[]).await.unwrap();

    // a leftover row in the target must not survive the import
    let leftover = build_question_type("旧数据");
    target.upsert_question_type(&leftover).await.unwrap();

    let data = source.export_all().await.unwrap();
    target.import_all(&data).await.unwrap();

    let types = target.list_question_types().await.unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].id(), question_type.id());

    let stored = target.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(stored.custom_order(), session.custom_order());

    let stored_items = target.get_template_items(template.id()).await.unwrap();
    assert_eq!(stored_items.len(), 1);
}
