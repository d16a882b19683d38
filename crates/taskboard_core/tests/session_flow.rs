use rusqlite::Connection;
use std::cell::Cell;
use taskboard_core::bridge::{BoardDto, HistoryDocument, HistoryEntryDto};
use taskboard_core::db::open_db_in_memory;
use taskboard_core::dnd::resolver::{ColumnLayout, ColumnSlot, DropZone, Point, Rect, TaskSlot};
use taskboard_core::{
    default_board, BoardConfig, BoardService, BoardSession, Change, ClickModifier, ContainerRef,
    CollaboratorError, Credential, FixedClock, MutationError, Notice, PersistenceBridge,
    PersistenceError, SqliteBoardStore, StorageCollaborator, TaskDraft,
};

const NOW: i64 = 1_700_000_000_000;
const HOUR: i64 = 60 * 60 * 1000;
const DAY: i64 = 24 * HOUR;

type Session<'a> = BoardSession<&'a SqliteBoardStore<'a, &'a FixedClock>, &'a FixedClock>;

fn store<'a>(
    conn: &'a Connection,
    clock: &'a FixedClock,
) -> (SqliteBoardStore<'a, &'a FixedClock>, Credential) {
    let store = SqliteBoardStore::with_clock(conn, clock).unwrap();
    let user_id = store.register_user("ada").unwrap();
    let credential = store.create_session(&user_id, DAY * 30).unwrap();
    (store, credential)
}

fn open<'a>(
    store: &'a SqliteBoardStore<'a, &'a FixedClock>,
    credential: Credential,
    clock: &'a FixedClock,
) -> Session<'a> {
    BoardSession::open(store, credential, clock, &BoardConfig::default()).unwrap()
}

/// Wraps a collaborator and fails selected calls on demand.
struct FlakyStore<C> {
    inner: C,
    fail_fetch: Cell<bool>,
    fail_save: Cell<bool>,
    fail_append: Cell<bool>,
}

impl<C> FlakyStore<C> {
    fn new(inner: C) -> Self {
        Self {
            inner,
            fail_fetch: Cell::new(false),
            fail_save: Cell::new(false),
            fail_append: Cell::new(false),
        }
    }
}

impl<C: StorageCollaborator> StorageCollaborator for FlakyStore<C> {
    fn fetch_board(&self, credential: &Credential) -> Result<Option<BoardDto>, CollaboratorError> {
        if self.fail_fetch.get() {
            return Err(CollaboratorError::Unavailable("network down".to_string()));
        }
        self.inner.fetch_board(credential)
    }

    fn replace_board(
        &self,
        credential: &Credential,
        board: &BoardDto,
    ) -> Result<(), CollaboratorError> {
        if self.fail_save.get() {
            return Err(CollaboratorError::Server("500".to_string()));
        }
        self.inner.replace_board(credential, board)
    }

    fn append_history(
        &self,
        credential: &Credential,
        project_id: &str,
        entry: &HistoryEntryDto,
    ) -> Result<(), CollaboratorError> {
        if self.fail_append.get() {
            return Err(CollaboratorError::Server("500".to_string()));
        }
        self.inner.append_history(credential, project_id, entry)
    }

    fn fetch_history(&self, credential: &Credential) -> Result<HistoryDocument, CollaboratorError> {
        self.inner.fetch_history(credential)
    }
}

fn task_slot(id: &str, top: f64) -> TaskSlot {
    TaskSlot {
        task_id: id.to_string(),
        rect: Rect::new(0.0, top, 200.0, 40.0),
    }
}

fn column_layout(id: &str, left: f64, tasks: Vec<TaskSlot>) -> ColumnLayout {
    ColumnLayout {
        column_id: id.to_string(),
        rect: Rect::new(left, 0.0, 200.0, 600.0),
        tasks,
    }
}

#[test]
fn fresh_user_opens_default_board_with_first_project_current() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let session = open(&store, credential, &clock);

    assert_eq!(session.board(), &default_board());
    assert_eq!(session.current_project_id(), Some("default-project"));
    assert!(session.is_signed_in());
    assert!(!session.is_dirty());
    let view = session.render();
    assert_eq!(view.current.unwrap().columns.len(), 3);
}

#[test]
fn mutations_are_written_through_to_storage() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let mut session = open(&store, credential.clone(), &clock);
    let task_id = session
        .add_task("default-project", "todo", TaskDraft::new("draft agenda"))
        .unwrap();
    assert!(!session.is_dirty());

    let reopened = open(&store, credential, &clock);
    let task = reopened.board().project("default-project").unwrap().task(&task_id).unwrap();
    assert_eq!(task.text, "draft agenda");
    assert_eq!(task.created_at, NOW);
}

#[test]
fn rejected_mutation_leaves_board_and_storage_untouched() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let mut session = open(&store, credential, &clock);
    let before = session.board().clone();

    let err = session.delete_project("default-project").unwrap_err();

    assert_eq!(err, MutationError::LastProject);
    assert_eq!(session.board(), &before);
    assert!(!session.is_dirty());
    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM board_documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, 0);
}

#[test]
fn unauthorized_save_signs_out_and_reauth_flushes() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential.clone(), &clock);

    store.revoke_session(&credential).unwrap();
    let task_id = session
        .add_task("default-project", "todo", TaskDraft::new("offline edit"))
        .unwrap();

    assert_eq!(session.take_notices(), vec![Notice::ReauthRequired]);
    assert!(!session.is_signed_in());
    assert!(session.is_dirty());
    assert!(session.board().project("default-project").unwrap().task(&task_id).is_some());

    let user_id = store.find_user("ada").unwrap().unwrap();
    let fresh = store.create_session(&user_id, DAY).unwrap();
    session.reauthenticate(fresh.clone());

    assert!(session.is_signed_in());
    assert!(!session.is_dirty());
    assert!(session.take_notices().is_empty());
    let stored = PersistenceBridge::new(&store).load(&fresh, NOW).unwrap();
    assert!(stored.project("default-project").unwrap().task(&task_id).is_some());
}

#[test]
fn deleting_completed_task_persists_history_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential.clone(), &clock);

    for text in ["first", "second"] {
        let id = session
            .add_task("default-project", "done", TaskDraft::new(text))
            .unwrap();
        session.toggle_task("default-project", &id).unwrap();
        clock.advance(HOUR);
        session.delete_task("default-project", &id).unwrap();
    }

    let view = session.history_view("default-project");
    let texts: Vec<&str> = view.iter().map(|entry| entry.text.as_str()).collect();
    assert_eq!(texts, vec!["second", "first"]);

    let reopened = open(&store, credential, &clock);
    assert_eq!(reopened.history().entries_for("default-project").len(), 2);
}

#[test]
fn startup_sweep_archives_expired_tasks_and_persists_them() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let mut board = default_board();
    {
        let mut service = BoardService::new(&mut board);
        let old = service
            .add_task("default-project", "done", TaskDraft::new("old win"), NOW - 30 * HOUR)
            .unwrap();
        service
            .toggle_task_completion("default-project", &old, NOW - 25 * HOUR)
            .unwrap();
    }
    PersistenceBridge::new(&store).save(&credential, &board).unwrap();

    let session = open(&store, credential, &clock);

    let done = session
        .board()
        .project("default-project")
        .unwrap()
        .column("done")
        .unwrap();
    assert!(done.items.is_empty());
    assert_eq!(
        session.history().entries_for("default-project")[0].text,
        "old win"
    );
    assert!(!session.is_dirty());
    let archived: i64 = conn
        .query_row("SELECT COUNT(*) FROM history_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(archived, 1);
}

#[test]
fn timer_tick_runs_only_after_interval() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let id = session
        .add_task("default-project", "done", TaskDraft::new("finish"))
        .unwrap();
    session.toggle_task("default-project", &id).unwrap();

    clock.advance(30 * 60 * 1000);
    assert!(session.tick().is_none());

    clock.advance(DAY);
    let report = session.tick().unwrap();
    assert_eq!(report.archived_count(), 1);
    assert!(session.board().project("default-project").unwrap().task(&id).is_none());
}

#[test]
fn task_drop_uses_nearest_candidate_even_across_columns() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let a = session
        .add_task("default-project", "todo", TaskDraft::new("a"))
        .unwrap();
    let b = session
        .add_task("default-project", "done", TaskDraft::new("b"))
        .unwrap();

    let layout = vec![
        column_layout("todo", 0.0, vec![task_slot(&a, 0.0)]),
        column_layout("in-progress", 210.0, Vec::new()),
        column_layout("done", 420.0, vec![task_slot(&b, 500.0)]),
    ];

    session.begin_task_drag("default-project", "todo", &a);
    assert!(session.is_dragging());
    let change = session.drop_task(&layout, 505.0).unwrap();

    assert_eq!(change, Change::Applied);
    assert!(!session.is_dragging());
    let done = session
        .board()
        .project("default-project")
        .unwrap()
        .column("done")
        .unwrap();
    let order: Vec<&str> = done.items.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(order, vec![a.as_str(), b.as_str()]);
    assert_eq!(done.items[0].tags, vec!["done".to_string()]);
}

#[test]
fn task_dropped_into_empty_column_appends() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let a = session
        .add_task("default-project", "todo", TaskDraft::new("a"))
        .unwrap();
    let mut todo = column_layout("todo", 0.0, vec![task_slot(&a, 0.0)]);
    todo.rect = Rect::new(0.0, 0.0, 200.0, 100.0);
    let layout = vec![todo, column_layout("in-progress", 210.0, Vec::new())];

    session.begin_task_drag("default-project", "todo", &a);
    assert_eq!(session.drop_task(&layout, 290.0).unwrap(), Change::Applied);

    let project = session.board().project("default-project").unwrap();
    assert_eq!(project.column_of_task(&a).unwrap().id, "in-progress");
}

#[test]
fn drop_without_candidates_changes_nothing_and_clears_drag() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);
    let before = session.board().clone();

    session.begin_task_drag("default-project", "todo", "missing");
    assert_eq!(session.drop_task(&[], 10.0).unwrap(), Change::Unchanged);
    assert!(!session.is_dragging());

    session.begin_column_drag("default-project", "todo");
    let only_self = vec![ColumnSlot {
        column_id: "todo".to_string(),
        rect: Rect::new(0.0, 0.0, 200.0, 600.0),
    }];
    assert_eq!(session.drop_column(&only_self, 50.0).unwrap(), Change::Unchanged);
    assert!(!session.is_dragging());
    assert_eq!(session.board(), &before);
}

#[test]
fn column_drop_reorders_columns() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let slots: Vec<ColumnSlot> = ["todo", "in-progress", "done"]
        .iter()
        .enumerate()
        .map(|(index, id)| ColumnSlot {
            column_id: id.to_string(),
            rect: Rect::new(index as f64 * 210.0, 0.0, 200.0, 600.0),
        })
        .collect();

    session.begin_column_drag("default-project", "done");
    session.drop_column(&slots, 10.0).unwrap();

    let ids: Vec<&str> = session
        .board()
        .project("default-project")
        .unwrap()
        .columns
        .iter()
        .map(|column| column.id.as_str())
        .collect();
    assert_eq!(ids, vec!["done", "todo", "in-progress"]);
}

#[test]
fn range_selection_drag_moves_projects_and_clears_selection() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let target = session.add_folder("Archive").unwrap();
    let a = session.add_project("A", &ContainerRef::Uncategorized).unwrap();
    let b = session.add_project("B", &ContainerRef::Uncategorized).unwrap();

    session.click_project(&a, ClickModifier::None);
    session.click_project(&a, ClickModifier::Toggle);
    session.click_project(&b, ClickModifier::Range);
    assert!(session.selection().contains(&a));
    assert!(session.selection().contains(&b));

    session.begin_project_drag(&b);
    let zones = vec![
        DropZone {
            target: ContainerRef::Folder(target.clone()),
            rect: Rect::new(0.0, 0.0, 250.0, 100.0),
        },
        DropZone {
            target: ContainerRef::Uncategorized,
            rect: Rect::new(0.0, 100.0, 250.0, 400.0),
        },
    ];
    let moved = session.drop_projects(&zones, Point::new(20.0, 40.0)).unwrap();

    assert_eq!(moved, 2);
    assert!(session.selection().is_empty());
    assert!(!session.is_dragging());
    let folder = session.board().folder(&target).unwrap();
    let ids: Vec<&str> = folder.projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![a.as_str(), b.as_str()]);
}

#[test]
fn range_click_without_anchor_acts_as_plain_click() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);
    let other = session.add_project("Other", &ContainerRef::Uncategorized).unwrap();

    session.click_project("default-project", ClickModifier::Range);

    assert_eq!(session.current_project_id(), Some("default-project"));
    assert!(session.selection().is_empty());
    assert_ne!(session.current_project_id(), Some(other.as_str()));
}

#[test]
fn deleting_current_project_falls_back_to_first_remaining() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    let added = session.add_project("Side", &ContainerRef::Uncategorized).unwrap();
    assert_eq!(session.current_project_id(), Some(added.as_str()));

    session.delete_project(&added).unwrap();

    assert_eq!(session.current_project_id(), Some("default-project"));
}

#[test]
fn deleting_selected_projects_keeps_at_least_one() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);
    let extra = session.add_project("Extra", &ContainerRef::Uncategorized).unwrap();

    session.click_project("default-project", ClickModifier::Toggle);
    session.click_project(&extra, ClickModifier::Toggle);
    assert_eq!(session.delete_selected_projects().unwrap_err(), MutationError::LastProject);

    session.click_project("default-project", ClickModifier::Toggle);
    assert_eq!(session.delete_selected_projects().unwrap(), 1);
    assert_eq!(session.board().project_count(), 1);
    assert_eq!(session.current_project_id(), Some("default-project"));
}

#[test]
fn failed_board_load_opens_default_tree_with_notice() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let mut saved = default_board();
    BoardService::new(&mut saved).add_folder("Personal").unwrap();
    PersistenceBridge::new(&store).save(&credential, &saved).unwrap();

    let flaky = FlakyStore::new(&store);
    flaky.fail_fetch.set(true);
    let mut session =
        BoardSession::open(&flaky, credential.clone(), &clock, &BoardConfig::default()).unwrap();

    assert_eq!(session.board(), &default_board());
    assert!(session.history().is_empty());
    assert_eq!(session.current_project_id(), Some("default-project"));
    assert!(!session.is_dirty());
    let notices = session.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [Notice::PersistenceFailed {
            operation: "board_load",
            ..
        }]
    ));

    let stored = PersistenceBridge::new(&store).load(&credential, NOW).unwrap();
    assert_eq!(stored, saved);
}

#[test]
fn unauthorized_load_still_fails_open() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    store.revoke_session(&credential).unwrap();

    let err = BoardSession::open(&store, credential, &clock, &BoardConfig::default())
        .err()
        .unwrap();

    assert_eq!(err, PersistenceError::Unauthorized);
}

#[test]
fn failed_save_keeps_change_and_next_save_includes_it() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let flaky = FlakyStore::new(&store);
    let mut session =
        BoardSession::open(&flaky, credential.clone(), &clock, &BoardConfig::default()).unwrap();

    flaky.fail_save.set(true);
    let first = session
        .add_task("default-project", "todo", TaskDraft::new("first"))
        .unwrap();

    let notices = session.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [Notice::PersistenceFailed {
            operation: "board_save",
            ..
        }]
    ));
    assert!(session.is_dirty());
    assert!(session.is_signed_in());
    assert!(session.board().project("default-project").unwrap().task(&first).is_some());

    flaky.fail_save.set(false);
    let second = session
        .add_task("default-project", "todo", TaskDraft::new("second"))
        .unwrap();

    assert!(!session.is_dirty());
    assert!(session.take_notices().is_empty());
    let stored = PersistenceBridge::new(&store).load(&credential, NOW).unwrap();
    let project = stored.project("default-project").unwrap();
    assert!(project.task(&first).is_some());
    assert!(project.task(&second).is_some());
}

#[test]
fn failed_history_append_holds_back_board_save_until_retry() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);

    let mut board = default_board();
    let expired = {
        let mut service = BoardService::new(&mut board);
        let id = service
            .add_task("default-project", "done", TaskDraft::new("old win"), NOW - 30 * HOUR)
            .unwrap();
        service
            .toggle_task_completion("default-project", &id, NOW - 25 * HOUR)
            .unwrap();
        id
    };
    PersistenceBridge::new(&store).save(&credential, &board).unwrap();

    let flaky = FlakyStore::new(&store);
    flaky.fail_append.set(true);
    let mut session =
        BoardSession::open(&flaky, credential.clone(), &clock, &BoardConfig::default()).unwrap();

    let notices = session.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [Notice::PersistenceFailed {
            operation: "history_append",
            ..
        }]
    ));
    assert!(session.is_dirty());
    assert!(session.board().project("default-project").unwrap().task(&expired).is_none());
    let stored = PersistenceBridge::new(&store).load(&credential, NOW).unwrap();
    assert!(stored.project("default-project").unwrap().task(&expired).is_some());

    flaky.fail_append.set(false);
    session
        .add_task("default-project", "todo", TaskDraft::new("next"))
        .unwrap();

    assert!(!session.is_dirty());
    let archived: i64 = conn
        .query_row("SELECT COUNT(*) FROM history_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(archived, 1);
    let stored = PersistenceBridge::new(&store).load(&credential, NOW).unwrap();
    assert!(stored.project("default-project").unwrap().task(&expired).is_none());
}

#[test]
fn toggle_click_ignores_unknown_projects() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(NOW);
    let (store, credential) = store(&conn, &clock);
    let mut session = open(&store, credential, &clock);

    session.click_project("ghost", ClickModifier::Toggle);
    assert!(session.selection().is_empty());

    session.click_project("default-project", ClickModifier::Toggle);
    assert!(session.selection().contains("default-project"));
}
