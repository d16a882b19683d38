//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the local board store, sign in a local user and open a session.
//! - Print a deterministic summary of the loaded board.
//!
//! Usage: `taskboard_cli [settings.json]`

use log::info;
use std::error::Error;
use std::path::PathBuf;
use taskboard_core::db::open_db;
use taskboard_core::{
    core_version, init_from_config, ping, BoardConfig, BoardSession, SqliteBoardStore,
    SystemClock, DEFAULT_SESSION_TTL_MS,
};

const DEFAULT_SETTINGS_FILE: &str = "taskboard.json";
const DEFAULT_DATABASE_FILE: &str = "taskboard.sqlite3";
const LOCAL_USERNAME: &str = "local";

fn main() {
    if let Err(err) = run() {
        eprintln!("taskboard_cli error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    println!("taskboard_core ping={}", ping());
    println!("taskboard_core version={}", core_version());

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let config = BoardConfig::load(&settings_path)?;

    let cwd = std::env::current_dir()?;
    init_from_config(&config, &cwd.join("logs"))?;

    let database_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE));
    let conn = open_db(&database_path)?;
    let store = SqliteBoardStore::try_new(&conn)?;

    let user_id = match store.find_user(LOCAL_USERNAME)? {
        Some(user_id) => user_id,
        None => store.register_user(LOCAL_USERNAME)?,
    };
    let credential = store.create_session(&user_id, DEFAULT_SESSION_TTL_MS)?;
    let mut session = BoardSession::open(&store, credential, SystemClock, &config)?;
    info!("event=cli_summary module=cli status=start");

    let board = session.board();
    println!("folders={} projects={}", board.folders.len(), board.project_count());
    for project in board.all_projects() {
        println!(
            "project id={} outstanding={} history={}",
            project.id,
            project.outstanding_task_count(),
            session.history().entries_for(&project.id).len()
        );
    }
    for notice in session.take_notices() {
        println!("notice={notice:?}");
    }
    Ok(())
}
