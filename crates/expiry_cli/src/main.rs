//! Command-line runner for the expiry notification tasks.
//!
//! Usage: `expiry_cli <store.sqlite3> [config.json] [now_epoch_ms]`
//!
//! Runs the role and group tasks against one store snapshot and prints the
//! notifications as JSON. Logs go to `$EXPIRY_LOG_DIR` when it is set.

use expiry_core::db::open_db;
use expiry_core::{
    current_epoch_ms, default_log_level, init_logging, MemberExpiryTask, NotificationConfig,
    PlainTextEmailFormatter, SqliteDomainStore,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "EXPIRY_LOG_DIR";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("expiry_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(db_path) = args.first() else {
        return Err("usage: expiry_cli <store.sqlite3> [config.json] [now_epoch_ms]".into());
    };

    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        init_logging(default_log_level(), &log_dir)?;
    }

    let config = match args.get(1) {
        Some(path) => NotificationConfig::load(path)?,
        None => NotificationConfig::default(),
    };
    let now_ms = match args.get(2) {
        Some(raw) => raw.parse::<i64>()?,
        None => current_epoch_ms(),
    };

    let conn = open_db(db_path)?;
    let store = SqliteDomainStore::try_new(&conn)?.with_admin_role(config.admin_role.clone());
    let formatter = Arc::new(PlainTextEmailFormatter);

    let roles =
        MemberExpiryTask::roles(&store, &config, formatter.clone()).get_notifications_at(now_ms)?;
    let groups =
        MemberExpiryTask::groups(&store, &config, formatter).get_notifications_at(now_ms)?;

    let output = serde_json::json!({
        "now": now_ms,
        "roles": roles,
        "groups": groups,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
