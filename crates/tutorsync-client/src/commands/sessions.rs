//! Session commands: sync, resync, delete, dispatch, list.

use std::fmt::Write as _;
use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tutorsync_protocol::{Response, SyncReport};
use tutorsync_providers::CalendarEvent;
use tutorsync_providers::memory::MemoryCalendar;
use tutorsync_server::{IngestSummary, SessionStore, parse_rows};

use super::{SyncContext, google_calendar, print_json};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Result of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub ingest: IngestSummary,
    /// `None` when no session was stored and nothing was dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

/// A stored session with its linked event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
    pub session_id: String,
    pub date: String,
    pub student: String,
    pub course: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Serialize)]
struct DryRun<'a> {
    outcome: &'a SyncOutcome,
    /// Events the in-memory calendar received.
    events: &'a [CalendarEvent],
}

/// Ingests scraped rows and creates the missing events.
pub async fn sync(config: &ClientConfig, source: &str, dry_run: bool, json: bool) -> ClientResult<()> {
    let rows = read_rows(source)?;
    let sync_config = config.sync_config()?;
    let persisted = Arc::new(SessionStore::open(sync_config.data_dir.clone()));

    // Dry runs work on copies; the calendar is not consulted.
    if dry_run {
        let calendar = Arc::new(MemoryCalendar::new());
        let store = Arc::new(preview_store(&persisted)?);
        let mut ctx = SyncContext::start(calendar.clone(), store, &sync_config);
        let outcome = ingest(&mut ctx, &rows).await;
        ctx.shutdown().await;
        let outcome = outcome?;

        let planned = calendar.events();
        if json {
            print_json(&DryRun {
                outcome: &outcome,
                events: &planned,
            })?;
        } else {
            print!("{}", render_outcome(&outcome));
            print!("{}", render_planned(&planned));
        }
        return check_report(outcome.report.as_ref());
    }

    let calendar = google_calendar(config)?;
    let mut ctx = SyncContext::start(calendar, persisted, &sync_config);
    let outcome = ingest(&mut ctx, &rows).await;
    ctx.shutdown().await;
    let outcome = outcome?;

    if json {
        print_json(&outcome)?;
    } else {
        print!("{}", render_outcome(&outcome));
    }
    check_report(outcome.report.as_ref())
}

/// Syncs the stored session list again.
pub async fn resync(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let sync_config = config.sync_config()?;
    let store = Arc::new(SessionStore::open(sync_config.data_dir.clone()));
    let calendar = google_calendar(config)?;
    let mut ctx = SyncContext::start(calendar, store, &sync_config);

    let dispatched = ctx.extractor.resync().await;
    let report = match dispatched {
        Ok(Some(request_id)) => ctx.wait(&request_id).await.map(into_report),
        Ok(None) => Ok(None),
        Err(e) => Err(e.into()),
    };
    ctx.shutdown().await;
    let outcome = SyncOutcome {
        report: report?,
        ..Default::default()
    };

    if json {
        print_json(&outcome)?;
    } else {
        match outcome.report {
            Some(ref report) => print!("{}", render_report(report)),
            None => println!("No stored sessions."),
        }
    }
    check_report(outcome.report.as_ref())
}

/// Deletes a session's event and forgets the session.
pub async fn delete(config: &ClientConfig, session_id: &str, json: bool) -> ClientResult<()> {
    let sync_config = config.sync_config()?;
    let store = Arc::new(SessionStore::open(sync_config.data_dir.clone()));
    let calendar = google_calendar(config)?;
    let mut ctx = SyncContext::start(calendar, store, &sync_config);

    let dispatched = ctx.extractor.cancel_session(session_id).await;
    let response = match dispatched {
        Ok(request_id) => ctx.wait(&request_id).await,
        Err(e) => Err(e.into()),
    };
    ctx.shutdown().await;
    let response = response?;

    if json {
        print_json(&response)?;
    } else if let Response::SessionDeleted {
        session_id,
        event_id,
    } = response
    {
        println!("Deleted event {} for session {}.", event_id, session_id);
    }
    Ok(())
}

/// Handles one raw page message and prints the worker's answer.
pub async fn dispatch(config: &ClientConfig, source: &str, json: bool) -> ClientResult<()> {
    let message = read_input(source)?;
    let sync_config = config.sync_config()?;
    let store = Arc::new(SessionStore::open(sync_config.data_dir.clone()));
    let calendar = google_calendar(config)?;
    let mut ctx = SyncContext::start(calendar, store, &sync_config);

    let response = handle_message(&mut ctx, &message).await;
    ctx.shutdown().await;
    let response = response?;

    if json {
        print_json(&response)?;
    } else {
        print!("{}", render_response(&response));
    }
    match response {
        Response::SessionsSynced { ref report } => check_report(Some(report)),
        _ => Ok(()),
    }
}

/// Prints the stored sessions and their calendar events.
pub fn list(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let store = SessionStore::open(config.data_dir());
    let rows = session_rows(&store)?;

    if json {
        print_json(&rows)?;
    } else {
        print!("{}", render_sessions(&rows));
    }
    Ok(())
}

/// Reads rows from a file, or stdin for `-`.
pub fn read_rows(source: &str) -> ClientResult<Vec<Vec<String>>> {
    let input = String::from_utf8(read_input(source)?)
        .map_err(|e| ClientError::Input(format!("rows are not UTF-8: {}", e)))?;
    parse_rows(&input).map_err(|e| ClientError::Input(format!("failed to parse rows: {}", e)))
}

fn read_input(source: &str) -> ClientResult<Vec<u8>> {
    if source == "-" {
        let mut input = Vec::new();
        std::io::stdin().read_to_end(&mut input)?;
        Ok(input)
    } else {
        Ok(std::fs::read(source)?)
    }
}

async fn handle_message(ctx: &mut SyncContext, message: &[u8]) -> ClientResult<Response> {
    let request_id = ctx.extractor.dispatch_message(message).await?;
    info!(request_id = %request_id, "message dispatched");
    ctx.wait(&request_id).await
}

async fn ingest(ctx: &mut SyncContext, rows: &[Vec<String>]) -> ClientResult<SyncOutcome> {
    let ingest = ctx.extractor.ingest_rows(rows).await?;
    info!(scraped = ingest.scraped, added = ingest.added, "rows ingested");

    let report = match ingest.request_id {
        Some(ref request_id) => into_report(ctx.wait(request_id).await?),
        None => None,
    };
    Ok(SyncOutcome { ingest, report })
}

fn into_report(response: Response) -> Option<SyncReport> {
    match response {
        Response::SessionsSynced { report } => Some(report),
        _ => None,
    }
}

fn check_report(report: Option<&SyncReport>) -> ClientResult<()> {
    match report {
        Some(report) if !report.is_clean() => Err(ClientError::PartialFailure(report.failed.len())),
        _ => Ok(()),
    }
}

/// In-memory copy of the persisted store for dry runs.
fn preview_store(persisted: &SessionStore) -> ClientResult<SessionStore> {
    let preview = SessionStore::in_memory();
    preview.set_sessions(&persisted.sessions()?)?;
    preview.link_events(persisted.event_links()?)?;
    Ok(preview)
}

fn session_rows(store: &SessionStore) -> ClientResult<Vec<SessionRow>> {
    let links = store.event_links()?;
    Ok(store
        .sessions()?
        .into_iter()
        .map(|session| {
            let session_id = session.session_id();
            SessionRow {
                event_id: links.get(&session_id).cloned(),
                session_id,
                date: session.date,
                student: session.student,
                course: session.course,
            }
        })
        .collect())
}

fn render_outcome(outcome: &SyncOutcome) -> String {
    let mut out = format!(
        "Scraped {} session(s), {} new, {} stored.\n",
        outcome.ingest.scraped, outcome.ingest.added, outcome.ingest.total
    );
    if let Some(ref report) = outcome.report {
        out.push_str(&render_report(report));
    }
    out
}

fn render_report(report: &SyncReport) -> String {
    let mut out = format!(
        "Created {}, already on calendar {}, failed {}.\n",
        report.created.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            failure.session_id,
            failure.code.description(),
            failure.message
        );
    }
    out
}

fn render_response(response: &Response) -> String {
    match response {
        Response::SessionsSynced { report } => render_report(report),
        Response::SessionDeleted {
            session_id,
            event_id,
        } => format!("Deleted event {} for session {}.\n", event_id, session_id),
        Response::Error { error } => format!("{}: {}\n", error.code.description(), error.message),
    }
}

fn render_planned(events: &[CalendarEvent]) -> String {
    let mut out = String::new();
    for event in events {
        let start = event.start.date_time.as_deref().unwrap_or("?");
        let summary = event.summary.as_deref().unwrap_or("(untitled)");
        let _ = writeln!(out, "  would create: {} at {}", summary, start);
    }
    out
}

fn render_sessions(rows: &[SessionRow]) -> String {
    if rows.is_empty() {
        return "No stored sessions.\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}",
            row.session_id,
            row.date,
            row.student,
            row.course,
            row.event_id.as_deref().unwrap_or("-")
        );
    }
    out
}
