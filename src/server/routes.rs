use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, patch},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    analysis::{
        aggregate::{summarize_buckets, BucketEntry, ProcessTotal, ProjectTotal},
        projects::{prepare_mapping, project_names, ProjectLookup},
    },
    config::AppContext,
    daemon::{
        collection::runner::CollectorRunner,
        storage::{
            entities::{BucketRow, EventPatch, ProjectMapping, StoredEvent},
            EventStore,
        },
    },
    error::{Result, TrackerError},
    utils::time::{format_day, parse_day, today, TimeRange},
};

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: AppContext,
    pub store: EventStore,
    pub runner: Arc<CollectorRunner>,
}

impl AppState {
    pub fn new(context: AppContext, store: EventStore, runner: Arc<CollectorRunner>) -> Self {
        Self {
            context,
            store,
            runner,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/overview", get(get_overview))
        .route("/api/summary", get(get_summary))
        .route("/api/events", get(get_events))
        .route("/api/events/{id}", patch(patch_event))
        .route(
            "/api/project-mappings",
            get(get_project_mappings).post(post_project_mapping),
        )
        .route("/api/status", get(get_status))
        .with_state(state)
}

/// Missing or empty dates mean today.
fn day_or_today(value: Option<&str>) -> Result<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_day(value),
        None => Ok(today()),
    }
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DayQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct OverviewTotals {
    active_seconds: i64,
    idle_seconds: i64,
    overall_seconds: i64,
}

#[derive(Debug, Serialize)]
struct OverviewResponse {
    start: String,
    end: String,
    totals: OverviewTotals,
    entries: Vec<BucketEntry>,
    idle_entries: Vec<BucketEntry>,
    project_totals: Vec<ProjectTotal>,
    processes: Vec<ProcessTotal>,
}

async fn get_overview(
    State(state): State<AppState>,
    query: std::result::Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<OverviewResponse>> {
    let Query(query) = query?;
    let start = day_or_today(query.start.as_deref())?;
    let end = match query.end.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(end) => parse_day(end)?,
        None => start,
    };
    if end < start {
        return Err(TrackerError::validation(
            "end date must be on or after start date",
        ));
    }

    let rows = state
        .store
        .fetch_bucket_totals(TimeRange::local_days(start, end))
        .await?;
    let mappings = state.store.fetch_project_mappings().await?;
    let summary = summarize_buckets(rows, &ProjectLookup::from_mappings(&mappings));

    Ok(Json(OverviewResponse {
        start: format_day(start),
        end: format_day(end),
        totals: OverviewTotals {
            active_seconds: summary.active_seconds,
            idle_seconds: summary.idle_seconds,
            overall_seconds: summary.overall_seconds(),
        },
        entries: summary.entries,
        idle_entries: summary.idle_entries,
        project_totals: summary.per_project,
        processes: summary.per_process,
    }))
}

#[derive(Debug, Serialize)]
struct DayTotals {
    active_seconds: i64,
    idle_seconds: i64,
}

#[derive(Debug, Serialize)]
struct SummaryEntry {
    process_name: Option<String>,
    window_title: Option<String>,
    is_idle: bool,
    seconds: i64,
}

impl From<BucketRow> for SummaryEntry {
    fn from(row: BucketRow) -> Self {
        Self {
            process_name: row.process_name,
            window_title: row.window_title,
            is_idle: row.is_idle,
            seconds: row.seconds,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    date: String,
    totals: DayTotals,
    entries: Vec<SummaryEntry>,
}

/// Stored buckets of one day as they are, without re-normalization or projects.
async fn get_summary(
    State(state): State<AppState>,
    query: std::result::Result<Query<DayQuery>, QueryRejection>,
) -> Result<Json<SummaryResponse>> {
    let Query(query) = query?;
    let date = day_or_today(query.date.as_deref())?;
    let rows = state
        .store
        .fetch_bucket_totals(TimeRange::local_days(date, date))
        .await?;

    let (idle, active): (Vec<_>, Vec<_>) = rows.iter().partition(|row| row.is_idle);
    Ok(Json(SummaryResponse {
        date: format_day(date),
        totals: DayTotals {
            active_seconds: active.iter().map(|row| row.seconds).sum(),
            idle_seconds: idle.iter().map(|row| row.seconds).sum(),
        },
        entries: rows.into_iter().map(SummaryEntry::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct EventsResponse {
    date: String,
    events: Vec<StoredEvent>,
}

async fn get_events(
    State(state): State<AppState>,
    query: std::result::Result<Query<DayQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>> {
    let Query(query) = query?;
    let date = day_or_today(query.date.as_deref())?;
    let events = state
        .store
        .fetch_events(TimeRange::local_days(date, date))
        .await?;
    Ok(Json(EventsResponse {
        date: format_day(date),
        events,
    }))
}

async fn patch_event(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<EventPatch>, JsonRejection>,
) -> Result<Json<StoredEvent>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let updated = state.store.update_event(id, patch).await?;
    info!("Updated event {id}");
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
struct MappingsResponse {
    mappings: Vec<ProjectMapping>,
    projects: Vec<String>,
}

async fn get_project_mappings(State(state): State<AppState>) -> Result<Json<MappingsResponse>> {
    let mappings = state.store.fetch_project_mappings().await?;
    let projects = project_names(&mappings);
    Ok(Json(MappingsResponse { mappings, projects }))
}

#[derive(Debug, Deserialize)]
struct MappingPayload {
    project_name: String,
    process_name: Option<String>,
    window_title: Option<String>,
}

#[derive(Debug, Serialize)]
struct MappingResponse {
    mapping: ProjectMapping,
}

async fn post_project_mapping(
    State(state): State<AppState>,
    payload: std::result::Result<Json<MappingPayload>, JsonRejection>,
) -> Result<Json<MappingResponse>> {
    let Json(payload) = payload?;
    let prepared = prepare_mapping(
        &payload.project_name,
        payload.process_name.as_deref(),
        payload.window_title.as_deref(),
    )?;
    let mapping = state
        .store
        .upsert_project_mapping(prepared, state.context.clock.time())
        .await?;
    info!("Saved project mapping {} -> {}", mapping.id, mapping.project_name);
    Ok(Json(MappingResponse { mapping }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    collector_running: bool,
    database_path: String,
    sample_seconds: f64,
    idle_minutes: f64,
    flush_seconds: f64,
    sleep_gap_minutes: f64,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let settings = &state.context.settings;
    Json(StatusResponse {
        collector_running: state.runner.is_running(),
        database_path: state.context.db_path.display().to_string(),
        sample_seconds: settings.sample_interval.as_secs_f64(),
        idle_minutes: settings.idle_threshold.as_secs_f64() / 60.,
        flush_seconds: settings.flush_interval.as_secs_f64(),
        sleep_gap_minutes: settings.sleep_gap.as_secs_f64() / 60.,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::{create_router, AppState};
    use crate::{
        config::{AppContext, CollectorSettings},
        daemon::{
            collection::{probe::ActivityProbe, runner::CollectorRunner},
            storage::{entities::ActivityEvent, EventStore},
        },
        utils::clock::DefaultClock,
    };

    struct TestApp {
        _dir: TempDir,
        store: EventStore,
        router: Router,
    }

    fn local(hour: u32, minute: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2024, 4, 5, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event(start: DateTime<Utc>, minutes: i64, process: &str, title: &str) -> ActivityEvent {
        ActivityEvent {
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            process_name: Some(process.into()),
            window_title: Some(title.into()),
            is_idle: false,
        }
    }

    fn idle(start: DateTime<Utc>, minutes: i64) -> ActivityEvent {
        ActivityEvent {
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            process_name: None,
            window_title: None,
            is_idle: true,
        }
    }

    fn test_app() -> Result<TestApp> {
        let dir = tempdir()?;
        let db_path = dir.path().join("activity.sqlite3");
        let store = EventStore::open(db_path.clone())?;
        let context = AppContext::new(db_path, CollectorSettings::default(), Arc::new(DefaultClock));
        let runner = CollectorRunner::new(
            context.clone(),
            store.clone(),
            Box::new(|| -> Result<ActivityProbe> { Err(anyhow!("no display in tests")) }),
            CancellationToken::new(),
        );
        let router = create_router(AppState::new(context, store.clone(), Arc::new(runner)));
        Ok(TestApp {
            _dir: dir,
            store,
            router,
        })
    }

    async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = router.clone().oneshot(request).await?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    async fn get(router: &Router, uri: &str) -> Result<(StatusCode, Value)> {
        send(router, Request::builder().uri(uri).body(Body::empty())?).await
    }

    async fn send_json(
        router: &Router,
        method: &str,
        uri: &str,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        send(
            router,
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }

    #[tokio::test]
    async fn overview_rejects_inverted_range() -> Result<()> {
        let app = test_app()?;
        let (status, body) = get(&app.router, "/api/overview?start=2024-04-05&end=2024-04-04").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_dates_are_bad_requests() -> Result<()> {
        let app = test_app()?;
        for uri in [
            "/api/overview?start=yesterday",
            "/api/summary?date=2024-02-30",
            "/api/events?date=05.04.2024",
        ] {
            let (status, body) = get(&app.router, uri).await?;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].as_str().is_some());
        }
        Ok(())
    }

    #[tokio::test]
    async fn overview_merges_buckets_and_resolves_projects() -> Result<()> {
        let app = test_app()?;
        app.store
            .insert_events(vec![
                event(local(9, 0), 60, "code.exe", "main.rs"),
                event(local(10, 0), 20, "chrome.exe", "Docs"),
                event(local(10, 20), 10, "chrome.exe", "Docs - Google Chrome"),
                idle(local(10, 30), 30),
            ])
            .await?;

        let (status, _) = send_json(
            &app.router,
            "POST",
            "/api/project-mappings",
            json!({ "project_name": "Timetrail", "process_name": "Code.exe" }),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(&app.router, "/api/overview?start=2024-04-05").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start"], "2024-04-05");
        assert_eq!(body["end"], "2024-04-05");
        assert_eq!(body["totals"]["active_seconds"], 5400);
        assert_eq!(body["totals"]["idle_seconds"], 1800);
        assert_eq!(body["totals"]["overall_seconds"], 7200);

        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["process_name"], "code.exe");
        assert_eq!(entries[0]["project_name"], "Timetrail");
        assert_eq!(entries[1]["window_title"], "Docs");
        assert_eq!(entries[1]["seconds"], 1800);
        assert_eq!(body["idle_entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["project_totals"][0]["project_name"], "Timetrail");
        assert_eq!(body["project_totals"][0]["seconds"], 3600);
        assert_eq!(body["processes"].as_array().unwrap().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn summary_reports_stored_buckets() -> Result<()> {
        let app = test_app()?;
        app.store
            .insert_events(vec![
                event(local(9, 0), 60, "code.exe", "main.rs"),
                idle(local(10, 0), 30),
            ])
            .await?;

        let (status, body) = get(&app.router, "/api/summary?date=2024-04-05").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date"], "2024-04-05");
        assert_eq!(body["totals"]["active_seconds"], 3600);
        assert_eq!(body["totals"]["idle_seconds"], 1800);
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn events_can_be_listed_and_patched() -> Result<()> {
        let app = test_app()?;
        app.store
            .insert_events(vec![event(local(9, 0), 60, "code.exe", "main.rs")])
            .await?;

        let (status, body) = get(&app.router, "/api/events?date=2024-04-05").await?;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["duration_seconds"], 3600.0);
        let id = events[0]["id"].as_i64().unwrap();

        let (status, body) = send_json(
            &app.router,
            "PATCH",
            &format!("/api/events/{id}"),
            json!({ "window_title": "lib.rs", "end_time": local(9, 30) }),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["window_title"], "lib.rs");
        assert_eq!(body["duration_seconds"], 1800.0);

        let (status, _) = send_json(
            &app.router,
            "PATCH",
            &format!("/api/events/{id}"),
            json!({ "end_time": local(9, 0) }),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &app.router,
            "PATCH",
            "/api/events/9999",
            json!({ "is_idle": true }),
        )
        .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = send_json(
            &app.router,
            "PATCH",
            &format!("/api/events/{id}"),
            json!({ "colour": "red" }),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn project_mappings_round_trip() -> Result<()> {
        let app = test_app()?;

        let (status, body) = send_json(
            &app.router,
            "POST",
            "/api/project-mappings",
            json!({
                "project_name": " Research ",
                "process_name": "Chrome.exe",
                "window_title": "Paper - Google Chrome",
            }),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mapping"]["project_name"], "Research");
        assert_eq!(body["mapping"]["process_name"], "chrome.exe");
        assert_eq!(body["mapping"]["window_title"], "Paper");

        let (status, _) = send_json(
            &app.router,
            "POST",
            "/api/project-mappings",
            json!({ "project_name": "", "process_name": "code.exe" }),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &app.router,
            "POST",
            "/api/project-mappings",
            json!({ "project_name": "Work" }),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&app.router, "/api/project-mappings").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mappings"].as_array().unwrap().len(), 1);
        assert_eq!(body["projects"], json!(["Research"]));
        Ok(())
    }

    #[tokio::test]
    async fn status_reports_settings() -> Result<()> {
        let app = test_app()?;
        let (status, body) = get(&app.router, "/api/status").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collector_running"], false);
        assert_eq!(body["sample_seconds"], 5.0);
        assert_eq!(body["idle_minutes"], 5.0);
        assert_eq!(body["flush_seconds"], 30.0);
        assert!(body["database_path"]
            .as_str()
            .unwrap()
            .ends_with("activity.sqlite3"));
        Ok(())
    }
}
