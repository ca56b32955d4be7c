//! End-to-end pipeline tests.
//!
//! Drives the real HTTP client against an in-process fake scraping backend,
//! and the spawned refresh scheduler against `MockSource`, through to the
//! analytics and export layers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use paddock::analytics::movers::favorites;
use paddock::analytics::winners::annotate_winners;
use paddock::analytics::{HorseFilter, RoundSummary};
use paddock::engine::{self, CancelToken, Notice, TimerState};
use paddock::export::{self, CourseSelection, ExportFormat};
use paddock::feed::client::ApiClient;
use paddock::feed::{DateToken, FetchRequest, RaceSource};
use paddock::normalize::NormalizeOptions;
use paddock::types::PaddockError;

use crate::mock_source::{default_card, horse, race, track, MockSource};

// ---------------------------------------------------------------------------
// Fake scraping backend
// ---------------------------------------------------------------------------

/// Serve the scraper API on an ephemeral port; returns its base URL.
async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/health", get(|| async { StatusCode::OK }))
        .route(
            "/api/scrape/all-races",
            post(|| async {
                Json(serde_json::json!({ "data": default_card(), "timestamp": "2026-10-19T09:00:00Z" }))
            }),
        )
        .route(
            "/api/scrape/upcoming/:date",
            post(|Path(date): Path<String>| async move {
                if date == "tomorrow" {
                    let card = serde_json::json!([track(
                        "Caulfield",
                        vec![
                            race("R0", "", vec![]),
                            race("R1", "12:15", vec![horse(4, "Early Bird", "3.00")]),
                        ],
                    )]);
                    Ok(Json(serde_json::json!({ "data": card })))
                } else {
                    Err((StatusCode::INTERNAL_SERVER_ERROR, "scraper crashed"))
                }
            }),
        )
        .route(
            "/api/scrape/winners",
            post(|| async {
                Json(serde_json::json!({
                    "data": [
                        {
                            "racecourse": "Flemington",
                            "raceNumber": "R1",
                            "time": "13:05",
                            "winner": { "number": 7, "name": "Late Charge", "jockey": "Jockey 7", "winOdds": 3.2 }
                        },
                        { "racecourse": "Missing winner block" }
                    ]
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(10)).unwrap()
}

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("paddock_exports_{}", uuid::Uuid::new_v4()))
}

// ---------------------------------------------------------------------------
// HTTP client + normalizer + analytics + export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_backend_to_export() {
    let base = spawn_backend().await;
    let api = client(&base);
    api.health().await.unwrap();

    let board = engine::fetch_board(
        &api,
        FetchRequest::AllRaces,
        &NormalizeOptions::default(),
        &CancelToken::new(1),
    )
    .await
    .unwrap();

    assert_eq!(board.title, "Today's Result");
    assert_eq!(board.source_timestamp.as_deref(), Some("2026-10-19T09:00:00Z"));
    assert_eq!(board.racecourses.len(), 2);
    assert_eq!(board.racecourses[0].name, "Flemington");
    assert_eq!(board.racecourses[0].rounds.len(), 2);
    // The malformed winner record is skipped.
    assert_eq!(board.winners.len(), 1);

    // Odds ranking with unpriced runners last.
    let summary = RoundSummary::build(&board.racecourses[0].rounds[0], &HorseFilter::default());
    let numbers: Vec<u32> = summary.rows.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![3, 7, 1, 8]);
    assert_eq!(summary.rows[3].odds, "-");
    assert!(summary.t2.is_some());
    assert_eq!(summary.top3, Some(vec![3, 7, 1]));
    assert_eq!(summary.top6, None);

    let ranked = annotate_winners(&board.racecourses, &board.winners);
    assert_eq!(ranked[0].rank, Some(2));
    assert_eq!(ranked[0].rank_label, "2nd");

    let movers = favorites(&board.racecourses);
    assert_eq!(movers.len(), 2);
    assert_eq!(movers[0].horse_number, 3);
    assert_eq!(movers[1].horse_number, 2);

    // Export both formats to disk.
    let dir = temp_dir();
    let now = Utc::now();
    let csv_path = export::save(&dir, &board, &CourseSelection::All, ExportFormat::Csv, now).unwrap();
    let xlsx_path = export::save(&dir, &board, &CourseSelection::All, ExportFormat::Xlsx, now).unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.contains("Racecourse: Flemington"));
    assert!(csv.contains("Racecourse: Eagle Farm"));
    assert!(csv_path.extension().is_some_and(|e| e == "csv"));

    let xlsx = std::fs::read(&xlsx_path).unwrap();
    assert_eq!(&xlsx[..2], b"PK");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_backend_schedule_skips_placeholder() {
    let base = spawn_backend().await;
    let options = NormalizeOptions {
        skip_first_race_of_first_track: true,
        ..NormalizeOptions::default()
    };
    let board = engine::fetch_board(
        &client(&base),
        FetchRequest::Upcoming(DateToken::Tomorrow),
        &options,
        &CancelToken::new(1),
    )
    .await
    .unwrap();

    assert_eq!(board.title, "Schedule of tomorrow");
    assert_eq!(board.racecourses[0].rounds.len(), 1);
    assert_eq!(board.racecourses[0].rounds[0].round_number, 1);
    assert!(board.winners.is_empty());
}

#[tokio::test]
async fn test_backend_error_is_network_error() {
    let base = spawn_backend().await;
    let request = FetchRequest::Upcoming(DateToken::Today);
    let err = client(&base)
        .fetch_races(&request, &CancelToken::new(1))
        .await
        .unwrap_err();
    match err {
        PaddockError::Network(msg) => assert!(msg.contains("500"), "{msg}"),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Nothing listens on the discard port.
    let api = client("http://127.0.0.1:9");
    assert!(matches!(api.health().await, Err(PaddockError::Network(_))));
}

// ---------------------------------------------------------------------------
// Scheduler over the mock source
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_installs_board() {
    let source = Arc::new(MockSource::new());
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    let view = handle.subscribe().wait_for(|v| v.updates == 1).await.unwrap().clone();

    let board = view.board.unwrap();
    assert_eq!(board.racecourses.len(), 2);
    assert_eq!(board.winners.len(), 1);
    assert!(view.notice.is_none());
    assert!(view.loading.is_none());
    assert_eq!(source.race_calls(), 1);
    assert_eq!(source.winner_calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_board() {
    let source = Arc::new(MockSource::new());
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);
    let mut views = handle.subscribe();

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    views.wait_for(|v| v.updates == 1).await.unwrap();

    source.set_error(PaddockError::Network("connection reset".into()));
    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    let view = views
        .wait_for(|v| v.loading.is_none() && v.notice.is_some())
        .await
        .unwrap()
        .clone();

    assert!(matches!(view.notice, Some(Notice::Error(ref m)) if m.contains("connection reset")));
    assert_eq!(view.updates, 1);
    assert_eq!(view.board.unwrap().racecourses.len(), 2);
}

#[tokio::test]
async fn test_winners_failure_still_installs_board() {
    let source = Arc::new(MockSource::new());
    source.set_winners_error(PaddockError::Network("winners timed out".into()));
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    let view = handle.subscribe().wait_for(|v| v.updates == 1).await.unwrap().clone();

    assert!(view.notice.is_none());
    let board = view.board.unwrap();
    assert_eq!(board.racecourses.len(), 2);
    assert!(board.winners.is_empty());
}

#[tokio::test]
async fn test_empty_payload_reports_no_data() {
    let source = Arc::new(MockSource::empty());
    let (handle, _task) = engine::spawn(source, NormalizeOptions::default(), false);

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    let view = handle.subscribe().wait_for(|v| v.updates == 1).await.unwrap().clone();

    assert_eq!(view.notice, Some(Notice::NoData));
    assert!(view.board.unwrap().is_empty());
}

#[tokio::test]
async fn test_schedule_refresh_skips_winners() {
    let source = Arc::new(MockSource::new());
    let request = FetchRequest::Upcoming(DateToken::Tomorrow);
    source.set_card(
        request,
        serde_json::json!([track(
            "Doomben",
            vec![
                race("R0", "", vec![]),
                race("R2", "11:50", vec![horse(1, "Opener", "5.00")]),
            ],
        )]),
    );
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), true);

    handle.refresh(request).await.unwrap();
    let view = handle.subscribe().wait_for(|v| v.updates == 1).await.unwrap().clone();

    let board = view.board.unwrap();
    assert_eq!(board.title, "Schedule of tomorrow");
    assert_eq!(board.racecourses[0].rounds.len(), 1);
    assert_eq!(board.racecourses[0].rounds[0].round_number, 2);
    assert_eq!(source.winner_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_refreshes_on_schedule() {
    let source = Arc::new(MockSource::new());
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);
    let mut views = handle.subscribe();

    handle.start(1).await.unwrap();
    let view = handle.view();
    assert_eq!(view.timer, TimerState::Active { interval_minutes: 1 });
    assert_eq!(view.remaining_secs, 60);

    views.wait_for(|v| v.updates >= 1).await.unwrap();
    assert!(source.race_calls() >= 1);

    // Manual refresh is rejected while the timer runs.
    assert!(handle.refresh(FetchRequest::AllRaces).await.is_err());

    views.wait_for(|v| v.updates >= 2).await.unwrap();
    assert!(source.race_calls() >= 2);

    handle.stop().await.unwrap();
    let view = handle.view();
    assert_eq!(view.timer, TimerState::Idle);
    assert_eq!(view.remaining_secs, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_slow_fetch() {
    let source = Arc::new(MockSource::new());
    source.set_delay(Duration::from_secs(30));
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    assert!(handle.view().loading.is_some());

    handle.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let view = handle.view();
    assert!(view.loading.is_none());
    assert_eq!(view.updates, 0);
    assert!(view.board.is_none());
    assert!(view.notice.is_none());
}

#[tokio::test]
async fn test_export_subset_of_scheduled_board() {
    let source = Arc::new(MockSource::new());
    let (handle, _task) = engine::spawn(source, NormalizeOptions::default(), false);

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    let view = handle.subscribe().wait_for(|v| v.updates == 1).await.unwrap().clone();
    let board = view.board.unwrap();

    let selection = CourseSelection::from_query(Some("Eagle Farm"));
    let bytes = export::render(&board, &selection, ExportFormat::Csv).unwrap();
    let csv = String::from_utf8(bytes).unwrap();
    assert!(csv.contains("Racecourse: Eagle Farm"));
    assert!(!csv.contains("Racecourse: Flemington"));
}

#[tokio::test]
async fn test_winners_refresh_reuses_racecourses() {
    let source = Arc::new(MockSource::new());
    let (handle, _task) = engine::spawn(source.clone(), NormalizeOptions::default(), false);
    let mut views = handle.subscribe();

    handle.refresh(FetchRequest::AllRaces).await.unwrap();
    views.wait_for(|v| v.updates == 1).await.unwrap();

    handle.refresh(FetchRequest::Winners).await.unwrap();
    let view = views.wait_for(|v| v.updates == 2).await.unwrap().clone();

    assert_eq!(source.race_calls(), 1);
    assert_eq!(source.winner_calls(), 2);
    let board = view.board.unwrap();
    assert_eq!(board.racecourses.len(), 2);
    assert_eq!(board.winners.len(), 1);
}
