//! Scripted race source for integration testing.
//!
//! Serves canned racetrack payloads per request, can be told to fail or to
//! stall, and counts every call. All state is in-memory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use paddock::engine::CancelToken;
use paddock::feed::{Envelope, FetchRequest, RaceSource};
use paddock::types::{PaddockError, Winner, WinningHorse};

/// A race source whose answers are fully controllable from test code.
pub struct MockSource {
    cards: Mutex<HashMap<FetchRequest, serde_json::Value>>,
    winners: Mutex<Vec<Winner>>,
    /// If set, race fetches fail with this error.
    force_error: Mutex<Option<PaddockError>>,
    winners_error: Mutex<Option<PaddockError>>,
    /// Simulated backend latency per race fetch.
    delay: Mutex<Duration>,
    race_calls: AtomicUsize,
    winner_calls: AtomicUsize,
}

impl MockSource {
    /// Today's card with two racecourses plus one winner.
    pub fn new() -> Self {
        let source = Self::empty();
        source.set_card(FetchRequest::AllRaces, default_card());
        *source.winners.lock().unwrap() = vec![winner("Flemington", "R1", "13:05", 7, 3.2)];
        source
    }

    /// Answers every request with an empty payload.
    pub fn empty() -> Self {
        Self {
            cards: Mutex::new(HashMap::new()),
            winners: Mutex::new(Vec::new()),
            force_error: Mutex::new(None),
            winners_error: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            race_calls: AtomicUsize::new(0),
            winner_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_card(&self, request: FetchRequest, data: serde_json::Value) {
        self.cards.lock().unwrap().insert(request, data);
    }

    pub fn set_error(&self, err: PaddockError) {
        *self.force_error.lock().unwrap() = Some(err);
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn set_winners_error(&self, err: PaddockError) {
        *self.winners_error.lock().unwrap() = Some(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn race_calls(&self) -> usize {
        self.race_calls.load(Ordering::SeqCst)
    }

    pub fn winner_calls(&self) -> usize {
        self.winner_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RaceSource for MockSource {
    async fn fetch_races(
        &self,
        request: &FetchRequest,
        cancel: &CancelToken,
    ) -> Result<Envelope, PaddockError> {
        self.race_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            cancel.run(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }

        if let Some(err) = self.force_error.lock().unwrap().clone() {
            return Err(err);
        }
        let data = self
            .cards
            .lock()
            .unwrap()
            .get(request)
            .cloned()
            .unwrap_or_else(|| serde_json::json!([]));
        Ok(Envelope {
            data,
            timestamp: Some("2026-10-19T09:00:00Z".to_string()),
        })
    }

    async fn fetch_winners(&self, _cancel: &CancelToken) -> Result<Vec<Winner>, PaddockError> {
        self.winner_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.winners_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.winners.lock().unwrap().clone())
    }

    async fn health(&self) -> Result<(), PaddockError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

pub fn horse(number: u32, name: &str, win: &str) -> serde_json::Value {
    serde_json::json!({
        "rank": number,
        "horseNumber": number.to_string(),
        "horseName": name,
        "jockey": format!("Jockey {number}"),
        "odds": { "open": "", "fluc1": "", "fluc2": "", "winFixed": win, "placeFixed": "1.50", "eachWayFixed": "" }
    })
}

pub fn race(label: &str, time: &str, horses: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "raceNumber": label, "time": time, "horses": horses })
}

pub fn track(name: &str, races: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "racetrack": name, "completedRaces": races })
}

/// Flemington R1 (favourite #3), R2 (no prices); Eagle Farm R5.
pub fn default_card() -> serde_json::Value {
    serde_json::json!([
        track(
            "Flemington",
            vec![
                race(
                    "R1",
                    "13:05",
                    vec![
                        horse(1, "Saddle Up", "6.00"),
                        horse(3, "Front Runner", "2.50"),
                        horse(7, "Late Charge", "3.20"),
                        horse(8, "Scratched", ""),
                    ],
                ),
                race("R2", "13:40", vec![horse(1, "No Market", "0"), horse(2, "Also None", "")]),
            ],
        ),
        track(
            "Eagle Farm",
            vec![race(
                "R5",
                "15:20",
                vec![horse(2, "Sunny Day", "4.00"), horse(4, "Rainy Day", "4.00")],
            )],
        ),
    ])
}

pub fn winner(course: &str, race: &str, time: &str, number: u32, odds: f64) -> Winner {
    Winner {
        racecourse: course.to_string(),
        race_number: race.to_string(),
        link: None,
        time: time.to_string(),
        winner: WinningHorse {
            number,
            name: format!("Winner {number}"),
            jockey: format!("Jockey {number}"),
            win_odds: odds,
            odds_rank: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_default_card() {
        let source = MockSource::new();
        let token = CancelToken::new(1);
        let envelope = source.fetch_races(&FetchRequest::AllRaces, &token).await.unwrap();
        assert_eq!(envelope.data.as_array().unwrap().len(), 2);
        assert_eq!(source.race_calls(), 1);

        let winners = source.fetch_winners(&token).await.unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(source.winner_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_unknown_request_is_empty() {
        let source = MockSource::new();
        let request = FetchRequest::Upcoming("tomorrow".parse().unwrap());
        let envelope = source.fetch_races(&request, &CancelToken::new(1)).await.unwrap();
        assert_eq!(envelope.data, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let source = MockSource::new();
        source.set_error(PaddockError::Network("backend down".into()));
        let result = source.fetch_races(&FetchRequest::AllRaces, &CancelToken::new(1)).await;
        assert_eq!(result.unwrap_err(), PaddockError::Network("backend down".into()));

        source.clear_error();
        assert!(source.fetch_races(&FetchRequest::AllRaces, &CancelToken::new(2)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_delay_honours_cancel() {
        let source = MockSource::new();
        source.set_delay(Duration::from_secs(30));
        let token = CancelToken::new(1);
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let result = source.fetch_races(&FetchRequest::AllRaces, &token).await;
        assert_eq!(result.unwrap_err(), PaddockError::Cancelled);
    }
}
