//! Refresh scheduler: the single owner of mutable board state.
//!
//! `RefreshScheduler` is a plain state machine (Idle / Active) driven by
//! four kinds of event: user commands, fetch completions, the 1-second
//! countdown tick and the refresh tick. `spawn` runs it on one tokio task
//! and publishes a `SchedulerView` after every event, so nothing outside
//! that task ever locks or mutates scheduler state.
//!
//! Every fetch goes through `fetch_now`, which cancels whatever is in
//! flight before starting the new one. A completion is only applied when
//! its token is the current in-flight token and has not been cancelled.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::cancel::CancelToken;
use crate::feed::{FetchRequest, RaceSource};
use crate::normalize::{normalize, NormalizeOptions};
use crate::types::{PaddockError, RaceBoard};

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Public state types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Active { interval_minutes: u32 },
}

impl TimerState {
    pub fn is_active(&self) -> bool {
        matches!(self, TimerState::Active { .. })
    }

    pub fn interval_minutes(&self) -> Option<u32> {
        match self {
            TimerState::Active { interval_minutes } => Some(*interval_minutes),
            TimerState::Idle => None,
        }
    }
}

/// Rejected control requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("A fetch is already in progress")]
    Busy,

    #[error("Auto-refresh is running; stop it before refreshing manually")]
    TimerActive,

    #[error("Auto-refresh is already running")]
    AlreadyActive,

    #[error("Interval must be between 1 and 1440 minutes, got {0}")]
    InvalidInterval(u32),

    #[error("Scheduler task has stopped")]
    SchedulerGone,
}

/// Which controls are currently enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub can_refresh: bool,
    pub can_start_timer: bool,
    pub can_stop_timer: bool,
}

/// Idle with nothing in flight.
impl Default for Controls {
    fn default() -> Self {
        Self {
            can_refresh: true,
            can_start_timer: true,
            can_stop_timer: false,
        }
    }
}

/// User-facing outcome of the last completed fetch, if it was not a plain success.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum Notice {
    Error(String),
    NoData,
}

/// Snapshot published after every scheduler event.
#[derive(Debug, Clone, Default)]
pub struct SchedulerView {
    pub timer: TimerState,
    pub remaining_secs: u64,
    /// The request currently in flight.
    pub loading: Option<FetchRequest>,
    pub controls: Controls,
    pub board: Option<Arc<RaceBoard>>,
    pub notice: Option<Notice>,
    /// Number of boards installed so far.
    pub updates: u64,
}

impl SchedulerView {
    /// Countdown as `m:ss`.
    pub fn countdown_label(&self) -> String {
        format!("{}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}

/// Result of one spawned fetch.
#[derive(Debug)]
pub struct Completion {
    pub token: CancelToken,
    pub request: FetchRequest,
    pub outcome: Result<RaceBoard, PaddockError>,
}

#[derive(Debug)]
struct InFlight {
    token: CancelToken,
    request: FetchRequest,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub struct RefreshScheduler {
    source: Arc<dyn RaceSource>,
    options: NormalizeOptions,
    skip_first_upcoming: bool,
    timer: TimerState,
    remaining_secs: u64,
    inflight: Option<InFlight>,
    board: Option<Arc<RaceBoard>>,
    notice: Option<Notice>,
    updates: u64,
    next_fetch_id: u64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl RefreshScheduler {
    /// Build a scheduler and the receiver its fetch tasks report to.
    pub fn new(
        source: Arc<dyn RaceSource>,
        options: NormalizeOptions,
        skip_first_upcoming: bool,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            source,
            options,
            skip_first_upcoming,
            timer: TimerState::Idle,
            remaining_secs: 0,
            inflight: None,
            board: None,
            notice: None,
            updates: 0,
            next_fetch_id: 0,
            completions: tx,
        };
        (scheduler, rx)
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    pub fn is_loading(&self) -> bool {
        self.inflight.is_some()
    }

    pub fn controls(&self) -> Controls {
        let loading = self.is_loading();
        let active = self.timer.is_active();
        Controls {
            can_refresh: !loading && !active,
            can_start_timer: !loading && !active,
            can_stop_timer: active,
        }
    }

    // -- Commands --------------------------------------------------------

    /// One-off fetch requested by the user.
    pub fn request_refresh(&mut self, request: FetchRequest) -> Result<(), ControlError> {
        if self.timer.is_active() {
            return Err(ControlError::TimerActive);
        }
        if self.is_loading() {
            return Err(ControlError::Busy);
        }
        self.fetch_now(request);
        Ok(())
    }

    /// Idle → Active. Fetches immediately and arms the countdown.
    pub fn start(&mut self, interval_minutes: u32) -> Result<(), ControlError> {
        if self.timer.is_active() {
            return Err(ControlError::AlreadyActive);
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            return Err(ControlError::InvalidInterval(interval_minutes));
        }
        if self.is_loading() {
            return Err(ControlError::Busy);
        }

        self.timer = TimerState::Active { interval_minutes };
        self.remaining_secs = full_countdown(interval_minutes);
        info!(interval_minutes, "Auto-refresh started");
        self.fetch_now(FetchRequest::AllRaces);
        Ok(())
    }

    /// Active → Idle. Also aborts whatever fetch is in flight.
    pub fn stop(&mut self) {
        if let Some(flight) = self.inflight.take() {
            debug!(fetch_id = flight.token.id(), request = %flight.request, "Aborting in-flight fetch");
            flight.token.cancel();
        }
        if self.timer.is_active() {
            info!("Auto-refresh stopped");
        }
        self.timer = TimerState::Idle;
        self.remaining_secs = 0;
    }

    // -- Timer events ----------------------------------------------------

    pub fn on_refresh_tick(&mut self) {
        let TimerState::Active { interval_minutes } = self.timer else {
            return;
        };
        debug!("Scheduled refresh");
        self.fetch_now(FetchRequest::AllRaces);
        self.remaining_secs = full_countdown(interval_minutes);
    }

    /// Countdown is display-only: it never triggers a fetch.
    pub fn on_countdown_tick(&mut self) {
        let TimerState::Active { interval_minutes } = self.timer else {
            return;
        };
        if self.remaining_secs <= 1 {
            self.remaining_secs = full_countdown(interval_minutes);
        } else {
            self.remaining_secs -= 1;
        }
    }

    // -- Fetching --------------------------------------------------------

    /// Start a fetch, superseding any fetch already in flight.
    pub fn fetch_now(&mut self, request: FetchRequest) {
        if let Some(prev) = self.inflight.take() {
            debug!(fetch_id = prev.token.id(), request = %prev.request, "Superseding in-flight fetch");
            prev.token.cancel();
        }

        self.next_fetch_id += 1;
        let token = CancelToken::new(self.next_fetch_id);
        self.inflight = Some(InFlight {
            token: token.clone(),
            request,
        });

        let source = Arc::clone(&self.source);
        let options = NormalizeOptions {
            skip_first_race_of_first_track: request.is_schedule() && self.skip_first_upcoming,
            ..self.options
        };
        let completions = self.completions.clone();
        let base = self.board.clone();

        debug!(fetch_id = token.id(), request = %request, "Fetch started");
        tokio::spawn(async move {
            let outcome = match request {
                FetchRequest::Winners => refresh_winners(source.as_ref(), base, &token).await,
                _ => fetch_board(source.as_ref(), request, &options, &token).await,
            };
            // The receiver only goes away when the scheduler itself is dropped.
            let _ = completions.send(Completion {
                token,
                request,
                outcome,
            });
        });
    }

    /// Apply a fetch result. Returns whether the completion was current.
    pub fn on_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            token,
            request,
            outcome,
        } = completion;

        let current = self
            .inflight
            .as_ref()
            .is_some_and(|flight| flight.token.same_as(&token));
        if !current || token.is_cancelled() {
            debug!(fetch_id = token.id(), request = %request, "Discarding stale completion");
            return false;
        }
        self.inflight = None;

        match outcome {
            Ok(board) => {
                info!(fetch_id = token.id(), board = %board, "Board updated");
                self.install(board, None);
            }
            Err(PaddockError::EmptyResult) => {
                info!(fetch_id = token.id(), request = %request, "No race data in response");
                self.install(RaceBoard::empty(request.title()), Some(Notice::NoData));
            }
            Err(PaddockError::Cancelled) => {
                debug!(fetch_id = token.id(), "Fetch cancelled");
            }
            Err(e) => {
                error!(fetch_id = token.id(), request = %request, error = %e, "Fetch failed");
                self.notice = Some(Notice::Error(e.to_string()));
            }
        }
        true
    }

    fn install(&mut self, board: RaceBoard, notice: Option<Notice>) {
        self.board = Some(Arc::new(board));
        self.notice = notice;
        self.updates += 1;
    }

    pub fn view(&self) -> SchedulerView {
        SchedulerView {
            timer: self.timer,
            remaining_secs: self.remaining_secs,
            loading: self.inflight.as_ref().map(|f| f.request),
            controls: self.controls(),
            board: self.board.clone(),
            notice: self.notice.clone(),
            updates: self.updates,
        }
    }
}

fn full_countdown(interval_minutes: u32) -> u64 {
    u64::from(interval_minutes) * 60
}

// ---------------------------------------------------------------------------
// Fetch + normalize
// ---------------------------------------------------------------------------

/// One complete fetch cycle: races, normalization and (for today's card)
/// winners. Winners failures are logged and never fail the fetch.
pub async fn fetch_board(
    source: &dyn RaceSource,
    request: FetchRequest,
    options: &NormalizeOptions,
    cancel: &CancelToken,
) -> Result<RaceBoard, PaddockError> {
    if request == FetchRequest::Winners {
        return refresh_winners(source, None, cancel).await;
    }
    let envelope = cancel.run(source.fetch_races(&request, cancel)).await?;
    let racecourses = normalize(&envelope.data, options)?;
    if racecourses.iter().all(|rc| rc.rounds.is_empty()) {
        return Err(PaddockError::EmptyResult);
    }

    let winners = if request.is_schedule() {
        Vec::new()
    } else {
        match cancel.run(source.fetch_winners(cancel)).await {
            Ok(winners) => winners,
            Err(PaddockError::Cancelled) => return Err(PaddockError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Winners fetch failed, continuing without winners");
                Vec::new()
            }
        }
    };

    if cancel.is_cancelled() {
        return Err(PaddockError::Cancelled);
    }

    Ok(RaceBoard {
        title: request.title(),
        racecourses,
        winners,
        source_timestamp: envelope.timestamp,
        fetched_at: Utc::now(),
    })
}

/// Winners-only fetch. The result is a copy of `base` with its winners
/// replaced; without a base board it carries winners and no racecourses.
/// Unlike the winners leg of `fetch_board`, a failure here fails the fetch.
pub async fn refresh_winners(
    source: &dyn RaceSource,
    base: Option<Arc<RaceBoard>>,
    cancel: &CancelToken,
) -> Result<RaceBoard, PaddockError> {
    let winners = cancel.run(source.fetch_winners(cancel)).await?;
    if cancel.is_cancelled() {
        return Err(PaddockError::Cancelled);
    }

    let mut board = match base {
        Some(board) => RaceBoard::clone(&board),
        None => RaceBoard::empty(FetchRequest::Winners.title()),
    };
    info!(winners = winners.len(), title = %board.title, "Winners refreshed");
    board.winners = winners;
    board.fetched_at = Utc::now();
    Ok(board)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Command {
    Refresh {
        request: FetchRequest,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Start {
        interval_minutes: u32,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running scheduler task.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SchedulerView>,
}

impl SchedulerHandle {
    pub async fn refresh(&self, request: FetchRequest) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refresh { request, reply }).await?;
        rx.await.map_err(|_| ControlError::SchedulerGone)?
    }

    pub async fn start(&self, interval_minutes: u32) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            interval_minutes,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ControlError::SchedulerGone)?
    }

    pub async fn stop(&self) -> Result<(), ControlError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await.map_err(|_| ControlError::SchedulerGone)
    }

    /// Latest published view.
    pub fn view(&self) -> SchedulerView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every published view.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerView> {
        self.view.clone()
    }

    async fn send(&self, command: Command) -> Result<(), ControlError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControlError::SchedulerGone)
    }
}

/// Run a scheduler on its own task. The task ends once every handle is dropped.
pub fn spawn(
    source: Arc<dyn RaceSource>,
    options: NormalizeOptions,
    skip_first_upcoming: bool,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (scheduler, completions) = RefreshScheduler::new(source, options, skip_first_upcoming);
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (view_tx, view_rx) = watch::channel(scheduler.view());

    let task = tokio::spawn(drive(scheduler, cmd_rx, completions, view_tx));
    let handle = SchedulerHandle {
        commands: cmd_tx,
        view: view_rx,
    };
    (handle, task)
}

#[derive(Default)]
struct Timers {
    refresh: Option<Interval>,
    countdown: Option<Interval>,
}

impl Timers {
    /// Arm or disarm to match the scheduler's timer state.
    fn sync(&mut self, state: TimerState) {
        match (state, self.refresh.is_some()) {
            (TimerState::Active { interval_minutes }, false) => {
                let period = Duration::from_secs(full_countdown(interval_minutes));
                self.refresh = Some(make_interval(period));
                self.countdown = Some(make_interval(COUNTDOWN_PERIOD));
            }
            (TimerState::Idle, true) => {
                self.refresh = None;
                self.countdown = None;
            }
            _ => {}
        }
    }
}

fn make_interval(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

/// Pending forever when the timer is disarmed.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

enum Reply {
    Control(oneshot::Sender<Result<(), ControlError>>, Result<(), ControlError>),
    Done(oneshot::Sender<()>),
}

impl Reply {
    fn send(self) {
        // A caller that stopped waiting is not an error.
        match self {
            Reply::Control(tx, result) => {
                let _ = tx.send(result);
            }
            Reply::Done(tx) => {
                let _ = tx.send(());
            }
        }
    }
}

fn apply_command(scheduler: &mut RefreshScheduler, command: Command) -> Reply {
    match command {
        Command::Refresh { request, reply } => {
            let result = scheduler.request_refresh(request);
            if let Err(e) = &result {
                debug!(request = %request, error = %e, "Refresh rejected");
            }
            Reply::Control(reply, result)
        }
        Command::Start {
            interval_minutes,
            reply,
        } => {
            let result = scheduler.start(interval_minutes);
            if let Err(e) = &result {
                debug!(interval_minutes, error = %e, "Start rejected");
            }
            Reply::Control(reply, result)
        }
        Command::Stop { reply } => {
            scheduler.stop();
            Reply::Done(reply)
        }
    }
}

async fn drive(
    mut scheduler: RefreshScheduler,
    mut commands: mpsc::Receiver<Command>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    view_tx: watch::Sender<SchedulerView>,
) {
    let mut timers = Timers::default();

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    scheduler.stop();
                    break;
                };
                let reply = apply_command(&mut scheduler, command);
                timers.sync(scheduler.timer());
                // Publish before replying so callers observe their own command.
                view_tx.send_replace(scheduler.view());
                reply.send();
                continue;
            }

            Some(completion) = completions.recv() => {
                scheduler.on_completion(completion);
            }

            _ = next_tick(&mut timers.countdown) => {
                scheduler.on_countdown_tick();
            }

            _ = next_tick(&mut timers.refresh) => {
                scheduler.on_refresh_tick();
            }
        }

        view_tx.send_replace(scheduler.view());
    }

    view_tx.send_replace(scheduler.view());
    debug!("Scheduler task exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
