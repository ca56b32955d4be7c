//! Core engine: cancellation tokens and the refresh scheduler.

pub mod cancel;
pub mod scheduler;

pub use cancel::CancelToken;
pub use scheduler::{
    fetch_board, refresh_winners, spawn, ControlError, Controls, Notice, RefreshScheduler,
    SchedulerHandle, SchedulerView, TimerState,
};
