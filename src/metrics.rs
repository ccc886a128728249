//! Engine activity counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct EngineMetrics {
    start_time: Instant,
    bets_placed: AtomicU64,
    games_resolved: AtomicU64,
    player_wins: AtomicU64,
    player_losses: AtomicU64,
    rejected: AtomicU64,
    total_staked: AtomicU64,
    total_paid_out: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bets_placed: u64,
    pub games_resolved: u64,
    pub player_wins: u64,
    pub player_losses: u64,
    pub rejected: u64,
    pub total_staked: u64,
    pub total_paid_out: u64,
}

impl MetricsSnapshot {
    /// Fraction of resolved games the house won, or `None` before any resolution
    pub fn house_win_rate(&self) -> Option<f64> {
        if self.games_resolved == 0 {
            return None;
        }
        Some(self.player_losses as f64 / self.games_resolved as f64)
    }

    pub fn pending(&self) -> u64 {
        self.bets_placed.saturating_sub(self.games_resolved)
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bets_placed: AtomicU64::new(0),
            games_resolved: AtomicU64::new(0),
            player_wins: AtomicU64::new(0),
            player_losses: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            total_staked: AtomicU64::new(0),
            total_paid_out: AtomicU64::new(0),
        }
    }

    pub fn record_bet(&self, stake: u64) {
        self.bets_placed.fetch_add(1, Ordering::SeqCst);
        self.total_staked.fetch_add(stake, Ordering::SeqCst);
    }

    pub fn record_resolution(&self, win: bool, payout: u64) {
        self.games_resolved.fetch_add(1, Ordering::SeqCst);
        if win {
            self.player_wins.fetch_add(1, Ordering::SeqCst);
            self.total_paid_out.fetch_add(payout, Ordering::SeqCst);
        } else {
            self.player_losses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bets_placed: self.bets_placed.load(Ordering::SeqCst),
            games_resolved: self.games_resolved.load(Ordering::SeqCst),
            player_wins: self.player_wins.load(Ordering::SeqCst),
            player_losses: self.player_losses.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            total_staked: self.total_staked.load(Ordering::SeqCst),
            total_paid_out: self.total_paid_out.load(Ordering::SeqCst),
        }
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Resolutions per second since the engine started
    pub fn average_resolution_rate(&self) -> f64 {
        let total_seconds = self.total_runtime().as_secs_f64();
        if total_seconds < 1.0 {
            return 0.0;
        }
        self.games_resolved.load(Ordering::SeqCst) as f64 / total_seconds
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
