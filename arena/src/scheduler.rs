//! Turn scheduler: who speaks next, after what delay.
//!
//! Debaters speak in fixed roster order, round-robin. When an arbiter is
//! present it interjects on a freshly drawn period of 3 to 5 turns; an
//! arbiter turn never advances the round-robin pointer, so the debater
//! rotation is unaffected by interjections. After `max_rounds` complete
//! passes the scheduler signals the closing phase.

use rand::Rng;
use std::time::Duration;

/// Minimum think-time delay regardless of configuration.
const FLOOR_DELAY_MS: u64 = 1500;

/// Jitter applied to the configured base delay, in milliseconds.
const JITTER_MIN_MS: i64 = -1000;
const JITTER_MAX_MS: i64 = 2000;

/// Interjection period bounds, in turns.
const PERIOD_MIN: u64 = 3;
const PERIOD_MAX: u64 = 5;

/// Who speaks on a scheduled turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Index into the debater roster.
    Debater(usize),
    Arbiter,
}

/// One scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTurn {
    pub speaker: Speaker,
    /// Round the emitted message belongs to.
    pub round: u32,
}

/// Per-session turn scheduler.
#[derive(Debug)]
pub struct TurnScheduler {
    debater_count: usize,
    max_rounds: u32,
    arbiter: bool,
    /// Total emitted main-loop messages, arbiter turns included.
    turn: u64,
    /// Round-robin pointer, advanced only by debater turns.
    slot: usize,
    round: u32,
    /// Absolute turn at which the next interjection fires.
    next_interjection: u64,
}

impl TurnScheduler {
    pub fn new<R: Rng>(debater_count: usize, max_rounds: u32, arbiter: bool, rng: &mut R) -> Self {
        Self {
            debater_count,
            max_rounds,
            arbiter,
            turn: 0,
            slot: 0,
            round: 1,
            next_interjection: draw_period(rng),
        }
    }

    /// Whether the arbiter interjects at the given turn counter.
    pub fn interjection_due(&self, turn: u64) -> bool {
        self.arbiter && turn > 0 && turn >= self.next_interjection
    }

    /// Decide the next speaker and advance the counters.
    ///
    /// Rescheduling the next interjection to `turn + period` (fresh period
    /// each time) keeps at least two debater turns between consecutive
    /// arbiter turns.
    pub fn next_speaker<R: Rng>(&mut self, rng: &mut R) -> ScheduledTurn {
        let round = self.round;
        let speaker = if self.interjection_due(self.turn) {
            self.next_interjection = self.turn + draw_period(rng);
            Speaker::Arbiter
        } else {
            let idx = self.slot % self.debater_count;
            self.slot += 1;
            if self.slot % self.debater_count == 0 {
                self.round += 1;
            }
            Speaker::Debater(idx)
        };
        self.turn += 1;
        ScheduledTurn { speaker, round }
    }

    /// True once `max_rounds` full round-robin passes have completed.
    pub fn rounds_complete(&self) -> bool {
        self.round > self.max_rounds
    }

    /// Round of the next scheduled message.
    pub fn current_round(&self) -> u32 {
        self.round
    }

    /// Total messages scheduled so far.
    pub fn turns_taken(&self) -> u64 {
        self.turn
    }
}

fn draw_period<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(PERIOD_MIN..=PERIOD_MAX)
}

/// Think-time delay before a main-loop generation call:
/// `max(floor, base + jitter)`, driving the composing indicator. The base
/// is client-supplied, so the jitter arithmetic saturates instead of
/// wrapping.
pub fn think_delay<R: Rng>(base_delay_ms: u64, rng: &mut R) -> Duration {
    let jitter = rng.gen_range(JITTER_MIN_MS..=JITTER_MAX_MS);
    let delayed = if jitter < 0 {
        base_delay_ms.saturating_sub(jitter.unsigned_abs())
    } else {
        base_delay_ms.saturating_add(jitter as u64)
    };
    Duration::from_millis(delayed.max(FLOOR_DELAY_MS))
}

/// Think-time delay before an opening statement.
pub fn opening_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(1500..=3000))
}

/// Short pacing pause after a message is emitted.
pub fn pause_after<R: Rng>(phase_opening: bool, rng: &mut R) -> Duration {
    let ms = if phase_opening {
        rng.gen_range(800..=1500)
    } else {
        rng.gen_range(500..=1200)
    };
    Duration::from_millis(ms)
}

/// Staggered delay between roster-loading progress events.
pub fn roster_stagger<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(300..=700))
}
