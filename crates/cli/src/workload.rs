//! Workloads driven by the CLI.

use custody_core::{CustodyError, CustodyResult};
use custody_sync::{ManagerStats, Property, SharedManager};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TransferConfig {
    pub accounts: usize,
    pub threads: usize,
    pub ops_per_thread: usize,
    /// Injected delay inside each critical section.
    pub hold: Duration,
    pub seed: u64,
    pub initial_balance: i64,
}

impl TransferConfig {
    pub fn validate(&self) -> CustodyResult<()> {
        if self.accounts < 2 {
            return Err(CustodyError::InvalidInput(
                "a transfer needs at least 2 accounts".into(),
            ));
        }
        if self.threads == 0 {
            return Err(CustodyError::InvalidInput("threads must be > 0".into()));
        }
        if self.balance_bound().is_none() {
            return Err(CustodyError::InvalidInput(format!(
                "{} accounts of {} with {} threads x {} ops overflow a 64-bit balance",
                self.accounts, self.initial_balance, self.threads, self.ops_per_thread
            )));
        }
        Ok(())
    }

    pub fn transfers(&self) -> Option<u64> {
        (self.threads as u64).checked_mul(self.ops_per_thread as u64)
    }

    /// Largest magnitude any balance or partial sum of balances can reach.
    fn balance_bound(&self) -> Option<i64> {
        let moved = i64::try_from(self.transfers()?).ok()?;
        let accounts = i64::try_from(self.accounts).ok()?;
        self.initial_balance
            .checked_abs()?
            .checked_mul(accounts)?
            .checked_add(moved)
    }

    /// Saturates only for configs `validate` rejects.
    pub fn expected_total(&self) -> i64 {
        self.initial_balance
            .saturating_mul(i64::try_from(self.accounts).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub config: TransferConfig,
    pub transfers: u64,
    pub elapsed: Duration,
    pub final_total: i64,
    pub stats: ManagerStats,
}

impl TransferOutcome {
    pub fn conserved(&self) -> bool {
        self.final_total == self.config.expected_total()
    }
}

/// Every op borrows two distinct random accounts and moves one unit.
pub fn run_transfers(config: &TransferConfig) -> CustodyResult<TransferOutcome> {
    config.validate()?;

    let manager = SharedManager::named("bank");
    let accounts: Vec<Property<i64>> = (0..config.accounts)
        .map(|_| Property::new(config.initial_balance))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| CustodyError::Internal(format!("failed to build thread pool: {e}")))?;

    tracing::info!(
        accounts = config.accounts,
        threads = config.threads,
        ops = config.ops_per_thread,
        hold_us = config.hold.as_micros(),
        "running transfers"
    );

    let started = Instant::now();
    pool.install(|| {
        (0..config.threads).into_par_iter().for_each(|worker| {
            let mut rng = StdRng::seed_from_u64(config.seed ^ worker as u64);
            for _ in 0..config.ops_per_thread {
                let from = rng.gen_range(0..config.accounts);
                let mut to = rng.gen_range(0..config.accounts - 1);
                if to >= from {
                    to += 1;
                }

                manager.borrow((&accounts[from], &accounts[to]), |(mut src, mut dst)| {
                    if !config.hold.is_zero() {
                        thread::sleep(config.hold);
                    }
                    *src -= 1;
                    *dst += 1;
                });
            }
        });
    });
    let elapsed = started.elapsed();

    let all: Vec<&Property<i64>> = accounts.iter().collect();
    let final_total: i64 = manager.inspect(all.as_slice(), |balances| {
        balances.iter().map(|b| *b.get()).sum()
    });

    let stats = manager.stats();
    tracing::info!(
        elapsed_ms = elapsed.as_millis(),
        admitted = stats.admitted,
        conflict_waits = stats.conflict_waits,
        commit_retries = stats.commit_retries,
        "transfers done"
    );

    Ok(TransferOutcome {
        config: config.clone(),
        transfers: config.transfers().unwrap_or(u64::MAX),
        elapsed,
        final_total,
        stats,
    })
}

// ---------------------------------------------------------------------------
// Balance / traffic scenario
// ---------------------------------------------------------------------------

/// One entry or exit of a critical section.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub at_us: u64,
    pub actor: &'static str,
    pub event: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub balance: i64,
    pub traffic: i64,
    /// A ({balance}) and B ({traffic}) were inside at the same time.
    pub a_b_overlapped: bool,
    /// C ({balance, traffic}) entered only after A left.
    pub c_waited_for_a: bool,
    pub timeline: Vec<TimelineEvent>,
    pub stats: ManagerStats,
}

struct Timeline {
    started: Instant,
    events: Mutex<Vec<TimelineEvent>>,
}

impl Timeline {
    fn record(&self, actor: &'static str, event: &'static str) {
        let at_us = self.started.elapsed().as_micros() as u64;
        self.events.lock().push(TimelineEvent { at_us, actor, event });
    }

    fn find(&self, actor: &str, event: &str) -> Option<u64> {
        self.events
            .lock()
            .iter()
            .find(|e| e.actor == actor && e.event == event)
            .map(|e| e.at_us)
    }
}

/// A debits `balance`, B debits `traffic`, and C reads both while A is
/// still inside. Each critical section lasts `hold`.
pub fn run_scenario(hold: Duration) -> CustodyResult<ScenarioOutcome> {
    let manager = SharedManager::named("scenario");
    let balance = Property::new(100_i64);
    let traffic = Property::new(50_i64);
    let timeline = Timeline {
        started: Instant::now(),
        events: Mutex::new(Vec::new()),
    };

    thread::scope(|s| {
        let (manager, balance, traffic, timeline) = (&manager, &balance, &traffic, &timeline);
        let (a_inside_tx, a_inside_rx) = mpsc::channel();

        s.spawn(move || {
            manager.borrow(balance, |mut acc| {
                timeline.record("A", "enter");
                let _ = a_inside_tx.send(());
                thread::sleep(hold);
                *acc -= 30;
                timeline.record("A", "exit");
            })
        });
        s.spawn(move || {
            manager.borrow(traffic, |mut acc| {
                timeline.record("B", "enter");
                thread::sleep(hold);
                *acc -= 10;
                timeline.record("B", "exit");
            })
        });

        // C only starts once A is inside, so it must queue behind A.
        if a_inside_rx.recv().is_ok() {
            s.spawn(move || {
                manager.borrow((balance, traffic), |(b, t)| {
                    timeline.record("C", "enter");
                    tracing::info!(balance = *b, traffic = *t, "C observed");
                    timeline.record("C", "exit");
                })
            });
        }
    });

    let lookup = |actor: &str, event: &str| {
        timeline.find(actor, event).ok_or_else(|| {
            CustodyError::Internal(format!("scenario is missing event {actor}/{event}"))
        })
    };
    let (a_in, a_out) = (lookup("A", "enter")?, lookup("A", "exit")?);
    let (b_in, b_out) = (lookup("B", "enter")?, lookup("B", "exit")?);
    let c_in = lookup("C", "enter")?;

    let mut events = std::mem::take(&mut *timeline.events.lock());
    events.sort_by_key(|e| e.at_us);

    Ok(ScenarioOutcome {
        balance: balance.into_inner(),
        traffic: traffic.into_inner(),
        a_b_overlapped: a_in.max(b_in) < a_out.min(b_out),
        c_waited_for_a: c_in >= a_out,
        timeline: events,
        stats: manager.stats(),
    })
}
