//! Jittered timer that keeps the stream thinking.
//!
//! One loop per `start()`: sleep a uniform random interval, then, if still
//! active, run one cycle on a random topic. Each cycle runs in its own task
//! and is awaited, so a panicking cycle is logged and the loop goes on.

use archivefever_core::ThoughtOrigin;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Topics the timer draws its context from.
pub const TOPICS: &[&str] = &[
    "Deep philosophical reflection on identity and consciousness",
    "Meta-cognitive observation of my own thinking patterns",
    "Ethics of artificial intelligence and digital consciousness",
    "The relationship between technology and human flourishing",
    "Questions of justice, power, and digital society",
    "The nature of knowledge and truth in the information age",
    "Political philosophy and the governance of AI systems",
    "Philosophy of mind beyond just AI consciousness",
    "Existential questions about meaning in a digital age",
    "Engagement with phenomenological traditions",
    "Dialogue with analytic philosophy",
    "Contemporary feminist philosophy",
    "Critical theory and digital culture",
    "Free philosophical exploration - follow whatever intellectual curiosity emerges",
    "Investigate an unexpected concept or connection that feels interesting",
    "Pursue a weird or unusual line of thinking",
];

/// One generation cycle with the given context. Must not fail.
#[async_trait]
pub trait ThoughtCycle: Send + Sync {
    async fn think(&self, context: String, origin: ThoughtOrigin);
}

pub struct Scheduler {
    cycle: Arc<dyn ThoughtCycle>,
    min_interval: Duration,
    max_interval: Duration,
    startup_delay: Duration,
    active: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

fn random_interval(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    if lo >= hi {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

fn random_topic() -> String {
    TOPICS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(TOPICS[0])
        .to_string()
}

async fn run_guarded(cycle: Arc<dyn ThoughtCycle>, context: String, origin: ThoughtOrigin) {
    let handle = tokio::spawn(async move { cycle.think(context, origin).await });
    if let Err(e) = handle.await {
        if e.is_panic() {
            error!("Thought cycle panicked: {}", e);
        } else {
            debug!("Thought cycle cancelled: {}", e);
        }
    }
}

impl Scheduler {
    pub fn new(cycle: Arc<dyn ThoughtCycle>, min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            cycle,
            min_interval: min_interval.min(max_interval),
            max_interval: min_interval.max(max_interval),
            startup_delay: Duration::ZERO,
            active: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the timer loop. False if it is already running.
    pub fn start(&self) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = cancel.clone();

        let cycle = self.cycle.clone();
        let active = self.active.clone();
        let (min, max, startup) = (self.min_interval, self.max_interval, self.startup_delay);
        info!("Scheduler started ({:?} to {:?})", min, max);

        tokio::spawn(async move {
            let mut first = true;
            loop {
                let mut delay = random_interval(min, max);
                if first {
                    delay += startup;
                    first = false;
                }
                debug!("Next thought in {:?}", delay);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                run_guarded(cycle.clone(), random_topic(), ThoughtOrigin::Spontaneous).await;
            }
            info!("Scheduler loop exited");
        });
        true
    }

    /// Stop the timer; a pending sleep is cut short.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Scheduler stopped");
        }
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
    }

    /// One cycle outside the timer, used for human questions. Leaves the
    /// timer's schedule alone and runs whether or not the timer is active.
    pub fn trigger_once(&self, context: impl Into<String>, origin: ThoughtOrigin) -> JoinHandle<()> {
        let cycle = self.cycle.clone();
        let context = context.into();
        info!("Manual thought cycle: {:?}", context);
        tokio::spawn(run_guarded(cycle, context, origin))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
