//! Async tick driver – runs a [`NavEngine`] at a fixed rate.
//!
//! The engine itself is synchronous; the driver owns the timer, holds the
//! engine lock only for the duration of `tick()`, and forwards every
//! non-empty [`TickEvents`] on an optional channel. Hosts keep their own
//! clone of the engine handle to register agents, edit obstacles and
//! consume paths between ticks.
//!
//! ## Outbound events
//!
//! | Channel item                    | When                                  |
//! |---------------------------------|---------------------------------------|
//! | `NavEvent<TickEvents>`          | a tick admitted, completed or rebuilt |

use crate::engine::NavEngine;
use crate::events::{NavEvent, TickEvents};
use anyhow::Result;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 30.0 }
    }
}

// ---------------------------------------------------------------------------
// NavDriver
// ---------------------------------------------------------------------------

pub struct NavDriver {
    config: DriverConfig,
    engine: Arc<Mutex<NavEngine>>,
    events: Option<mpsc::Sender<NavEvent<TickEvents>>>,
}

impl NavDriver {
    pub fn new(config: DriverConfig, engine: Arc<Mutex<NavEngine>>) -> Self {
        Self {
            config,
            engine,
            events: None,
        }
    }

    /// Forward tick events to `sender`. A full or closed channel drops the
    /// event with a warning; the tick loop never waits on consumers.
    pub fn with_events(mut self, sender: mpsc::Sender<NavEvent<TickEvents>>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn engine(&self) -> Arc<Mutex<NavEngine>> {
        self.engine.clone()
    }

    /// Tick until SIGINT.
    pub async fn run(self) -> Result<()> {
        anyhow::ensure!(
            self.config.tick_rate_hz > 0.0,
            "tick rate must be positive, got {}",
            self.config.tick_rate_hz
        );
        info!("NavDriver ticking at {:.0}Hz", self.config.tick_rate_hz);

        let period = std::time::Duration::from_secs_f32(1.0 / self.config.tick_rate_hz);
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = timer.tick() => self.tick_once(),
                _ = &mut shutdown => {
                    info!("NavDriver shutting down (SIGINT)");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Run exactly `ticks` ticks back to back, yielding between them.
    pub async fn run_ticks(&self, ticks: u64) {
        for _ in 0..ticks {
            self.tick_once();
            tokio::task::yield_now().await;
        }
    }

    fn tick_once(&self) {
        // Release the lock before publishing.
        let events = {
            let _span = tracing::debug_span!("nav_tick").entered();
            self.engine.lock().tick()
        };
        if events.is_empty() {
            return;
        }
        if let Some(sender) = &self.events {
            let frame = events.tick;
            if let Err(e) = sender.try_send(NavEvent::new(frame, events)) {
                warn!("Dropped tick {} events: {}", frame, e);
            }
        }
    }
}
