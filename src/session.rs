use crate::config::Config;
use crate::gc::prune_expired_markers;
use crate::poller::poll_once;
use crate::state::Dashboard;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Owns the dashboard timers. Between `start()` and `stop()` the vehicle
/// list is polled, routes are re-validated and the status history is saved,
/// each on its own interval.
pub struct Session {
    state: Arc<Dashboard>,
    poll_interval: Duration,
    persist_interval: Duration,
    data_dir: PathBuf,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(state: Arc<Dashboard>, config: &Config) -> Self {
        Self {
            state,
            poll_interval: config.poll_interval,
            persist_interval: config.persist_interval,
            data_dir: config.data_dir.clone(),
            shutdown: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        self.state.activate();

        self.tasks.push(tokio::spawn(vehicle_poll_loop(
            self.state.clone(),
            self.poll_interval,
            rx.clone(),
        )));
        self.tasks.push(tokio::spawn(route_loop(
            self.state.clone(),
            self.poll_interval,
            rx.clone(),
        )));
        self.tasks.push(tokio::spawn(persist_loop(
            self.state.clone(),
            self.persist_interval,
            self.data_dir.clone(),
            rx,
        )));

        self.shutdown = Some(tx);
        info!(interval = ?self.poll_interval, "dashboard session started");
    }

    /// Cancels future timer firings. Requests already on the wire run to
    /// completion and their results are discarded.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            self.state.deactivate();
            let _ = tx.send(true);
            info!("dashboard session stopped");
        }
    }

    /// Waits for the loops of a stopped session to wind down.
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "session task panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn vehicle_poll_loop(state: Arc<Dashboard>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        state.catalog.ensure_loaded(state.backend.as_ref()).await;
        poll_once(&state).await;
        if state.is_live() {
            prune_expired_markers(&state, Utc::now());
        }
    }
    debug!("vehicle poll loop exited");
}

async fn route_loop(state: Arc<Dashboard>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        if !state.is_live() {
            break;
        }
        let checked = state.routes.revalidate_all(state.backend.as_ref()).await;
        if checked > 0 {
            debug!(checked, remaining = state.routes.len(), "routes re-validated");
        }
    }
    debug!("route loop exited");
}

async fn persist_loop(
    state: Arc<Dashboard>,
    period: Duration,
    dir: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let stopping = tokio::select! {
            _ = ticker.tick() => false,
            _ = shutdown.changed() => true,
        };

        if let Err(e) = state.history.save(&dir) {
            error!(error = %e, "saving status history failed");
        }
        if stopping {
            break;
        }
    }
    debug!("persist loop exited");
}
