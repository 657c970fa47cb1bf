//! Supervisor running the startup sweep, periodic sweeps and event dispatch

use crate::context::Context;
use crate::dispatcher::{EventDispatcher, StreamEnd};
use crate::reconciler::Reconciler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// A subscription that lived this long resets the backoff
const HEALTHY_SUBSCRIPTION: Duration = Duration::from_secs(60);

pub struct Registrar {
    ctx: Arc<Context>,
    dispatcher: EventDispatcher,
    reconciler: Arc<Reconciler>,
}

impl Registrar {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            dispatcher: EventDispatcher::new(ctx.clone()),
            reconciler: Arc::new(Reconciler::new(ctx.clone())),
            ctx,
        }
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.reconciler.clone()
    }

    /// Run until `shutdown` flips to true.
    ///
    /// A sweep runs before the first event is pulled and again after every
    /// lost subscription, since events during the gap are never redelivered.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Running startup reconciliation");
        self.reconciler.reconcile().await;

        let periodic = tokio::spawn(periodic_sweeps(
            self.reconciler.clone(),
            self.ctx.sweep.interval,
            shutdown.clone(),
        ));

        let mut backoff = INITIAL_BACKOFF;
        loop {
            info!("Subscribing to runtime events");
            let opened = Instant::now();
            match self.dispatcher.run(self.ctx.runtime.stream_events(), &mut shutdown).await {
                StreamEnd::Shutdown => break,
                StreamEnd::Closed => warn!("Runtime event stream closed"),
                StreamEnd::Failed(e) => warn!("Runtime event stream failed: {}", e),
            }

            if opened.elapsed() >= HEALTHY_SUBSCRIPTION {
                backoff = INITIAL_BACKOFF;
            }
            debug!("Resubscribing in {:?}", backoff);
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);

            self.reconciler.reconcile().await;
        }

        info!("Event dispatch stopped");
        if let Err(e) = periodic.await {
            warn!("Periodic sweep task ended abnormally: {}", e);
        }
    }
}

async fn periodic_sweeps(
    reconciler: Arc<Reconciler>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if reconciler.try_reconcile().await.is_none() {
                    warn!("Sweep already in progress, dropping tick");
                }
            }
        }
    }
    debug!("Periodic sweeps stopped");
}
