use std::{sync::Arc, time::Duration};

use tokio::{runtime::Runtime, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{common::Shutdown, store::Store};

use super::Launcher;

/// Periodic sweep that re-arms every active chain without an activation in flight.
pub struct Monitor {
    store: Arc<Store>,
    launcher: Arc<Launcher>,
    interval: Duration,

    shutdown: Arc<Shutdown>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        launcher: Arc<Launcher>,
        interval: Duration,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            store,
            launcher,
            interval,
            shutdown,
        }
    }

    pub fn monitor(
        &self,
        runtime: &Runtime,
    ) {
        let store = self.store.clone();
        let launcher = self.launcher.clone();
        let shutdown = self.shutdown.clone();
        let period = self.interval;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("monitor sweeping active chains every {:?}", period);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => sweep(&store, &launcher),
                }
            }
        });
    }
}

fn sweep(
    store: &Store,
    launcher: &Launcher,
) {
    let chains = match store.active_chains() {
        Ok(chains) => chains,
        Err(err) => {
            error!("monitor failed to list active chains: {}", err);
            return;
        }
    };

    for chain in chains {
        match launcher.rearm(&chain.id) {
            Ok(Some(activation)) => debug!("monitor re-activated chain {} as {}", chain.id, activation.id()),
            Ok(None) => {}
            Err(err) => warn!("monitor failed to re-activate chain {}: {}", chain.id, err),
        }
    }
}
