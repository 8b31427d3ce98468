use crate::{index::SharedIndex, validator::SnapshotValidator};
use futures::future;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{self, Duration, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Pushes index changes into the validator every `period` and re-renders
/// the baseline whenever the validation server asks for a resync.
pub(crate) async fn run(
    index: SharedIndex,
    validator: Arc<SnapshotValidator>,
    mut resyncs: Option<mpsc::Receiver<()>>,
    period: Duration,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = index.write().take_snapshot();
                if let Some(snapshot) = snapshot {
                    debug!("Syncing snapshot");
                    if let Err(error) = validator.sync(snapshot).await {
                        warn!(%error, "Snapshot failed validation");
                    }
                }
            }

            resync = recv(&mut resyncs) => match resync {
                Some(()) => {
                    info!("Resync requested by the validation server");
                    if let Err(error) = validator.resync().await {
                        warn!(%error, "Snapshot failed validation");
                    }
                }
                None => {
                    debug!("Resync notifications closed");
                    resyncs = None;
                }
            },
        }
    }
}

async fn recv(rx: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
