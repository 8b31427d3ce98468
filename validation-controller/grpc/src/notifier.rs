use crate::api::{NotifyOnResyncRequest, ValidationApi};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use futures::prelude::*;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, info_span, warn, Instrument};

/// Relays resync notifications from the validation server.
///
/// Notifications carry no payload, so at most one is buffered and later ones
/// are dropped while it is pending. The stream is re-opened after a backoff
/// whenever it fails or ends. The channel closes once the drain is signaled.
pub struct ResyncNotifier<C> {
    client: C,
    backoff: ExponentialBackoff,
}

// === impl ResyncNotifier ===

impl<C: ValidationApi> ResyncNotifier<C> {
    pub fn new(client: C) -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(None)
            .build();
        Self::with_backoff(client, backoff)
    }

    pub fn with_backoff(client: C, backoff: ExponentialBackoff) -> Self {
        Self { client, backoff }
    }

    pub fn spawn(self, drain: drain::Watch) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(self.run(tx, drain).instrument(info_span!("resync")));
        rx
    }

    async fn run(mut self, tx: mpsc::Sender<()>, drain: drain::Watch) {
        tokio::pin! {
            let shutdown = drain.signaled();
        }

        loop {
            let opened = tokio::select! {
                res = self.client.notify_on_resync(NotifyOnResyncRequest::default()) => res,
                _ = &mut shutdown => return,
            };

            match opened {
                Ok(mut stream) => {
                    info!("Watching for resync notifications");
                    self.backoff.reset();
                    loop {
                        tokio::select! {
                            msg = stream.next() => match msg {
                                Some(Ok(_)) => match tx.try_send(()) {
                                    Ok(()) => debug!("Resync requested"),
                                    Err(TrySendError::Full(())) => debug!("Resync already pending"),
                                    Err(TrySendError::Closed(())) => return,
                                },
                                Some(Err(status)) => {
                                    warn!(code = ?status.code(), message = %status.message(), "Resync stream failed");
                                    break;
                                }
                                None => {
                                    debug!("Resync stream ended");
                                    break;
                                }
                            },
                            _ = &mut shutdown => return,
                        }
                    }
                }
                Err(status) => {
                    warn!(code = ?status.code(), message = %status.message(), "Failed to watch for resync notifications");
                }
            }

            let delay = self
                .backoff
                .next_backoff()
                .unwrap_or(self.backoff.max_interval);
            debug!(?delay, "Re-opening resync stream");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NotifyOnResyncResponse, ResyncStream, ValidationRequest, ValidationResponse};
    use parking_lot::Mutex;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };
    use tokio::time;
    use tokio_stream::wrappers::ReceiverStream;
    use tonic::Status;

    /// Hands out queued streams, then streams that never yield.
    #[derive(Clone, Default)]
    struct Fake {
        streams: Arc<Mutex<VecDeque<Result<ResyncStream, Status>>>>,
        opens: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ValidationApi for Fake {
        async fn validate(&self, _: ValidationRequest) -> Result<ValidationResponse, Status> {
            Err(Status::unimplemented("validate"))
        }

        async fn notify_on_resync(&self, _: NotifyOnResyncRequest) -> Result<ResyncStream, Status> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.streams
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Box::pin(stream::pending::<Notification>())))
        }
    }

    type Notification = Result<NotifyOnResyncResponse, Status>;

    fn responses(items: Vec<Notification>) -> Result<ResyncStream, Status> {
        Ok(Box::pin(stream::iter(items)))
    }

    impl Fake {
        fn push(&self, stream: Result<ResyncStream, Status>) {
            self.streams.lock().push_back(stream);
        }
    }

    fn notifier(client: Fake) -> ResyncNotifier<Fake> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
            .with_max_elapsed_time(None)
            .build();
        ResyncNotifier::with_backoff(client, backoff)
    }

    #[tokio::test]
    async fn notifications_are_coalesced() {
        let client = Fake::default();
        let (server_tx, server_rx) = mpsc::channel::<Notification>(1);
        client.push(Ok(Box::pin(ReceiverStream::new(server_rx))));

        let (_signal, watch) = drain::channel();
        let mut rx = notifier(client).spawn(watch);

        for _ in 0..3 {
            server_tx
                .send(Ok(NotifyOnResyncResponse::default()))
                .await
                .expect("notifier must be reading");
        }
        time::sleep(Duration::from_millis(50)).await;

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err(), "notifications must be coalesced");

        server_tx
            .send(Ok(NotifyOnResyncResponse::default()))
            .await
            .expect("notifier must be reading");
        let next = time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(next.expect("notification must arrive"), Some(()));
    }

    #[tokio::test]
    async fn streams_are_reopened_after_failures() {
        let client = Fake::default();
        client.push(Err(Status::unavailable("connection refused")));
        client.push(responses(vec![Err(Status::internal("stream reset"))]));
        client.push(responses(vec![]));
        client.push(responses(vec![Ok(NotifyOnResyncResponse::default())]));

        let (_signal, watch) = drain::channel();
        let mut rx = notifier(client.clone()).spawn(watch);

        let next = time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(next.expect("notification must arrive"), Some(()));
        assert!(client.opens.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn shutdown_closes_the_channel() {
        let client = Fake::default();
        let (signal, watch) = drain::channel();
        let mut rx = notifier(client.clone()).spawn(watch);

        // Wait for the stream to be opened before shutting down.
        while client.opens.load(Ordering::SeqCst) == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }
        signal.drain().await;

        let closed = time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(closed.expect("channel must close"), None);
    }
}
