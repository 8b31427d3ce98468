use crate::api::{
    NotifyOnResyncRequest, ResyncStream, ValidationApi, ValidationRequest, ValidationResponse,
};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::{future::Future, sync::Arc, time::Duration};
use tonic::{Code, Status};
use tracing::{debug, info, warn};

type Connect<C> = Arc<dyn Fn() -> BoxFuture<'static, Result<C, Status>> + Send + Sync>;

/// A `ValidationApi` that reconnects its inner client when the remote
/// service becomes unavailable.
///
/// Each call runs against a snapshot of the current client. When a call
/// fails with a retryable status, the first retry replaces the client unless
/// a concurrent caller has already done so; subsequent retries back off
/// against the replacement. A failed reconnect ends the retry loop with the
/// connection error.
pub struct ResilientClient<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    current: RwLock<Current<C>>,
    reconnecting: tokio::sync::Mutex<()>,
    connect: Connect<C>,
    backoff: ExponentialBackoff,
}

struct Current<C> {
    client: C,
    generation: u64,
}

/// The retry schedule used when none is configured.
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(100))
        .with_max_interval(Duration::from_secs(2))
        .with_max_elapsed_time(Some(Duration::from_secs(10)))
        .build()
}

fn is_retryable(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::FailedPrecondition | Code::Aborted
    )
}

// === impl ResilientClient ===

impl<C> Clone for ResilientClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ValidationApi> ResilientClient<C> {
    pub fn new<F, Fut>(client: C, connect: F, backoff: ExponentialBackoff) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, Status>> + Send + 'static,
    {
        let connect: Connect<C> = Arc::new(move || connect().boxed());
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Current {
                    client,
                    generation: 0,
                }),
                reconnecting: tokio::sync::Mutex::new(()),
                connect,
                backoff,
            }),
        }
    }

    /// Builds the initial client with `connect`, which is also used for
    /// every later reconnect.
    pub async fn connect<F, Fut>(connect: F, backoff: ExponentialBackoff) -> Result<Self, Status>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, Status>> + Send + 'static,
    {
        let client = connect().await?;
        Ok(Self::new(client, connect, backoff))
    }

    /// The number of times the client has been replaced.
    pub fn generation(&self) -> u64 {
        self.inner.current.read().generation
    }

    fn current(&self) -> (C, u64) {
        let current = self.inner.current.read();
        (current.client.clone(), current.generation)
    }

    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, Status>
    where
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let mut backoff = self.inner.backoff.clone();
        backoff.reset();
        let mut retries = 0usize;
        loop {
            let (client, generation) = self.current();
            let status = match f(client).await {
                Ok(rsp) => return Ok(rsp),
                Err(status) if is_retryable(&status) => status,
                Err(status) => return Err(status),
            };

            let Some(delay) = backoff.next_backoff() else {
                warn!(%op, retries, code = ?status.code(), "Giving up");
                return Err(status);
            };
            debug!(%op, retries, code = ?status.code(), message = %status.message(), ?delay, "Retrying");
            if retries == 0 {
                self.reconnect(generation).await?;
            }
            retries += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Replaces the client observed at `generation`, unless another caller
    /// already has.
    async fn reconnect(&self, generation: u64) -> Result<(), Status> {
        let _guard = self.inner.reconnecting.lock().await;
        let current = self.generation();
        if current != generation {
            debug!(generation, current, "Client already replaced");
            return Ok(());
        }

        info!(generation, "Reconnecting to validation server");
        let client = (self.inner.connect)().await.map_err(|status| {
            warn!(code = ?status.code(), message = %status.message(), "Failed to reconnect");
            status
        })?;

        let mut current = self.inner.current.write();
        current.client = client;
        current.generation += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: ValidationApi> ValidationApi for ResilientClient<C> {
    async fn validate(&self, req: ValidationRequest) -> Result<ValidationResponse, Status> {
        self.call("validate", |client| {
            let req = req.clone();
            async move { client.validate(req).await }
        })
        .await
    }

    async fn notify_on_resync(&self, req: NotifyOnResyncRequest) -> Result<ResyncStream, Status> {
        self.call("notify_on_resync", |client| {
            let req = req.clone();
            async move { client.notify_on_resync(req).await }
        })
        .await
    }
}
