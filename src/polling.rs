use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dispatch::UpdateProcessor;
use crate::request::RequestFactory;
use crate::transport::Transport;
use crate::update::decode_update_batch;

/// Long-poll acquisition: a dedicated background task repeatedly asks for
/// updates newer than the last-seen offset and feeds them to the processor,
/// one at a time and in batch order.
pub struct PollingBot {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct PollContext {
    factory: RequestFactory,
    transport: Arc<dyn Transport>,
    processor: Arc<dyn UpdateProcessor>,
}

impl PollingBot {
    pub fn spawn(
        factory: RequestFactory,
        transport: Arc<dyn Transport>,
        processor: Arc<dyn UpdateProcessor>,
        period: Duration,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let ctx = PollContext {
            factory,
            transport,
            processor,
        };
        let handle = tokio::spawn(run_loop(ctx, period, stop_rx));
        Self { stop, handle }
    }

    /// Cooperative stop: observed at the loop's next wait point. An in-flight
    /// iteration is never interrupted.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the loop task to exit.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn run_loop(ctx: PollContext, period: Duration, mut stop: watch::Receiver<bool>) {
    unsubscribe(&ctx).await;
    let mut offset: i64 = 0;
    loop {
        tokio::select! {
            _ = stop.changed() => {
                info!("update polling loop exiting");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }
        offset = poll_iteration(&ctx, offset).await;
    }
}

/// Best-effort webhook removal so a previously registered webhook does not
/// compete with polling. Failure is logged, not fatal.
async fn unsubscribe(ctx: &PollContext) {
    match ctx.factory.unsubscribe_webhook() {
        Ok(request) => {
            if let Err(e) = ctx.transport.execute(&request).await {
                error!("failed to unsubscribe webhook: {e:#}");
            }
        }
        Err(e) => error!("failed to build unsubscribe request: {e:#}"),
    }
}

/// One iteration inside a panic boundary: a single bad update must not kill
/// the polling loop. On panic the offset stays unchanged for this iteration,
/// so the batch is re-fetched next period.
async fn poll_iteration(ctx: &PollContext, offset: i64) -> i64 {
    match AssertUnwindSafe(poll_once(ctx, offset)).catch_unwind().await {
        Ok(next) => next,
        Err(panic) => {
            error!("panic in polling iteration: {}", panic_message(panic.as_ref()));
            offset
        }
    }
}

async fn poll_once(ctx: &PollContext, offset: i64) -> i64 {
    let request = ctx.factory.get_updates(offset + 1, 0, 0);
    let body = match ctx.transport.execute(&request).await {
        Ok(body) => body,
        Err(e) => {
            error!("failed to pull updates: {e:#}");
            return offset;
        }
    };
    let batch = match decode_update_batch(&body) {
        Ok(batch) => batch,
        Err(e) => {
            error!("failed to decode update batch: {e:#}");
            return offset;
        }
    };
    if !batch.ok {
        error!("platform flagged the update batch as not ok");
        return offset;
    }
    if batch.updates.is_empty() {
        return offset;
    }
    let mut candidate = offset;
    for update in &batch.updates {
        candidate = candidate.max(update.id);
        // One failed update must not block the rest of the batch or keep the
        // offset from advancing past it.
        if let Err(e) = ctx.processor.process(update).await {
            error!("failed to process update {}: {e:#}", update.id);
        }
    }
    candidate
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
