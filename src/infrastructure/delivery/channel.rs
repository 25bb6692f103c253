//! Channel-backed delivery context.
//!
//! The loader completes fetches on worker tasks, but results must surface on
//! one designated context (typically the UI loop). [`ChannelDelivery`] is
//! the sending half handed to the loader; [`DeliveryPump`] is the receiving
//! half driven by whoever owns that context.

use tokio::sync::mpsc;
use tracing::error;

use crate::domain::ports::{DeliveryJob, DeliveryPort};

/// Sending half of the delivery context. Cheap to clone.
#[derive(Clone)]
pub struct ChannelDelivery {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl ChannelDelivery {
    /// Creates a connected delivery/pump pair.
    #[must_use]
    pub fn channel() -> (Self, DeliveryPump) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DeliveryPump { rx })
    }
}

impl DeliveryPort for ChannelDelivery {
    fn deliver(&self, job: DeliveryJob) {
        if self.tx.send(job).is_err() {
            error!("Delivery context is gone; dropping callback");
        }
    }
}

impl std::fmt::Debug for ChannelDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDelivery").finish_non_exhaustive()
    }
}

/// Receiving half of the delivery context.
///
/// Jobs execute on whichever context drives the pump, in delivery order.
pub struct DeliveryPump {
    rx: mpsc::UnboundedReceiver<DeliveryJob>,
}

impl DeliveryPump {
    /// Runs jobs until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
    }

    /// Blocking variant of [`run`](Self::run) for a dedicated thread
    /// outside the async runtime.
    pub fn run_blocking(mut self) {
        while let Some(job) = self.rx.blocking_recv() {
            job();
        }
    }

    /// Executes every job queued so far and returns how many ran.
    ///
    /// Call once per frame from an event-loop style context.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Receives the next job without executing it.
    pub async fn recv(&mut self) -> Option<DeliveryJob> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for DeliveryPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryPump").finish_non_exhaustive()
    }
}
