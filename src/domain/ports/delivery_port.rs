//! Delivery context port definition.

/// A unit of work scheduled onto the delivery context.
pub type DeliveryJob = Box<dyn FnOnce() + Send + 'static>;

/// Port for scheduling callback invocations onto one designated execution
/// context, such as a UI thread.
///
/// Jobs delivered from a single sender run in delivery order. A caller that
/// issues a request from the designated context may assume its callback
/// also runs on that context.
pub trait DeliveryPort: Send + Sync {
    /// Schedules a job onto the delivery context.
    fn deliver(&self, job: DeliveryJob);
}
