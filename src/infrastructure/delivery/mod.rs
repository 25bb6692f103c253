//! Delivery context adapters.

mod channel;

pub use channel::{ChannelDelivery, DeliveryPump};
