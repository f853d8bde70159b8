//! Shared contracts for the air-quality alerting services.
//!
//! Every crate in the workspace speaks these types: the subscription records
//! persisted by the scheduler, the subscribe/unsubscribe messages consumed
//! from NATS, the measurement and prediction values that flow through one
//! evaluation, and the dispatcher interface alerts are delivered through.

pub mod dispatch;
pub mod measurements;
pub mod prediction;
pub mod risk;
pub mod subjects;
pub mod subscription;
pub mod validation;

pub use dispatch::*;
pub use measurements::*;
pub use prediction::*;
pub use risk::*;
pub use subjects::*;
pub use subscription::*;
pub use validation::*;
