//! Device capture side of the pipeline
//!
//! This module provides:
//! - The [`FrameSource`] trait the capture device collaborator implements
//! - A bounded, lossy [`FrameQueue`] absorbing producer/consumer rate skew
//! - The [`DeliveryBridge`] SPSC handoff that decouples device readiness
//!   from downstream delivery
//!
//! Data flows strictly one way: the device pump enqueues, the delivery
//! task receives. Backpressure is drop-oldest, applied silently and
//! logged; a lagging consumer never stalls the device read path.

pub mod bridge;
pub mod queue;
pub mod source;

pub use bridge::DeliveryBridge;
pub use queue::FrameQueue;
pub use source::{CaptureError, CaptureFormat, FrameSource};

pub(crate) use source::CaptureTask;
