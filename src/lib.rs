//! Camera capture to multi-session streaming core
//!
//! Reads an encoded elementary stream off one capture device and serves
//! it to any number of concurrent delivery sessions, reading the hardware
//! exactly once per frame:
//!
//! ```text
//! FrameSource ─► DeliveryBridge ─► scanner ─► StreamReplicator ─► sessions
//! ```
//!
//! The device driver and the transport packetizer both live behind traits
//! ([`capture::FrameSource`], [`session::Packetizer`]); the crate owns
//! everything in between: the bounded drop-oldest capture queue, the
//! parameter-set scanner that produces the SDP negotiation line, the
//! per-replica fan-out and the session lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use camstream_rs::{CapturePipeline, StreamerConfig};
//!
//! # async fn example(source: impl camstream_rs::capture::FrameSource,
//! #                  packetizer: impl camstream_rs::session::Packetizer) {
//! let config = StreamerConfig::with_device("/dev/video0").fps(30);
//! let mut pipeline = CapturePipeline::new(config);
//!
//! let _session = pipeline
//!     .spawn_persistent("239.255.42.42:8600".parse().unwrap(), packetizer)
//!     .await;
//! pipeline.start(source).await.unwrap();
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod media;
pub mod pipeline;
pub mod replicate;
pub mod session;
pub mod stats;

pub use config::StreamerConfig;
pub use error::{Error, Result};
pub use frame::{CapturedFrame, StreamFrame};
pub use pipeline::{CapturePipeline, SessionHandle};
