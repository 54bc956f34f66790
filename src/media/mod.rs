//! Elementary-stream media handling
//!
//! This module provides:
//! - Annex-B start-code scanning and unit classification
//! - Parameter-set (SPS/PPS) capture and the SDP negotiation line
//!
//! Decoding is out of scope; the scanner only reads unit boundaries and
//! type tags, and it never rejects a frame.

pub mod annexb;
pub mod params;

pub use annexb::{strip_start_code, UnitIter, UnitType, START_CODE};
pub use params::{ParameterSets, ScanOutcome};
