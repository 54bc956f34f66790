//! Parameter-set capture and negotiation line
//!
//! Clients cannot decode anything until they hold the stream's SPS and
//! PPS, and session negotiation happens before the first in-band keyframe
//! reaches a client. The scanner therefore lifts the parameter sets out of
//! the elementary stream the first time a complete pair appears within one
//! frame, and formats the SDP attribute the negotiation layer hands out:
//!
//! ```text
//! a=fmtp:<pt> packetization-mode=1;profile-level-id=<6 hex>;sprop-parameter-sets=<b64>,<b64>\r\n
//! ```
//!
//! The cache is write-once in the common case; a later pair that differs
//! from the cached one (encoder reconfiguration) replaces it and the line
//! is rebuilt. Identical parameter bytes always yield the identical line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use super::annexb::{UnitIter, UnitType};

/// Result of scanning one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOutcome {
    /// Units found in the frame.
    pub units: usize,
    /// Whether an IDR unit was present.
    pub keyframe: bool,
    /// Whether the parameter-set cache changed.
    pub params_updated: bool,
}

/// Cached out-of-band codec configuration.
#[derive(Debug)]
pub struct ParameterSets {
    payload_type: u8,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    fmtp: Option<String>,
}

impl ParameterSets {
    /// Create an empty cache for the given RTP payload type.
    pub fn new(payload_type: u8) -> Self {
        Self {
            payload_type,
            sps: None,
            pps: None,
            fmtp: None,
        }
    }

    /// Scan one frame's bytes, capturing a parameter-set pair if present.
    ///
    /// Only a pair observed within the same frame qualifies; a lone SPS or
    /// PPS is ignored. Scan anomalies never fail the frame.
    pub fn absorb(&mut self, data: &Bytes) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut frame_sps: Option<&[u8]> = None;
        let mut frame_pps: Option<&[u8]> = None;

        for unit in UnitIter::new(data) {
            outcome.units += 1;
            match UnitType::from_byte(unit[0]) {
                Some(UnitType::Idr) => outcome.keyframe = true,
                Some(UnitType::Sps) => frame_sps = Some(unit),
                Some(UnitType::Pps) => frame_pps = Some(unit),
                _ => {}
            }
        }

        if let (Some(sps), Some(pps)) = (frame_sps, frame_pps) {
            let changed = self.sps.as_deref() != Some(sps) || self.pps.as_deref() != Some(pps);
            if changed {
                let line = format_fmtp(self.payload_type, sps, pps);
                tracing::info!(
                    sps_len = sps.len(),
                    pps_len = pps.len(),
                    reconfigured = self.fmtp.is_some(),
                    "Parameter sets captured"
                );
                self.sps = Some(Bytes::copy_from_slice(sps));
                self.pps = Some(Bytes::copy_from_slice(pps));
                self.fmtp = Some(line);
                outcome.params_updated = true;
            }
        }

        outcome
    }

    /// The formatted negotiation line, absent until the first qualifying
    /// frame has been scanned.
    pub fn fmtp_line(&self) -> Option<&str> {
        self.fmtp.as_deref()
    }

    /// Cached sequence parameter set.
    pub fn sps(&self) -> Option<&Bytes> {
        self.sps.as_ref()
    }

    /// Cached picture parameter set.
    pub fn pps(&self) -> Option<&Bytes> {
        self.pps.as_ref()
    }

    /// Whether a pair has been captured.
    pub fn is_ready(&self) -> bool {
        self.fmtp.is_some()
    }
}

/// Format the `a=fmtp` attribute from a parameter-set pair.
///
/// profile-level-id is the three bytes following the SPS unit-type byte
/// (profile_idc, constraint flags, level_idc), uppercase hex.
fn format_fmtp(payload_type: u8, sps: &[u8], pps: &[u8]) -> String {
    let profile_level_id = if sps.len() >= 4 {
        format!("{:02X}{:02X}{:02X}", sps[1], sps[2], sps[3])
    } else {
        "000000".to_string()
    };

    format!(
        "a=fmtp:{} packetization-mode=1;profile-level-id={};sprop-parameter-sets={},{}\r\n",
        payload_type,
        profile_level_id,
        STANDARD.encode(sps),
        STANDARD.encode(pps),
    )
}
