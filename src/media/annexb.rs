//! Annex-B elementary stream scanning
//!
//! The capture device emits H.264 in Annex-B framing: codec units
//! separated by a 4-byte start code (`00 00 00 01`), with the unit type in
//! the low 5 bits of the first payload byte.
//!
//! Scanning is tolerant: a malformed or truncated marker is skipped one
//! byte at a time and never aborts delivery of the frame.

use bytes::Bytes;

/// The Annex-B unit boundary marker.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    /// Non-IDR slice
    NonIdr = 1,
    /// Slice data partition A
    PartitionA = 2,
    /// Slice data partition B
    PartitionB = 3,
    /// Slice data partition C
    PartitionC = 4,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// End of sequence
    EndSeq = 10,
    /// End of stream
    EndStream = 11,
    /// Filler data
    Filler = 12,
}

impl UnitType {
    /// Classify from the first payload byte of a unit.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(UnitType::NonIdr),
            2 => Some(UnitType::PartitionA),
            3 => Some(UnitType::PartitionB),
            4 => Some(UnitType::PartitionC),
            5 => Some(UnitType::Idr),
            6 => Some(UnitType::Sei),
            7 => Some(UnitType::Sps),
            8 => Some(UnitType::Pps),
            9 => Some(UnitType::Aud),
            10 => Some(UnitType::EndSeq),
            11 => Some(UnitType::EndStream),
            12 => Some(UnitType::Filler),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, UnitType::Idr)
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, UnitType::Sps | UnitType::Pps)
    }
}

/// Find the next start code at or after `from`.
///
/// Anything that is not an exact 4-byte marker is stepped over one byte at
/// a time, which is what makes truncated markers harmless.
fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + START_CODE.len() <= data.len() {
        if data[i..i + START_CODE.len()] == START_CODE {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Iterator over the units of one Annex-B frame.
///
/// Yields each unit's payload bytes (start code excluded). Bytes before
/// the first marker are ignored; zero-length units between adjacent
/// markers are skipped.
pub struct UnitIter<'a> {
    data: &'a [u8],
    /// Index of the next marker, if one remains.
    marker: Option<usize>,
}

impl<'a> UnitIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            marker: find_start_code(data, 0),
        }
    }
}

impl<'a> Iterator for UnitIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.marker? + START_CODE.len();
            let end = find_start_code(self.data, start);
            self.marker = end;
            let unit = &self.data[start..end.unwrap_or(self.data.len())];
            if !unit.is_empty() {
                return Some(unit);
            }
        }
    }
}

/// Strip a leading start code for the wire payload contract.
///
/// The protocol collaborator receives the unit payload without its
/// Annex-B framing. Frames that do not begin with a marker pass through
/// unchanged.
pub fn strip_start_code(data: Bytes) -> Bytes {
    if data.len() >= START_CODE.len() && data[..START_CODE.len()] == START_CODE {
        data.slice(START_CODE.len()..)
    } else {
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_type() {
        assert_eq!(UnitType::from_byte(0x65), Some(UnitType::Idr));
        assert_eq!(UnitType::from_byte(0x67), Some(UnitType::Sps));
        assert_eq!(UnitType::from_byte(0x68), Some(UnitType::Pps));
        assert_eq!(UnitType::from_byte(0x41), Some(UnitType::NonIdr));
        assert_eq!(UnitType::from_byte(0x00), None);
    }

    #[test]
    fn test_unit_type_classification() {
        assert!(UnitType::Idr.is_keyframe());
        assert!(!UnitType::Sps.is_keyframe());
        assert!(UnitType::Sps.is_parameter_set());
        assert!(UnitType::Pps.is_parameter_set());
        assert!(!UnitType::Idr.is_parameter_set());
    }

    #[test]
    fn test_unit_iter_multiple_units() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, 0x67, 0x64, 0x00, 0x1F, // SPS
            0x00, 0x00, 0x00, 0x01, 0x68, 0xEF, 0x38, // PPS
            0x00, 0x00, 0x00, 0x01, 0x65, 0x88, // IDR
        ];

        let units: Vec<&[u8]> = UnitIter::new(data).collect();
        assert_eq!(units.len(), 3);
        assert_eq!(UnitType::from_byte(units[0][0]), Some(UnitType::Sps));
        assert_eq!(UnitType::from_byte(units[1][0]), Some(UnitType::Pps));
        assert_eq!(UnitType::from_byte(units[2][0]), Some(UnitType::Idr));
    }

    #[test]
    fn test_unit_iter_ignores_leading_garbage() {
        // Truncated marker bytes before the first real start code.
        let data: &[u8] = &[0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x65, 0x88];
        let units: Vec<&[u8]> = UnitIter::new(data).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0], &[0x65, 0x88]);
    }

    #[test]
    fn test_unit_iter_malformed_marker_mid_frame() {
        // A three-zero run that never completes a marker sits inside the
        // unit payload and must not split it.
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, 0x65, 0x00, 0x00, 0x00, 0x02, 0x88,
        ];
        let units: Vec<&[u8]> = UnitIter::new(data).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].len(), 6);
    }

    #[test]
    fn test_unit_iter_adjacent_markers() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, // empty unit
            0x00, 0x00, 0x00, 0x01, 0x41, 0x9A,
        ];
        let units: Vec<&[u8]> = UnitIter::new(data).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0], &[0x41, 0x9A]);
    }

    #[test]
    fn test_unit_iter_no_marker() {
        let data: &[u8] = &[0x65, 0x88, 0x84];
        assert!(UnitIter::new(data).next().is_none());
        assert!(UnitIter::new(&[]).next().is_none());
    }

    #[test]
    fn test_strip_start_code() {
        let framed = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88]);
        assert_eq!(strip_start_code(framed), Bytes::from_static(&[0x65, 0x88]));

        // No marker: unchanged.
        let bare = Bytes::from_static(&[0x65, 0x88]);
        assert_eq!(strip_start_code(bare.clone()), bare);

        // Shorter than a marker: unchanged.
        let tiny = Bytes::from_static(&[0x00, 0x00]);
        assert_eq!(strip_start_code(tiny.clone()), tiny);
    }
}
