//! Convert an external `(count, indices[u32], values[T])` sparse vector into
//! the segmented on-wire layout of SPEC_FULL.md §3.3, §4.3.

use crate::error::SparseError;
use crate::value::SparseValue;

const SEGMENT_SHIFT: u32 = 16;
const INTRA_MASK: u32 = 0xFFFF;

/// Encode `(count, indices, values)` into the §3.3 byte layout.
///
/// `indices` must be ascending within the caller's intent; a high-16 segment
/// id that decreases relative to the previous entry is malformed input and
/// is rejected (§9 Open Question, resolved in DESIGN.md: reject rather than
/// silently drop).
pub fn encode<T: SparseValue>(
    count: u32,
    indices: &[u32],
    values: &[T],
) -> Result<Vec<u8>, SparseError> {
    debug_assert_eq!(indices.len(), count as usize);
    debug_assert_eq!(values.len(), count as usize);

    if count == 0 {
        return Ok(vec![0u8; 8]);
    }

    let mut segment_ids: Vec<u32> = Vec::new();
    let mut segment_counts: Vec<u32> = Vec::new();
    let mut prev_segment: Option<u32> = None;

    for (i, &idx) in indices.iter().enumerate() {
        let segment = idx >> SEGMENT_SHIFT;
        match prev_segment {
            None => {
                segment_ids.push(segment);
                segment_counts.push(1);
            }
            Some(prev) if segment == prev => {
                *segment_counts.last_mut().unwrap() += 1;
            }
            Some(prev) if segment > prev => {
                segment_ids.push(segment);
                segment_counts.push(1);
            }
            Some(prev) => {
                return Err(SparseError::OutOfOrderSegment {
                    index: i,
                    prev,
                    current: segment,
                });
            }
        }
        prev_segment = Some(segment);
    }

    let segment_count = segment_ids.len();
    let capacity = 2 * 4
        + 2 * 4 * segment_count
        + 2 * (count as usize)
        + T::BYTE_LEN * (count as usize);
    let mut out = Vec::with_capacity(capacity);

    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&(segment_count as u32).to_le_bytes());
    for id in &segment_ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
    for cnt in &segment_counts {
        out.extend_from_slice(&cnt.to_le_bytes());
    }
    for &idx in indices {
        let intra = (idx & INTRA_MASK) as u16;
        out.extend_from_slice(&intra.to_le_bytes());
    }
    for v in values {
        v.write_le(&mut out);
    }

    debug_assert_eq!(out.len(), capacity);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_emits_eight_zero_bytes() {
        let out = encode::<f32>(0, &[], &[]).unwrap();
        assert_eq!(out, vec![0u8; 8]);
    }

    #[test]
    fn two_segment_layout_matches_spec_s4() {
        // x = {0:1.0, 3:2.0, 65540:5.0} spans two segments: 0 and 1.
        let indices = [0u32, 3, 65540];
        let values = [1.0f32, 2.0, 5.0];
        let out = encode(3, &indices, &values).unwrap();
        let count = u32::from_le_bytes(out[0..4].try_into().unwrap());
        let seg_count = u32::from_le_bytes(out[4..8].try_into().unwrap());
        assert_eq!(count, 3);
        assert_eq!(seg_count, 2);
    }

    #[test]
    fn rejects_backwards_segment() {
        let indices = [65540u32, 3];
        let values = [1.0f32, 2.0];
        let err = encode(2, &indices, &values).unwrap_err();
        assert!(matches!(err, SparseError::OutOfOrderSegment { .. }));
    }
}
