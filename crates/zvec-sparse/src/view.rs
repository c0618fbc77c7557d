//! Parser over the §3.3 on-wire sparse vector layout.

use crate::error::SparseError;
use crate::value::SparseValue;

#[derive(Debug, Clone, Copy)]
pub struct Segment<'a, T> {
    pub segment_id: u32,
    pub indices: &'a [u16],
    pub values: &'a [T],
}

/// A parsed view over one on-wire sparse vector. Segments are ascending by
/// `segment_id`; within a segment, `indices` is strictly ascending.
pub struct SparseVectorView<T> {
    pub sparse_count: u32,
    segment_ids: Vec<u32>,
    segment_counts: Vec<u32>,
    indices: Vec<u16>,
    values: Vec<T>,
}

impl<T: SparseValue> SparseVectorView<T> {
    pub fn parse(buf: &[u8]) -> Result<Self, SparseError> {
        if buf.len() < 8 {
            return Err(SparseError::TruncatedHeader);
        }
        let sparse_count = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let segment_count = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;

        let mut offset = 8usize;
        let seg_ids_end = offset + 4 * segment_count;
        let seg_cnt_end = seg_ids_end + 4 * segment_count;
        let idx_end = seg_cnt_end + 2 * sparse_count as usize;
        let val_end = idx_end + T::BYTE_LEN * sparse_count as usize;
        if buf.len() < val_end {
            return Err(SparseError::TruncatedBody);
        }

        let segment_ids: Vec<u32> = buf[offset..seg_ids_end]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        offset = seg_ids_end;
        let segment_counts: Vec<u32> = buf[offset..seg_cnt_end]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let indices: Vec<u16> = buf[seg_cnt_end..idx_end]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
            .collect();

        let values: Vec<T> = buf[idx_end..val_end]
            .chunks_exact(T::BYTE_LEN)
            .map(T::read_le)
            .collect();

        Ok(Self {
            sparse_count,
            segment_ids,
            segment_counts,
            indices,
            values,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.segment_ids.len()
    }

    pub fn segment(&self, i: usize) -> Segment<'_, T> {
        let start: usize = self.segment_counts[..i].iter().sum::<u32>() as usize;
        let len = self.segment_counts[i] as usize;
        Segment {
            segment_id: self.segment_ids[i],
            indices: &self.indices[start..start + len],
            values: &self.values[start..start + len],
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment<'_, T>> {
        (0..self.segment_count()).map(move |i| self.segment(i))
    }

    /// Full 32-bit index (`segment_id << 16 | intra`) and value, in order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, T)> + '_ {
        self.segments().flat_map(|seg| {
            seg.indices
                .iter()
                .zip(seg.values.iter())
                .map(move |(&intra, &v)| ((seg.segment_id << 16) | intra as u32, v))
        })
    }
}
