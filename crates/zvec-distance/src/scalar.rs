//! The scalar inner-product kernels. These are the oracle referenced by
//! SPEC_FULL.md §8.1 ("order-of-operations-invariant scalar reference") and
//! the fallback tier that is always present (§4.1 "Selection algorithm").
//!
//! All four take the interleaved layout described in §3.2: element `k` of
//! stored vector `i` lives at `m[k*m_count + i]`, analogously for the query
//! side with stride `n_count`. Output is column-major: `out[i + j*m_count]`.

use half::f16;
use zvec_types::score_i4_bytes;

pub fn compute_f32(m: &[f32], q: &[f32], dim: usize, m_count: usize, n_count: usize, out: &mut [f32]) {
    out[..m_count * n_count].fill(0.0);
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for (j, &qv) in q_row.iter().enumerate() {
            let col = &mut out[j * m_count..j * m_count + m_count];
            for (i, &mv) in m_row.iter().enumerate() {
                col[i] += mv * qv;
            }
        }
    }
}

pub fn compute_f16(m: &[f16], q: &[f16], dim: usize, m_count: usize, n_count: usize, out: &mut [f32]) {
    out[..m_count * n_count].fill(0.0);
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for (j, &qv) in q_row.iter().enumerate() {
            let qv = qv.to_f32();
            let col = &mut out[j * m_count..j * m_count + m_count];
            for (i, &mv) in m_row.iter().enumerate() {
                col[i] += mv.to_f32() * qv;
            }
        }
    }
}

/// `dim` must be a multiple of 4 (caller-validated, §3.2); accumulation
/// happens in the integer domain so results are bit-identical across tiers
/// (§8.1 property 1).
pub fn compute_i8(m: &[i8], q: &[i8], dim: usize, m_count: usize, n_count: usize, out: &mut [f32]) {
    let mut acc = vec![0i32; m_count * n_count];
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for (j, &qv) in q_row.iter().enumerate() {
            let col = &mut acc[j * m_count..j * m_count + m_count];
            for (i, &mv) in m_row.iter().enumerate() {
                col[i] += mv as i32 * qv as i32;
            }
        }
    }
    for (o, a) in out.iter_mut().zip(acc.iter()) {
        *o = *a as f32;
    }
}

/// `dim` must be a multiple of 8 (§3.2); `m`/`q` are packed two nibbles per
/// byte. Each pair of consecutive dimensions `(2*kb, 2*kb+1)` is carried in
/// one interleaved byte per vector: `m[kb*m_count + i]`, low nibble first.
pub fn compute_i4(m: &[u8], q: &[u8], dim: usize, m_count: usize, n_count: usize, out: &mut [f32]) {
    debug_assert_eq!(dim % 2, 0);
    let byte_count = dim / 2;
    let mut acc = vec![0i32; m_count * n_count];
    for kb in 0..byte_count {
        let m_row = &m[kb * m_count..kb * m_count + m_count];
        let q_row = &q[kb * n_count..kb * n_count + n_count];
        for (j, &qb) in q_row.iter().enumerate() {
            let col = &mut acc[j * m_count..j * m_count + m_count];
            for (i, &mb) in m_row.iter().enumerate() {
                col[i] += score_i4_bytes(mb, qb);
            }
        }
    }
    for (o, a) in out.iter_mut().zip(acc.iter()) {
        *o = *a as f32;
    }
}
