//! NEON acceleration on aarch64 hosts, mirroring `simd_x86.rs`'s structure
//! the way the teacher keeps `distance_avx.rs` as a dedicated sibling
//! file to `distance.rs` rather than cfg-gating everything inline.
#![allow(clippy::missing_safety_doc)]

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

/// Max SIMD tile size this file accelerates, per spec.md's grid
/// `{1,2,4,8,16,32}` (matches `simd_x86::MAX_TILE`).
pub const MAX_TILE: usize = 32;

#[cfg(target_arch = "aarch64")]
pub unsafe fn inner_product_1x1_neon(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let main = n - (n % 4);
    let mut acc = vdupq_n_f32(0.0);
    let mut i = 0;
    while i < main {
        let va = vld1q_f32(a.as_ptr().add(i));
        let vb = vld1q_f32(b.as_ptr().add(i));
        acc = vfmaq_f32(acc, va, vb);
        i += 4;
    }
    let mut result = vaddvq_f32(acc);
    while i < n {
        result += a[i] * b[i];
        i += 1;
    }
    result
}

/// General `(M, N)` tile kernel, same outer-product-accumulate shape as
/// `simd_x86::dense_ip_avx2_f32_tile`: each register holds up to 4 lanes
/// of the stored dimension and is FMA-accumulated against every query
/// column, so no horizontal reduction is needed until the final store.
#[cfg(target_arch = "aarch64")]
pub unsafe fn dense_ip_neon_f32_tile(
    m: &[f32],
    q: &[f32],
    dim: usize,
    m_count: usize,
    n_count: usize,
    out: &mut [f32],
) {
    const W: usize = 4;
    const MAX_VECS: usize = MAX_TILE.div_ceil(W);
    debug_assert!(m_count <= MAX_TILE && n_count <= MAX_TILE);
    let m_vecs = m_count.div_ceil(W);
    let mut acc = [[vdupq_n_f32(0.0); MAX_TILE]; MAX_VECS];
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let mvec = if len == W {
                vld1q_f32(m_row.as_ptr().add(base))
            } else {
                let mut buf = [0.0f32; W];
                buf[..len].copy_from_slice(&m_row[base..base + len]);
                vld1q_f32(buf.as_ptr())
            };
            for (j, &qv) in q_row.iter().enumerate() {
                let qb = vdupq_n_f32(qv);
                acc[mv][j] = vfmaq_f32(acc[mv][j], mvec, qb);
            }
        }
    }
    for j in 0..n_count {
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let dst = &mut out[j * m_count + base..j * m_count + base + len];
            if len == W {
                vst1q_f32(dst.as_mut_ptr(), acc[mv][j]);
            } else {
                let mut buf = [0.0f32; W];
                vst1q_f32(buf.as_mut_ptr(), acc[mv][j]);
                dst.copy_from_slice(&buf[..len]);
            }
        }
    }
}

#[cfg(all(test, target_arch = "aarch64"))]
mod tests {
    use super::*;
    use crate::scalar::compute_f32;

    #[test]
    fn matches_scalar_reference() {
        let a: Vec<f32> = (0..67).map(|x| (x as f32) * 0.21 - 4.0).collect();
        let b: Vec<f32> = (0..67).map(|x| (x as f32) * 0.9 + 1.0).collect();
        let simd = unsafe { inner_product_1x1_neon(&a, &b) };
        let mut scalar_out = [0.0f32; 1];
        compute_f32(&a, &b, a.len(), 1, 1, &mut scalar_out);
        let tol = (scalar_out[0].abs() * 1e-5).max(1e-4);
        assert!((simd - scalar_out[0]).abs() < tol);
    }

    #[test]
    fn tile_matches_scalar_reference() {
        let dim = 23;
        let m_count = 6;
        let n_count = 4;
        let m: Vec<f32> = (0..dim * m_count).map(|x| (x as f32) * 0.17 - 3.0).collect();
        let q: Vec<f32> = (0..dim * n_count).map(|x| (x as f32) * -0.09 + 1.5).collect();
        let mut got = vec![0.0f32; m_count * n_count];
        unsafe { dense_ip_neon_f32_tile(&m, &q, dim, m_count, n_count, &mut got) };
        let mut want = vec![0.0f32; m_count * n_count];
        compute_f32(&m, &q, dim, m_count, n_count, &mut want);
        for (g, w) in got.iter().zip(want.iter()) {
            let tol = (w.abs() * 1e-5).max(1e-4);
            assert!((g - w).abs() < tol);
        }
    }
}
