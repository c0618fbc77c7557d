//! x86_64 SIMD kernels for the dense distance matrix engine (§4.1).
//!
//! The 1×1 tile (single stored vector, single query vector) is the
//! dominant case when this engine is driven from an ANN-index traversal
//! scoring one candidate against the active query, and keeps its own
//! dedicated accumulate-then-horizontal-add kernels below, following the
//! same shape as the teacher's `rust/distance/src/distance_avx.rs`.
//!
//! For `(M, N)` tiles with `M, N > 1` the micro-kernel invariant (§4.1) is
//! different: rather than reducing one pair of vectors to a scalar, each
//! SIMD register holds up to `W` lanes of the *stored* dimension and is
//! reused, FMA-accumulated, across every query column `j` — no horizontal
//! reduction is needed until the final store, since each lane already
//! corresponds to one output row. `dense_ip_{sse,avx2,avx512}_f32_tile`
//! implement that shape, bounded to the grid `(M, N) <= (32, 32)` spec.md
//! names explicitly; larger tiles fall back to the scalar reference.
#![allow(clippy::missing_safety_doc)]

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Max SIMD tile size this file accelerates, per spec.md's grid
/// `{1,2,4,8,16,32}`.
pub const MAX_TILE: usize = 32;

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
pub unsafe fn hsum256_ps(x: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(x, 1);
    let lo = _mm256_castps256_ps128(x);
    let sum128 = _mm_add_ps(hi, lo);
    let shuf = _mm_movehl_ps(sum128, sum128);
    let sums = _mm_add_ps(sum128, shuf);
    let shuf2 = _mm_shuffle_ps(sums, sums, 0x55);
    _mm_cvtss_f32(_mm_add_ss(sums, shuf2))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
pub unsafe fn hsum128_ps(x: __m128) -> f32 {
    let shuf = _mm_movehl_ps(x, x);
    let sums = _mm_add_ps(x, shuf);
    let shuf2 = _mm_shuffle_ps(sums, sums, 0x55);
    _mm_cvtss_f32(_mm_add_ss(sums, shuf2))
}

/// Inner product of two contiguous `f32` slices of equal length `dim`.
/// Caller (the dispatch table) guarantees AVX2+FMA is available on this
/// host before calling.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
pub unsafe fn inner_product_1x1_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let main = n - (n % 8);
    let mut acc = _mm256_setzero_ps();
    let mut i = 0;
    while i < main {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        acc = _mm256_fmadd_ps(va, vb, acc);
        i += 8;
    }
    let mut result = hsum256_ps(acc);
    while i < n {
        result += a[i] * b[i];
        i += 1;
    }
    result
}

/// SSE4.1 1×1 inner product, used when AVX2+FMA is unavailable but SSE4.1
/// is (§4.1 priority ladder).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
pub unsafe fn inner_product_1x1_sse(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let main = n - (n % 4);
    let mut acc = _mm_setzero_ps();
    let mut i = 0;
    while i < main {
        let va = _mm_loadu_ps(a.as_ptr().add(i));
        let vb = _mm_loadu_ps(b.as_ptr().add(i));
        acc = _mm_add_ps(acc, _mm_mul_ps(va, vb));
        i += 4;
    }
    let mut result = hsum128_ps(acc);
    while i < n {
        result += a[i] * b[i];
        i += 1;
    }
    result
}

/// AVX-512F 1×1 inner product, the top of the F32 priority ladder.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f")]
pub unsafe fn inner_product_1x1_avx512(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let main = n - (n % 16);
    let mut acc = _mm512_setzero_ps();
    let mut i = 0;
    while i < main {
        let va = _mm512_loadu_ps(a.as_ptr().add(i));
        let vb = _mm512_loadu_ps(b.as_ptr().add(i));
        acc = _mm512_fmadd_ps(va, vb, acc);
        i += 16;
    }
    let mut result = _mm512_reduce_add_ps(acc);
    while i < n {
        result += a[i] * b[i];
        i += 1;
    }
    result
}

/// Generic outer-product-accumulate tile kernel body, shared by the three
/// x86 register widths below via small copy-pasted instantiations (the
/// intrinsics differ per width, so this isn't expressed as one generic
/// function — see the `dense_ip_*_f32_tile` wrappers).
///
/// `m`/`q` are in the interleaved layout of §3.2; `m_count, n_count <=
/// MAX_TILE`. Output is column-major (`out[i + j*m_count]`), uninitialized
/// on entry (this function fully overwrites the prefix it uses).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
pub unsafe fn dense_ip_avx2_f32_tile(
    m: &[f32],
    q: &[f32],
    dim: usize,
    m_count: usize,
    n_count: usize,
    out: &mut [f32],
) {
    const W: usize = 8;
    const MAX_VECS: usize = MAX_TILE.div_ceil(W);
    debug_assert!(m_count <= MAX_TILE && n_count <= MAX_TILE);
    let m_vecs = m_count.div_ceil(W);
    let mut acc = [[_mm256_setzero_ps(); MAX_TILE]; MAX_VECS];
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let mvec = if len == W {
                _mm256_loadu_ps(m_row.as_ptr().add(base))
            } else {
                let mut buf = [0.0f32; W];
                buf[..len].copy_from_slice(&m_row[base..base + len]);
                _mm256_loadu_ps(buf.as_ptr())
            };
            for (j, &qv) in q_row.iter().enumerate() {
                let qb = _mm256_set1_ps(qv);
                acc[mv][j] = _mm256_fmadd_ps(mvec, qb, acc[mv][j]);
            }
        }
    }
    for j in 0..n_count {
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let dst = &mut out[j * m_count + base..j * m_count + base + len];
            if len == W {
                _mm256_storeu_ps(dst.as_mut_ptr(), acc[mv][j]);
            } else {
                let mut buf = [0.0f32; W];
                _mm256_storeu_ps(buf.as_mut_ptr(), acc[mv][j]);
                dst.copy_from_slice(&buf[..len]);
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
pub unsafe fn dense_ip_sse_f32_tile(
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
    let mut acc = [[_mm_setzero_ps(); MAX_TILE]; MAX_VECS];
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let mvec = if len == W {
                _mm_loadu_ps(m_row.as_ptr().add(base))
            } else {
                let mut buf = [0.0f32; W];
                buf[..len].copy_from_slice(&m_row[base..base + len]);
                _mm_loadu_ps(buf.as_ptr())
            };
            for (j, &qv) in q_row.iter().enumerate() {
                let qb = _mm_set1_ps(qv);
                acc[mv][j] = _mm_add_ps(acc[mv][j], _mm_mul_ps(mvec, qb));
            }
        }
    }
    for j in 0..n_count {
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let dst = &mut out[j * m_count + base..j * m_count + base + len];
            if len == W {
                _mm_storeu_ps(dst.as_mut_ptr(), acc[mv][j]);
            } else {
                let mut buf = [0.0f32; W];
                _mm_storeu_ps(buf.as_mut_ptr(), acc[mv][j]);
                dst.copy_from_slice(&buf[..len]);
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f")]
pub unsafe fn dense_ip_avx512_f32_tile(
    m: &[f32],
    q: &[f32],
    dim: usize,
    m_count: usize,
    n_count: usize,
    out: &mut [f32],
) {
    const W: usize = 16;
    const MAX_VECS: usize = MAX_TILE.div_ceil(W);
    debug_assert!(m_count <= MAX_TILE && n_count <= MAX_TILE);
    let m_vecs = m_count.div_ceil(W);
    let mut acc = [[_mm512_setzero_ps(); MAX_TILE]; MAX_VECS];
    for k in 0..dim {
        let m_row = &m[k * m_count..k * m_count + m_count];
        let q_row = &q[k * n_count..k * n_count + n_count];
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            // AVX-512 has native masked load/store, so the tail needs no
            // stack scratch buffer (unlike the SSE/AVX2 tiers above).
            let mask: u16 = if len == W { u16::MAX } else { (1u16 << len) - 1 };
            let mvec = _mm512_maskz_loadu_ps(mask, m_row.as_ptr().add(base));
            for (j, &qv) in q_row.iter().enumerate() {
                let qb = _mm512_set1_ps(qv);
                acc[mv][j] = _mm512_fmadd_ps(mvec, qb, acc[mv][j]);
            }
        }
    }
    for j in 0..n_count {
        for mv in 0..m_vecs {
            let base = mv * W;
            let len = W.min(m_count - base);
            let mask: u16 = if len == W { u16::MAX } else { (1u16 << len) - 1 };
            _mm512_mask_storeu_ps(out[j * m_count + base..].as_mut_ptr(), mask, acc[mv][j]);
        }
    }
}

/// Signed int8 dot product of two equal-length byte slices via the
/// `pabsb`/`psignb`/`pmaddubsw`/`pmaddwd` chain (§4.1 "I8 FMA semantics"):
/// `pmaddubsw` requires one unsigned operand, so `a` is taken as `|a|` and
/// `b`'s sign is folded into it first (`sign(b, a)` zeroes lanes where `a
/// == 0` and flips sign where `a < 0`, matching two's-complement
/// multiplication exactly).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn dot_i8_avx2(a: &[i8], b: &[i8]) -> i32 {
    let n = a.len();
    let main = n - (n % 32);
    let ones = _mm256_set1_epi16(1);
    let mut acc = _mm256_setzero_si256();
    let mut i = 0;
    while i < main {
        let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        let vb = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
        let abs_a = _mm256_abs_epi8(va);
        let signed_b = _mm256_sign_epi8(vb, va);
        let prod16 = _mm256_maddubs_epi16(abs_a, signed_b);
        let prod32 = _mm256_madd_epi16(prod16, ones);
        acc = _mm256_add_epi32(acc, prod32);
        i += 32;
    }
    let mut buf = [0i32; 8];
    _mm256_storeu_si256(buf.as_mut_ptr() as *mut __m256i, acc);
    let mut result: i32 = buf.iter().sum();
    while i < n {
        result += a[i] as i32 * b[i] as i32;
        i += 1;
    }
    result
}

/// Decode every byte of `v` into its low/high signed nibble (§3.1
/// two's-complement 4-bit encoding), returning `(lo, hi)` as parallel
/// lanes of signed bytes. Uses mask-then-shift rather than a `pshufb`
/// lookup table (§4.1 describes `pshufb` for the unpack step; this
/// reaches the same per-byte nibble isolation without a 16-entry shuffle
/// control vector): masking first keeps each byte's nibble from bleeding
/// into its neighbor when the subsequent 16-bit-lane shift crosses byte
/// boundaries.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn unpack_i4_nibbles(v: __m256i) -> (__m256i, __m256i) {
    let low_mask = _mm256_set1_epi8(0x0F);
    let high_mask = _mm256_set1_epi8(-0x10i8); // 0xF0
    let raw_lo = _mm256_and_si256(v, low_mask);
    let raw_hi = _mm256_srli_epi16(_mm256_and_si256(v, high_mask), 4);
    let seven = _mm256_set1_epi8(7);
    let sixteen = _mm256_set1_epi8(16);
    let sign_fix = |raw: __m256i| -> __m256i {
        let is_ge_eight = _mm256_cmpgt_epi8(raw, seven);
        _mm256_sub_epi8(raw, _mm256_and_si256(is_ge_eight, sixteen))
    };
    (sign_fix(raw_lo), sign_fix(raw_hi))
}

/// I4 packed-nibble dot product over `byte_count` interleaved bytes
/// (`dim = 2 * byte_count`), following §4.1 "I4 FMA semantics": decode
/// low/high nibbles of both operands, then run the same
/// `pabsb`/`psignb`/`pmaddubsw`/`pmaddwd` chain as [`dot_i8_avx2`]
/// independently on the low-nibble pair and the high-nibble pair and sum
/// the two reductions — equivalent to `INT4_MUL_TABLE[lo] +
/// INT4_MUL_TABLE[hi]` per byte pair (`zvec_types::score_i4_bytes`).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn dot_i4_avx2(a: &[u8], b: &[u8]) -> i32 {
    let n = a.len();
    let main = n - (n % 32);
    let ones = _mm256_set1_epi16(1);
    let mut acc = _mm256_setzero_si256();
    let mut i = 0;
    while i < main {
        let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        let vb = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
        let (a_lo, a_hi) = unpack_i4_nibbles(va);
        let (b_lo, b_hi) = unpack_i4_nibbles(vb);

        let abs_a_lo = _mm256_abs_epi8(a_lo);
        let signed_b_lo = _mm256_sign_epi8(b_lo, a_lo);
        let prod_lo = _mm256_madd_epi16(_mm256_maddubs_epi16(abs_a_lo, signed_b_lo), ones);

        let abs_a_hi = _mm256_abs_epi8(a_hi);
        let signed_b_hi = _mm256_sign_epi8(b_hi, a_hi);
        let prod_hi = _mm256_madd_epi16(_mm256_maddubs_epi16(abs_a_hi, signed_b_hi), ones);

        acc = _mm256_add_epi32(acc, _mm256_add_epi32(prod_lo, prod_hi));
        i += 32;
    }
    let mut buf = [0i32; 8];
    _mm256_storeu_si256(buf.as_mut_ptr() as *mut __m256i, acc);
    let mut result: i32 = buf.iter().sum();
    while i < n {
        result += zvec_types::score_i4_bytes(a[i], b[i]);
        i += 1;
    }
    result
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;
    use crate::scalar;

    fn has_avx2_fma() -> bool {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }

    #[test]
    fn matches_scalar_reference_1x1() {
        if !has_avx2_fma() {
            return;
        }
        let a: Vec<f32> = (0..133).map(|x| (x as f32) * 0.37 - 12.0).collect();
        let b: Vec<f32> = (0..133).map(|x| (x as f32) * -0.11 + 3.0).collect();
        let simd = unsafe { inner_product_1x1_avx2(&a, &b) };
        let mut scalar_out = [0.0f32; 1];
        scalar::compute_f32(&a, &b, a.len(), 1, 1, &mut scalar_out);
        let tol = (scalar_out[0].abs() * 1e-5).max(1e-4);
        assert!((simd - scalar_out[0]).abs() < tol, "simd={simd} scalar={}", scalar_out[0]);
    }

    #[test]
    fn sse_matches_scalar_reference() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        let a: Vec<f32> = (0..41).map(|x| (x as f32) * 0.19 - 5.0).collect();
        let b: Vec<f32> = (0..41).map(|x| (x as f32) * -0.07 + 2.0).collect();
        let simd = unsafe { inner_product_1x1_sse(&a, &b) };
        let mut scalar_out = [0.0f32; 1];
        scalar::compute_f32(&a, &b, a.len(), 1, 1, &mut scalar_out);
        let tol = (scalar_out[0].abs() * 1e-5).max(1e-4);
        assert!((simd - scalar_out[0]).abs() < tol);
    }

    #[test]
    fn avx2_tile_matches_scalar_reference() {
        if !has_avx2_fma() {
            return;
        }
        let dim = 19;
        let m_count = 5;
        let n_count = 3;
        let m: Vec<f32> = (0..dim * m_count).map(|x| (x as f32) * 0.3 - 4.0).collect();
        let q: Vec<f32> = (0..dim * n_count).map(|x| (x as f32) * -0.2 + 1.0).collect();
        let mut got = vec![0.0f32; m_count * n_count];
        unsafe { dense_ip_avx2_f32_tile(&m, &q, dim, m_count, n_count, &mut got) };
        let mut want = vec![0.0f32; m_count * n_count];
        scalar::compute_f32(&m, &q, dim, m_count, n_count, &mut want);
        for (g, w) in got.iter().zip(want.iter()) {
            let tol = (w.abs() * 1e-5).max(1e-4);
            assert!((g - w).abs() < tol, "got={g} want={w}");
        }
    }

    #[test]
    fn avx512_tile_matches_scalar_reference() {
        if !is_x86_feature_detected!("avx512f") {
            return;
        }
        let dim = 21;
        let m_count = 17;
        let n_count = 2;
        let m: Vec<f32> = (0..dim * m_count).map(|x| (x as f32) * 0.11 - 2.0).collect();
        let q: Vec<f32> = (0..dim * n_count).map(|x| (x as f32) * -0.05 + 0.5).collect();
        let mut got = vec![0.0f32; m_count * n_count];
        unsafe { dense_ip_avx512_f32_tile(&m, &q, dim, m_count, n_count, &mut got) };
        let mut want = vec![0.0f32; m_count * n_count];
        scalar::compute_f32(&m, &q, dim, m_count, n_count, &mut want);
        for (g, w) in got.iter().zip(want.iter()) {
            let tol = (w.abs() * 1e-5).max(1e-4);
            assert!((g - w).abs() < tol, "got={g} want={w}");
        }
    }

    #[test]
    fn i8_dot_matches_scalar_reference() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let a: Vec<i8> = (0..97).map(|x| ((x * 37) % 127) as i8 - 60).collect();
        let b: Vec<i8> = (0..97).map(|x| ((x * 13) % 113) as i8 - 50).collect();
        let got = unsafe { dot_i8_avx2(&a, &b) };
        let want: i32 = a.iter().zip(b.iter()).map(|(&x, &y)| x as i32 * y as i32).sum();
        assert_eq!(got, want);
    }

    #[test]
    fn i4_dot_matches_scalar_reference() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }
        let a: Vec<u8> = (0..80u32).map(|x| (x * 91) as u8).collect();
        let b: Vec<u8> = (0..80u32).map(|x| (x * 53) as u8).collect();
        let got = unsafe { dot_i4_avx2(&a, &b) };
        let want: i32 = a.iter().zip(b.iter()).map(|(&x, &y)| zvec_types::score_i4_bytes(x, y)).sum();
        assert_eq!(got, want);
    }
}
