//! Runtime CPU-feature probing and the dispatch tables it populates
//! (SPEC_FULL.md §4.1 "Selection algorithm", §5 "Dispatch tables").
//!
//! Tables are built once behind a [`std::sync::OnceLock`] and are read-only
//! and lock-free thereafter, per §5: "Populated once at process start;
//! thereafter read-only and concurrent-safe without locks."

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdTier {
    Scalar,
    Sse,
    Avx2,
    Avx512,
    Neon,
}

impl SimdTier {
    /// F32 priority ladder (§4.1): AVX-512F > AVX2+FMA > SSE4.1 > scalar on
    /// x86_64; NEON is the sole accelerated tier on aarch64.
    fn probe_f32() -> SimdTier {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx512f") {
                return SimdTier::Avx512;
            }
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return SimdTier::Avx2;
            }
            if is_x86_feature_detected!("sse4.1") {
                return SimdTier::Sse;
            }
            return SimdTier::Scalar;
        }
        #[cfg(target_arch = "aarch64")]
        {
            return SimdTier::Neon;
        }
        #[allow(unreachable_code)]
        SimdTier::Scalar
    }

    /// I8 priority ladder (§4.1): AVX2 (`pmaddubsw`/`pmaddwd`) > scalar.
    /// No SSE/NEON I8 kernel is implemented in this workspace (see
    /// DESIGN.md) — the ladder stops one step short of spec.md's full
    /// "SSE4.1 (SSSE3 for sign)" / NEON entries rather than claim a tier
    /// with no kernel behind it.
    fn probe_i8() -> SimdTier {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                return SimdTier::Avx2;
            }
            return SimdTier::Scalar;
        }
        #[allow(unreachable_code)]
        SimdTier::Scalar
    }

    /// I4 priority ladder (§4.1): AVX2 (nibble-unpack + `pmaddubsw`/
    /// `pmaddwd`) > scalar, same scope caveat as [`Self::probe_i8`].
    fn probe_i4() -> SimdTier {
        Self::probe_i8()
    }
}

/// Which tier was selected for each accelerated element type, on this host.
/// Populated exactly once by [`dispatch_table`].
///
/// F16 has no entry of its own: this workspace always upcasts F16 to F32
/// (spec.md §4.1 F16 semantics, "otherwise upcast halves to floats...and
/// accumulate in 32-bit") and then dispatches on `f32_tier`, so the F32
/// tier selected here is also the F16 tier (DESIGN.md Open Question).
#[derive(Debug, Clone, Copy)]
pub struct DispatchTable {
    pub f32_tier: SimdTier,
    pub i8_tier: SimdTier,
    pub i4_tier: SimdTier,
}

static TABLE: OnceLock<DispatchTable> = OnceLock::new();

/// Returns the process-wide dispatch table, probing host CPU features on
/// first call only. Never re-probes (§9 "Global dispatch state").
pub fn dispatch_table() -> &'static DispatchTable {
    TABLE.get_or_init(|| {
        let table = DispatchTable {
            f32_tier: SimdTier::probe_f32(),
            i8_tier: SimdTier::probe_i8(),
            i4_tier: SimdTier::probe_i4(),
        };
        tracing::debug!(
            f32_tier = ?table.f32_tier,
            i8_tier = ?table.i8_tier,
            i4_tier = ?table.i4_tier,
            "zvec-distance dispatch table initialized"
        );
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_stable_across_calls() {
        let a = dispatch_table().f32_tier;
        let b = dispatch_table().f32_tier;
        assert_eq!(a, b);
    }

    #[test]
    fn i4_and_i8_tiers_agree() {
        // Both ladders share the same AVX2-or-scalar shape (§4.1).
        assert_eq!(dispatch_table().i8_tier, dispatch_table().i4_tier);
    }
}
