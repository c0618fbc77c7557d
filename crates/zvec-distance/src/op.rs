/// Which of the two output conventions a dense distance call should
/// compute (SPEC_FULL.md §4.1 "Public contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `out[i + j*M] = Σ m_i · q_j`
    Ip,
    /// `out[i + j*M] = -Σ m_i · q_j`
    NegIp,
}

/// Flip the sign of every element of `out` using a bitwise XOR with the
/// sign bit, matching the "XOR with -0.0" trick described in §4.1 so that
/// signed zero and NaN payloads round-trip exactly as the scalar reference
/// would produce them.
pub fn negate_in_place(out: &mut [f32]) {
    for v in out.iter_mut() {
        *v = f32::from_bits(v.to_bits() ^ 0x8000_0000);
    }
}

pub fn apply_op(op: Op, out: &mut [f32]) {
    if op == Op::NegIp {
        negate_in_place(out);
    }
}
