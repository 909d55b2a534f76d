//! Gate time to noise-floor mapping.

/// Measured gate time in seconds for each noise-floor index 0..=7.
pub const GATE_TIMES: [f64; 8] = [2.4, 1.21, 0.48, 0.25, 0.163, 0.060, 0.043, 0.025];

pub const GATE_MAX: f64 = GATE_TIMES[0];
pub const GATE_MIN: f64 = GATE_TIMES[7];

/// Noise-floor index whose gate time is closest to `gate`.
///
/// Ties resolve to the lower index.
pub fn noise_floor_for_gate(gate: f64) -> i32 {
    let mut best = 0usize;
    for (i, g) in GATE_TIMES.iter().enumerate() {
        if (g - gate).abs() < (GATE_TIMES[best] - gate).abs() {
            best = i;
        }
    }
    best as i32
}

/// Warning text for a gate time outside the table, if any.
pub fn gate_out_of_range(gate: f64) -> Option<String> {
    if gate > GATE_MAX {
        Some(format!(
            "gate time cannot be more than {GATE_MAX}s! Using gate = {GATE_MAX}s..."
        ))
    } else if gate < GATE_MIN {
        Some(format!(
            "gate time cannot be less than {GATE_MIN}s! Using gate = {GATE_MIN}s..."
        ))
    } else {
        None
    }
}
