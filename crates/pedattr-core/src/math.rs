//! Shared math utilities.

/// Logistic function `1 / (1 + e^-x)`.
///
/// Evaluated in the branch that never exponentiates a positive number, so
/// large-magnitude logits saturate instead of overflowing to NaN.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Apply [`sigmoid`] to every logit.
pub fn sigmoid_all(logits: &[f32]) -> Vec<f32> {
    logits.iter().copied().map(sigmoid).collect()
}
