/// Guards the denominator when either vector is all zeros.
pub const EPSILON: f64 = 1e-8;

/// Cosine similarity: `dot(a, b) / (‖a‖·‖b‖ + EPSILON)`.
///
/// Callers must pass vectors of equal length; extra trailing components of the
/// longer slice would otherwise be ignored by the dot product.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b + EPSILON)
}

/// Rounds to 4 decimal places, half away from zero.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
