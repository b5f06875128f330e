/// Mean absolute amplitude of a frame of 16-bit samples.
///
/// Samples are widened before taking the absolute value, so `i16::MIN`
/// contributes 32768. An empty frame measures 0.
pub fn measure(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64).abs()).sum();
    sum / samples.len() as f64
}
