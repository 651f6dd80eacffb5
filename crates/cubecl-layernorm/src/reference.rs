//! Host implementation of the layer normalization, used to check the kernels.

/// Normalize every group of `reduction_elements` consecutive values of `input`.
///
/// Follows the same two passes as the kernel, accumulating in `f64`. A trailing partial group is
/// ignored, like the kernel would.
pub fn layernorm_reference(input: &[f32], reduction_elements: usize, epsilon: f32) -> Vec<f32> {
    if reduction_elements == 0 {
        return Vec::new();
    }

    let count = reduction_elements as f64;
    let mut output = Vec::with_capacity(input.len());

    for group in input.chunks_exact(reduction_elements) {
        let mean = group.iter().map(|x| *x as f64).sum::<f64>() / count;
        let mean_sq = group
            .iter()
            .map(|x| {
                let centered = *x as f64 - mean;
                centered * centered
            })
            .sum::<f64>()
            / count;
        let scale = 1.0 / (mean_sq + epsilon as f64).sqrt();

        output.extend(group.iter().map(|x| ((*x as f64 - mean) * scale) as f32));
    }

    output
}
