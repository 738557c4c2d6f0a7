const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders values as equal-width bins between their min and max.
pub fn sparkline(values: &[f64]) -> String {
    let finite = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<f64>>();
    if finite.is_empty() {
        return String::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let top = (GLYPHS.len() - 1) as f64;

    finite
        .iter()
        .map(|value| {
            let index = ((value - min) / span * top).floor() as usize;
            GLYPHS[index.min(GLYPHS.len() - 1)]
        })
        .collect()
}
