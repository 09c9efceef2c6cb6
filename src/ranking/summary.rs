/// Descriptive statistics of a set of item scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreSummary {
    pub count: usize,
    pub sum: i64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub p50: i64,
    pub p90: i64,
    pub p99: i64,
}

impl ScoreSummary {
    pub fn from_scores(scores: &[i64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }

        let mut sorted = scores.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: i64 = sorted.iter().sum();
        let mean = sum as f64 / count as f64;
        let variance = sorted
            .iter()
            .map(|score| (*score as f64 - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        Self {
            count,
            sum,
            mean,
            std_dev: variance.sqrt(),
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[i64], p: f64) -> i64 {
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
