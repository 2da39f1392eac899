// alife-master: Bucket statistics for the metrics surface

use crate::buckets::Buckets;
use crate::metrics::MasterMetrics;

/// Push the per-step bucket statistics into the Prometheus gauges.
pub fn update_bucket_metrics(buckets: &Buckets, metrics: &MasterMetrics) {
    let (min_cells, max_cells) = min_max_bucket_cells(buckets);

    metrics.buckets_count.set(buckets.len() as f64);
    metrics.buckets_min_cell_count.set(min_cells);
    metrics.buckets_max_cell_count.set(max_cells);
    metrics
        .buckets_average_cell_count
        .set(average_cells_per_bucket(buckets));
    metrics
        .buckets_median_cell_count
        .set(median_cells_per_bucket(buckets));
}

fn average_cells_per_bucket(buckets: &Buckets) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    let total: usize = buckets.iter().map(|(_, cells)| cells.len()).sum();
    total as f64 / buckets.len() as f64
}

fn median_cells_per_bucket(buckets: &Buckets) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    let mut counts: Vec<usize> = buckets.iter().map(|(_, cells)| cells.len()).collect();
    counts.sort_unstable();

    let n = counts.len();
    if n % 2 != 0 {
        counts[(n - 1) / 2] as f64
    } else {
        // Integer midpoint, matching the exported gauge's whole-cell unit.
        ((counts[n / 2] + counts[n / 2 - 1]) / 2) as f64
    }
}

fn min_max_bucket_cells(buckets: &Buckets) -> (f64, f64) {
    let mut min_cells: Option<usize> = None;
    let mut max_cells: usize = 0;

    for (_, cells) in buckets.iter() {
        let count = cells.len();
        if count > max_cells {
            max_cells = count;
        }
        min_cells = Some(min_cells.map_or(count, |current| current.min(count)));
    }

    (min_cells.unwrap_or(0) as f64, max_cells as f64)
}
