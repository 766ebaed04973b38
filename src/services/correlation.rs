use nalgebra::DVector;
use statrs::statistics::Statistics;

use crate::models::CorrelationMatrix;

/// Pearson's r between two equally long series.
///
/// Returns `None` when the coefficient is undefined: fewer than two
/// observations, mismatched lengths, or a zero-variance series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let x_mean = xs.iter().mean();
    let y_mean = ys.iter().mean();

    let dx = DVector::from_iterator(xs.len(), xs.iter().map(|x| x - x_mean));
    let dy = DVector::from_iterator(ys.len(), ys.iter().map(|y| y - y_mean));

    let denominator = (dx.norm_squared() * dy.norm_squared()).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    Some((dx.dot(&dy) / denominator).clamp(-1.0, 1.0))
}

/// Correlation matrix over `fields`.
///
/// Only records where every field extracts to a value take part. The
/// diagonal is 1 regardless of the data; each off-diagonal pair is computed
/// once and mirrored.
pub fn correlation_matrix<T, F>(
    records: &[T],
    fields: &[F],
    label: impl Fn(&F) -> String,
    extract: impl Fn(&T, &F) -> Option<f64>,
) -> CorrelationMatrix {
    let n = fields.len();

    let rows: Vec<Vec<f64>> = records
        .iter()
        .filter_map(|record| {
            fields
                .iter()
                .map(|field| extract(record, field).filter(|v| v.is_finite()))
                .collect::<Option<Vec<f64>>>()
        })
        .collect();

    let columns: Vec<Vec<f64>> = (0..n)
        .map(|j| rows.iter().map(|row| row[j]).collect())
        .collect();

    let mut cells = vec![vec![None; n]; n];
    for i in 0..n {
        cells[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let r = pearson(&columns[i], &columns[j]);
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    if rows.len() < 2 && n > 1 {
        tracing::debug!("Correlation over {} qualifying records is undefined", rows.len());
    }

    CorrelationMatrix {
        fields: fields.iter().map(label).collect(),
        cells,
        sample_size: rows.len(),
    }
}
