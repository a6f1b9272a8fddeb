use std::collections::HashMap;
use std::ops::Range;

use crate::config::{BinFunction, Normalization};

// =============================================================================
// Grouping
// =============================================================================

/// Row indices per group value, in order of first appearance.
/// Without labels every row belongs to a single unnamed group.
pub fn partition_rows(labels: Option<&[String]>, row_count: usize) -> Vec<(String, Vec<usize>)> {
    let Some(labels) = labels else {
        return vec![(String::new(), (0..row_count).collect())];
    };

    let mut order: Vec<(String, Vec<usize>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (row, label) in labels.iter().enumerate().take(row_count) {
        match index.get(label.as_str()) {
            Some(&slot) => order[slot].1.push(row),
            None => {
                index.insert(label.as_str(), order.len());
                order.push((label.clone(), vec![row]));
            }
        }
    }
    order
}

pub fn select(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&r| values.get(r).copied().unwrap_or(f64::NAN)).collect()
}

// =============================================================================
// Histogram
// =============================================================================

/// Sturges' rule: `ceil(log2 n) + 1`
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().ceil() as usize + 1
}

/// Uniform bin edges shared by every group
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    pub start: f64,
    pub width: f64,
    pub count: usize,
}

impl BinEdges {
    /// Edges covering every finite value. `requested == 0` picks the count automatically.
    pub fn fit(values: &[f64], requested: usize) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let count = if requested == 0 { sturges_bins(finite.len()) } else { requested };

        if max == min {
            return Some(Self {
                start: min - 0.5,
                width: 1.0 / count as f64,
                count,
            });
        }
        Some(Self {
            start: min,
            width: (max - min) / count as f64,
            count,
        })
    }

    /// Bin holding `value`; the last bin is closed on the right
    pub fn index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let idx = ((value - self.start) / self.width).floor();
        if idx < 0.0 {
            return None;
        }
        let idx = idx as usize;
        if idx < self.count {
            Some(idx)
        } else if value <= self.start + self.width * self.count as f64 + self.width * 1e-9 {
            Some(self.count - 1)
        } else {
            None
        }
    }

    pub fn left(&self, idx: usize) -> f64 {
        self.start + self.width * idx as f64
    }
}

/// Aggregate `values` into bins by `x`, then normalise the result
pub fn bin_values(
    edges: &BinEdges,
    x: &[f64],
    values: &[f64],
    function: BinFunction,
    normalization: Normalization,
) -> Vec<f64> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); edges.count];
    for (&xv, &v) in x.iter().zip(values) {
        if let Some(idx) = edges.index(xv) {
            if function == BinFunction::Count || v.is_finite() {
                buckets[idx].push(v);
            }
        }
    }

    let heights: Vec<f64> = buckets
        .iter()
        .map(|bucket| aggregate(bucket, function))
        .collect();
    normalize(heights, edges.width, normalization)
}

fn aggregate(bucket: &[f64], function: BinFunction) -> f64 {
    if bucket.is_empty() {
        return 0.0;
    }
    match function {
        BinFunction::Count => bucket.len() as f64,
        BinFunction::Sum => bucket.iter().sum(),
        BinFunction::Avg => bucket.iter().sum::<f64>() / bucket.len() as f64,
        BinFunction::Min => bucket.iter().copied().fold(f64::INFINITY, f64::min),
        BinFunction::Max => bucket.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn normalize(heights: Vec<f64>, width: f64, normalization: Normalization) -> Vec<f64> {
    let total: f64 = heights.iter().sum();
    let scale = match normalization {
        Normalization::None => return heights,
        Normalization::Percent => 100.0 / total,
        Normalization::Density => 1.0 / width,
        Normalization::ProbabilityDensity => 1.0 / (total * width),
    };
    if !scale.is_finite() {
        return vec![0.0; heights.len()];
    }
    heights.into_iter().map(|h| h * scale).collect()
}

// =============================================================================
// Trendlines
// =============================================================================

/// Ordinary least squares fit: `(slope, intercept)`
pub fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() <= f64::EPSILON * n * sum_xx {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Some((slope, intercept))
}

/// Locally weighted regression with tricube weights and bisquare robustness
/// iterations. Returns the fitted curve sorted by x.
pub fn lowess(points: &[(f64, f64)], frac: f64, iterations: usize) -> Vec<(f64, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let n = sorted.len();
    if n < 2 {
        return sorted;
    }

    let xs: Vec<f64> = sorted.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = sorted.iter().map(|p| p.1).collect();
    let window = ((frac * n as f64).ceil() as usize).clamp(2, n);

    let neighbourhoods = nearest_neighbourhoods(&xs, window);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for iteration in 0..=iterations {
        for (i, neighbourhood) in neighbourhoods.iter().enumerate() {
            fitted[i] = local_fit(&xs, &ys, &robustness, i, neighbourhood);
        }
        if iteration == iterations {
            break;
        }

        let residuals: Vec<f64> = ys.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        let scale = median(residuals.iter().map(|r| r.abs()).collect());
        if scale <= f64::EPSILON {
            break;
        }
        for (w, r) in robustness.iter_mut().zip(&residuals) {
            let u = r / (6.0 * scale);
            *w = if u.abs() < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 };
        }
    }

    xs.into_iter().zip(fitted).collect()
}

/// Points that can carry weight in the fit at one x, and the distance to the
/// farthest of its `window` nearest neighbours.
#[derive(Debug, Clone, PartialEq)]
struct Neighbourhood {
    span: Range<usize>,
    radius: f64,
}

/// Slide a `window`-wide span along sorted `xs`, one neighbourhood per point
fn nearest_neighbourhoods(xs: &[f64], window: usize) -> Vec<Neighbourhood> {
    let n = xs.len();
    let mut left = 0;
    let mut out = Vec::with_capacity(n);

    for &x0 in xs {
        while left + window < n && x0 - xs[left] > xs[left + window] - x0 {
            left += 1;
        }
        let right = left + window;
        let radius = (x0 - xs[left]).max(xs[right - 1] - x0);

        // With a zero radius every exact tie gets full weight, even beyond the window
        let (mut lo, mut hi) = (left, right);
        if radius == 0.0 {
            while lo > 0 && xs[lo - 1] == x0 {
                lo -= 1;
            }
            while hi < n && xs[hi] == x0 {
                hi += 1;
            }
        }
        out.push(Neighbourhood { span: lo..hi, radius });
    }
    out
}

/// Weighted linear fit evaluated at `xs[i]` over its neighbourhood
fn local_fit(xs: &[f64], ys: &[f64], robustness: &[f64], i: usize, neighbourhood: &Neighbourhood) -> f64 {
    let x0 = xs[i];
    let radius = neighbourhood.radius;

    let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for j in neighbourhood.span.clone() {
        let d = (xs[j] - x0).abs();
        let kernel = if radius > 0.0 {
            let u = d / radius;
            if u < 1.0 { (1.0 - u.powi(3)).powi(3) } else { 0.0 }
        } else if d == 0.0 {
            1.0
        } else {
            0.0
        };
        let w = kernel * robustness[j];

        sw += w;
        swx += w * xs[j];
        swy += w * ys[j];
        swxx += w * xs[j] * xs[j];
        swxy += w * xs[j] * ys[j];
    }

    if sw <= 0.0 {
        return ys[i];
    }
    let denominator = sw * swxx - swx * swx;
    if denominator.abs() <= 1e-12 * sw * sw {
        return swy / sw;
    }
    let slope = (sw * swxy - swx * swy) / denominator;
    let intercept = (swy - slope * swx) / sw;
    intercept + slope * x0
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
