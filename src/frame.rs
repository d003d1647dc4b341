//! Pressure frames and per-frame field statistics.

use ndarray::Array2;

/// One sample from the pressure pad: a 2-D field of non-negative readings.
///
/// Nominally 64×64, but the shape is a property of whatever driver produced
/// the frame. Row index = y, column index = x.
#[derive(Debug, Clone)]
pub struct PressureFrame {
    data: Array2<f32>,
}

impl PressureFrame {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn max_pressure(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, &v| m.max(v))
    }

    /// Number of cells strictly above `threshold`.
    pub fn area_above(&self, threshold: f32) -> usize {
        self.data.iter().filter(|&&v| v > threshold).count()
    }

    /// Mean gradient magnitude over the whole field.
    ///
    /// Finite differences per axis (central in the interior, one-sided at
    /// the edges), combined per cell via the Euclidean norm, then averaged.
    /// Returns 0.0 for empty or degenerate (single row/column) fields.
    pub fn mean_gradient(&self) -> f32 {
        let (rows, cols) = (self.rows(), self.cols());
        if rows == 0 || cols == 0 {
            return 0.0;
        }

        let d = &self.data;
        let mut acc = 0.0f64;
        for r in 0..rows {
            for c in 0..cols {
                let gy = axis_diff(|i| d[[i, c]], r, rows);
                let gx = axis_diff(|i| d[[r, i]], c, cols);
                acc += f64::from(gx * gx + gy * gy).sqrt();
            }
        }
        (acc / (rows * cols) as f64) as f32
    }
}

fn axis_diff(get: impl Fn(usize) -> f32, i: usize, len: usize) -> f32 {
    if len < 2 {
        0.0
    } else if i == 0 {
        get(1) - get(0)
    } else if i == len - 1 {
        get(len - 1) - get(len - 2)
    } else {
        (get(i + 1) - get(i - 1)) / 2.0
    }
}

/// Synthetic Gaussian bump, used by the simulated driver and tests.
pub fn gaussian_bump(rows: usize, cols: usize, cy: f32, cx: f32, sigma: f32, peak: f32) -> PressureFrame {
    let mut data = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let dy = r as f32 - cy;
            let dx = c as f32 - cx;
            data[[r, c]] = peak * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
    }
    PressureFrame::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_stats() {
        let f = PressureFrame::zeros(0, 0);
        assert!(f.is_empty());
        assert_eq!(f.max_pressure(), 0.0);
        assert_eq!(f.area_above(0.0), 0);
        assert_eq!(f.mean_gradient(), 0.0);
    }

    #[test]
    fn max_and_area() {
        let mut f = PressureFrame::zeros(4, 4);
        f.data[[1, 2]] = 0.5;
        f.data[[2, 2]] = 0.2;
        assert_eq!(f.max_pressure(), 0.5);
        assert_eq!(f.area_above(0.1), 2);
        assert_eq!(f.area_above(0.3), 1);
    }

    #[test]
    fn flat_field_has_zero_gradient() {
        let f = PressureFrame::new(Array2::from_elem((8, 8), 0.3));
        assert!(f.mean_gradient() < 1e-9);
    }

    #[test]
    fn ramp_gradient_matches_slope() {
        // value = column index → gx = 1 everywhere, gy = 0
        let data = Array2::from_shape_fn((6, 6), |(_, c)| c as f32);
        let f = PressureFrame::new(data);
        assert!((f.mean_gradient() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gaussian_bump_peaks_at_center() {
        let f = gaussian_bump(64, 64, 32.0, 32.0, 3.0, 0.05);
        assert!((f.data()[[32, 32]] - 0.05).abs() < 1e-7);
        assert!(f.data()[[0, 0]] < 1e-6);
    }
}
