//! Contact detection, center-of-pressure, and slide tracking.

use serde::Serialize;

use crate::frame::PressureFrame;

/// Pressure-weighted centroid, in (x, y) = (column, row) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cop {
    pub x: f32,
    pub y: f32,
}

impl Cop {
    pub fn distance(self, other: Cop) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// True when the frame's peak clears `pressure_threshold` and the number of
/// cells above it reaches `area_threshold`.
pub fn detect_contact(frame: &PressureFrame, pressure_threshold: f32, area_threshold: usize) -> bool {
    if frame.is_empty() {
        return false;
    }
    if frame.max_pressure() < pressure_threshold {
        return false;
    }
    frame.area_above(pressure_threshold) >= area_threshold
}

/// Pressure-weighted centroid over cells above `pressure_threshold`.
///
/// `None` when no cell clears the threshold or the masked total is zero.
pub fn calculate_cop(frame: &PressureFrame, pressure_threshold: f32) -> Option<Cop> {
    if frame.is_empty() {
        return None;
    }
    let mut total = 0.0f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    for ((r, c), &p) in frame.data().indexed_iter() {
        if p > pressure_threshold {
            let p = f64::from(p);
            total += p;
            sx += c as f64 * p;
            sy += r as f64 * p;
        }
    }
    if total <= 0.0 {
        return None;
    }
    Some(Cop {
        x: (sx / total) as f32,
        y: (sy / total) as f32,
    })
}

/// Tracks COP displacement within one contact episode.
///
/// The first COP seen after a reset is latched as the episode's anchor;
/// subsequent updates measure Euclidean distance from it.
#[derive(Debug, Default)]
pub struct SlideTracker {
    initial_cop: Option<Cop>,
}

impl SlideTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_cop(&self) -> Option<Cop> {
        self.initial_cop
    }

    /// Returns `(is_sliding, movement_distance)` for this frame.
    pub fn update(&mut self, current_cop: Option<Cop>, sliding_threshold: f32) -> (bool, f32) {
        let Some(cop) = current_cop else {
            return (false, 0.0);
        };
        let Some(anchor) = self.initial_cop else {
            self.initial_cop = Some(cop);
            return (false, 0.0);
        };
        let distance = cop.distance(anchor);
        (distance > sliding_threshold, distance)
    }

    /// Clears the episode anchor. Called when contact ends.
    pub fn reset(&mut self) {
        self.initial_cop = None;
    }
}

/// Tangential band: contact held, not yet sliding, but the COP has moved
/// further than `tangential_threshold` from the anchor.
pub fn classify_tangential(
    is_contact: bool,
    is_sliding: bool,
    movement_distance: f32,
    tangential_threshold: f32,
) -> bool {
    is_contact && !is_sliding && movement_distance > tangential_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PressureFrame, gaussian_bump};
    use ndarray::Array2;

    fn single_cell(rows: usize, cols: usize, r: usize, c: usize, v: f32) -> PressureFrame {
        let mut data = Array2::zeros((rows, cols));
        data[[r, c]] = v;
        PressureFrame::new(data)
    }

    #[test]
    fn no_contact_below_pressure_threshold() {
        let f = single_cell(8, 8, 3, 3, 0.0005);
        assert!(!detect_contact(&f, 0.001, 1));
    }

    #[test]
    fn no_contact_below_area_threshold() {
        // one loud cell is not enough area
        let f = single_cell(8, 8, 3, 3, 10.0);
        assert!(!detect_contact(&f, 0.001, 3));
        assert!(detect_contact(&f, 0.001, 1));
    }

    #[test]
    fn contact_on_gaussian_bump() {
        let f = gaussian_bump(64, 64, 32.0, 32.0, 3.0, 0.05);
        assert!(detect_contact(&f, 0.001, 3));
    }

    #[test]
    fn cop_of_single_cell_is_col_row() {
        let f = single_cell(8, 8, 5, 2, 1.0);
        let cop = calculate_cop(&f, 0.001).unwrap();
        // x is the column index, y the row index
        assert_eq!(cop.x, 2.0);
        assert_eq!(cop.y, 5.0);
    }

    #[test]
    fn cop_transposes_with_the_frame() {
        let f = single_cell(8, 8, 2, 5, 1.0);
        let cop = calculate_cop(&f, 0.001).unwrap();
        assert_eq!(cop.x, 5.0);
        assert_eq!(cop.y, 2.0);
    }

    #[test]
    fn cop_invariant_under_uniform_scaling() {
        let f = gaussian_bump(32, 32, 10.0, 20.0, 2.5, 0.05);
        let scaled = PressureFrame::new(f.data() * 7.0);
        let a = calculate_cop(&f, 0.001).unwrap();
        let b = calculate_cop(&scaled, 0.007).unwrap();
        assert!((a.x - b.x).abs() < 1e-3);
        assert!((a.y - b.y).abs() < 1e-3);
    }

    #[test]
    fn cop_none_on_empty_or_quiet_frames() {
        assert!(calculate_cop(&PressureFrame::zeros(0, 0), 0.001).is_none());
        assert!(calculate_cop(&PressureFrame::zeros(8, 8), 0.001).is_none());
        let quiet = single_cell(8, 8, 1, 1, 0.0001);
        assert!(calculate_cop(&quiet, 0.001).is_none());
    }

    #[test]
    fn cop_of_centered_bump() {
        let f = gaussian_bump(64, 64, 32.0, 32.0, 3.0, 0.05);
        let cop = calculate_cop(&f, 0.001).unwrap();
        assert!((cop.x - 32.0).abs() < 0.01);
        assert!((cop.y - 32.0).abs() < 0.01);
    }

    #[test]
    fn slide_tracker_latches_then_measures() {
        let mut t = SlideTracker::new();
        let (sliding, d) = t.update(Some(Cop { x: 10.0, y: 10.0 }), 0.08);
        assert!(!sliding);
        assert_eq!(d, 0.0);

        let (sliding, d) = t.update(Some(Cop { x: 10.05, y: 10.0 }), 0.08);
        assert!(!sliding);
        assert!((d - 0.05).abs() < 1e-6);

        let (sliding, d) = t.update(Some(Cop { x: 13.0, y: 14.0 }), 0.08);
        assert!(sliding);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn slide_tracker_reset_relatches() {
        let mut t = SlideTracker::new();
        t.update(Some(Cop { x: 1.0, y: 1.0 }), 0.08);
        t.reset();
        assert!(t.initial_cop().is_none());
        let (sliding, d) = t.update(Some(Cop { x: 50.0, y: 50.0 }), 0.08);
        assert!(!sliding);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn tangential_band() {
        assert!(!classify_tangential(true, true, 5.0, 0.04));
        assert!(classify_tangential(true, false, 0.05, 0.04));
        assert!(!classify_tangential(true, false, 0.01, 0.04));
        assert!(!classify_tangential(false, false, 0.05, 0.04));
    }
}
