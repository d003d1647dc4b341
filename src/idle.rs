//! Static-press filtering and the optional idle diagnostic.
//!
//! A finger pressing straight down produces a valid contact but no lateral
//! intent; the filter suppresses those frames so the controller stays put.

use serde::Serialize;

use crate::detector::Cop;
use crate::frame::PressureFrame;

/// True when a detected contact is a pure static press.
///
/// Three escape conditions, checked in order:
/// 1. sliding or tangential already latched → not idle,
/// 2. COP moved further than `sliding_threshold` since the previous frame
///    (predictive slide, fires before the sliding flag does) → not idle,
/// 3. otherwise idle iff the mean gradient is below `gradient_threshold`.
pub fn is_static_press(
    frame: &PressureFrame,
    is_sliding: bool,
    is_tangential: bool,
    gradient_threshold: f32,
    previous_cop: Option<Cop>,
    current_cop: Option<Cop>,
    sliding_threshold: f32,
) -> bool {
    if frame.is_empty() {
        return false;
    }
    if is_sliding || is_tangential {
        return false;
    }
    if let (Some(prev), Some(cur)) = (previous_cop, current_cop) {
        if cur.distance(prev) > sliding_threshold {
            log::debug!(
                "predictive slide: displacement {:.3} > {:.3}",
                cur.distance(prev),
                sliding_threshold
            );
            return false;
        }
    }
    frame.mean_gradient() < gradient_threshold
}

/// Named per-frame factors that can veto the idle verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdleFactors {
    pub pressure_too_low: bool,
    pub area_too_small: bool,
    pub gradient_too_high: bool,
    pub is_sliding: bool,
    pub is_tangential: bool,
    pub cop_displacement_too_large: bool,
    pub no_pressure_data: bool,
}

/// Measured values behind the factors, kept for the diagnostic surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdleValues {
    pub max_pressure: f32,
    pub contact_area: usize,
    pub gradient_mean: f32,
    pub cop_displacement: f32,
}

/// One frame's idle breakdown: the verdict, every contributing factor,
/// and how far along the stability counter is.
#[derive(Debug, Clone, Serialize)]
pub struct IdleAnalysis {
    pub is_idle: bool,
    pub factors: IdleFactors,
    pub values: IdleValues,
    pub reasons: Vec<String>,
    pub consecutive_idle_frames: u32,
    pub stability_threshold: u32,
}

/// Thresholds the classifier reads each frame.
#[derive(Debug, Clone, Copy)]
pub struct IdleThresholds {
    pub pressure_threshold: f32,
    pub contact_area_threshold: usize,
    pub sliding_threshold: f32,
    pub gradient_threshold: f32,
}

/// Debounced idle classifier.
///
/// Recomputes every factor from scratch each frame; only the consecutive
/// frame counter persists. The stable verdict flips true only after
/// `stability_frames` qualifying frames in a row.
#[derive(Debug)]
pub struct IdleClassifier {
    stability_frames: u32,
    consecutive_idle: u32,
}

impl IdleClassifier {
    pub fn new(stability_frames: u32) -> Self {
        Self {
            stability_frames,
            consecutive_idle: 0,
        }
    }

    pub fn set_stability_frames(&mut self, frames: u32) {
        self.stability_frames = frames;
    }

    pub fn reset(&mut self) {
        self.consecutive_idle = 0;
    }

    pub fn analyze(
        &mut self,
        frame: &PressureFrame,
        th: &IdleThresholds,
        is_sliding: bool,
        is_tangential: bool,
        current_cop: Option<Cop>,
        previous_cop: Option<Cop>,
    ) -> IdleAnalysis {
        let mut factors = IdleFactors::default();
        let mut values = IdleValues::default();
        let mut reasons = Vec::new();

        if frame.is_empty() {
            factors.no_pressure_data = true;
            reasons.push("no pressure data".to_string());
        } else {
            let max_pressure = frame.max_pressure();
            let contact_area = frame.area_above(th.pressure_threshold);
            values.max_pressure = max_pressure;
            values.contact_area = contact_area;

            if max_pressure < th.pressure_threshold {
                factors.pressure_too_low = true;
                reasons.push(format!(
                    "pressure too low: {max_pressure:.4} < {:.4}",
                    th.pressure_threshold
                ));
            }
            if contact_area < th.contact_area_threshold {
                factors.area_too_small = true;
                reasons.push(format!(
                    "contact area too small: {contact_area} < {}",
                    th.contact_area_threshold
                ));
            }

            let grad_mean = frame.mean_gradient();
            values.gradient_mean = grad_mean;
            if grad_mean >= th.gradient_threshold {
                factors.gradient_too_high = true;
                reasons.push(format!(
                    "gradient too high: {grad_mean:.6} >= {:.6}",
                    th.gradient_threshold
                ));
            }
        }

        factors.is_sliding = is_sliding;
        if is_sliding {
            reasons.push("sliding detected".to_string());
        }
        factors.is_tangential = is_tangential;
        if is_tangential {
            reasons.push("tangential force detected".to_string());
        }

        if let (Some(prev), Some(cur)) = (previous_cop, current_cop) {
            let displacement = cur.distance(prev);
            values.cop_displacement = displacement;
            if displacement > th.sliding_threshold {
                factors.cop_displacement_too_large = true;
                reasons.push(format!(
                    "cop displacement too large: {displacement:.3} > {:.3}",
                    th.sliding_threshold
                ));
            }
        }

        let frame_is_idle = !factors.pressure_too_low
            && !factors.area_too_small
            && !factors.gradient_too_high
            && !factors.is_sliding
            && !factors.is_tangential
            && !factors.cop_displacement_too_large
            && !factors.no_pressure_data;

        if frame_is_idle {
            self.consecutive_idle += 1;
        } else {
            self.consecutive_idle = 0;
        }
        let stable_idle = self.consecutive_idle >= self.stability_frames;

        if stable_idle {
            reasons.push(format!(
                "idle stable for {} consecutive frames",
                self.consecutive_idle
            ));
        } else if frame_is_idle {
            reasons.push(format!(
                "frame qualifies but needs {} consecutive frames",
                self.stability_frames
            ));
        }

        IdleAnalysis {
            is_idle: stable_idle,
            factors,
            values,
            reasons,
            consecutive_idle_frames: self.consecutive_idle,
            stability_threshold: self.stability_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::gaussian_bump;
    use ndarray::Array2;

    fn th() -> IdleThresholds {
        IdleThresholds {
            pressure_threshold: 0.001,
            contact_area_threshold: 3,
            sliding_threshold: 0.08,
            gradient_threshold: 5e-4,
        }
    }

    fn flat_press() -> PressureFrame {
        // broad uniform plateau: plenty of pressure and area, near-zero gradient
        PressureFrame::new(Array2::from_elem((64, 64), 0.05))
    }

    #[test]
    fn never_idle_while_sliding_or_tangential() {
        let f = flat_press();
        assert!(!is_static_press(&f, true, false, 1.0, None, None, 0.08));
        assert!(!is_static_press(&f, false, true, 1.0, None, None, 0.08));
    }

    #[test]
    fn predictive_slide_escapes_idle() {
        let f = flat_press();
        let prev = Cop { x: 10.0, y: 10.0 };
        let cur = Cop { x: 10.5, y: 10.0 };
        assert!(!is_static_press(&f, false, false, 1.0, Some(prev), Some(cur), 0.08));
        // same displacement under the threshold keeps the gradient verdict
        assert!(is_static_press(&f, false, false, 1.0, Some(prev), Some(prev), 0.08));
    }

    #[test]
    fn sharp_bump_is_not_a_static_press() {
        let f = gaussian_bump(64, 64, 32.0, 32.0, 3.0, 0.8);
        assert!(!is_static_press(&f, false, false, 5e-4, None, None, 0.08));
    }

    #[test]
    fn stability_counter_debounces_verdict() {
        let mut cls = IdleClassifier::new(3);
        let f = flat_press();
        for expect_idle in [false, false, true, true, true] {
            let a = cls.analyze(&f, &th(), false, false, None, None);
            assert_eq!(a.is_idle, expect_idle, "at frame count {}", a.consecutive_idle_frames);
        }
    }

    #[test]
    fn counter_resets_on_disqualifying_frame() {
        let mut cls = IdleClassifier::new(3);
        let f = flat_press();
        cls.analyze(&f, &th(), false, false, None, None);
        cls.analyze(&f, &th(), false, false, None, None);
        // sliding frame breaks the run
        let a = cls.analyze(&f, &th(), true, false, None, None);
        assert!(!a.is_idle);
        assert_eq!(a.consecutive_idle_frames, 0);
        assert!(a.factors.is_sliding);
    }

    #[test]
    fn quiet_frame_reports_vetoing_factors() {
        let mut cls = IdleClassifier::new(1);
        let quiet = PressureFrame::zeros(8, 8);
        let a = cls.analyze(&quiet, &th(), false, false, None, None);
        assert!(!a.is_idle);
        assert!(a.factors.pressure_too_low);
        assert!(a.factors.area_too_small);
        assert!(!a.reasons.is_empty());
    }
}
