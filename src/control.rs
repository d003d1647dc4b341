//! Dual-mode control: COP displacement in, smoothed box target out.
//!
//! Small displacements drive a velocity-style joystick response; large ones
//! switch to a touchpad-style relative offset. Mode is chosen every frame
//! purely from the displacement magnitude.

use serde::Serialize;
use std::collections::HashMap;

use crate::detector::Cop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Idle,
    Joystick,
    Touchpad,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Idle => "idle",
            ControlMode::Joystick => "joystick",
            ControlMode::Touchpad => "touchpad",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControlParams {
    pub joystick_threshold: f32,
    pub touchpad_threshold: f32,
    pub joystick_sensitivity: f32,
    pub joystick_max_speed: f32,
    pub joystick_smoothing: f32,
    pub touchpad_sensitivity: f32,
    pub touchpad_damping: f32,
    pub touchpad_max_range: f32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            joystick_threshold: 0.05,
            touchpad_threshold: 10.0,
            joystick_sensitivity: 2.0,
            joystick_max_speed: 8.0,
            joystick_smoothing: 0.8,
            touchpad_sensitivity: 1.2,
            touchpad_damping: 0.3,
            touchpad_max_range: 20.0,
        }
    }
}

impl ControlParams {
    /// Applies any known keys present in `overrides`; unknown keys are
    /// ignored. The merge is idempotent.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, f64>) {
        for (key, &value) in overrides {
            let value = value as f32;
            match key.as_str() {
                "joystick_threshold" => self.joystick_threshold = value,
                "touchpad_threshold" => self.touchpad_threshold = value,
                "joystick_sensitivity" => self.joystick_sensitivity = value,
                "joystick_max_speed" => self.joystick_max_speed = value,
                "joystick_smoothing" => self.joystick_smoothing = value,
                "touchpad_sensitivity" => self.touchpad_sensitivity = value,
                "touchpad_damping" => self.touchpad_damping = value,
                "touchpad_max_range" => self.touchpad_max_range = value,
                _ => {}
            }
        }
    }
}

/// Floating-point slack at the threshold boundaries.
const MODE_EPSILON: f32 = 1e-10;

/// Snapshot of the controller internals, reported with each frame.
#[derive(Debug, Clone, Serialize)]
pub struct ControlInfo {
    pub mode: ControlMode,
    pub velocity: [f32; 2],
    pub displacement: [f32; 2],
}

#[derive(Debug)]
pub struct DualModeControl {
    params: ControlParams,
    mode: ControlMode,
    last_velocity: [f32; 2],
    accumulated_displacement: [f32; 2],
}

impl DualModeControl {
    pub fn new(params: ControlParams) -> Self {
        Self {
            params,
            mode: ControlMode::Idle,
            last_velocity: [0.0, 0.0],
            accumulated_displacement: [0.0, 0.0],
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    pub fn apply_overrides(&mut self, overrides: &HashMap<String, f64>) {
        self.params.apply_overrides(overrides);
    }

    pub fn info(&self) -> ControlInfo {
        ControlInfo {
            mode: self.mode,
            velocity: self.last_velocity,
            displacement: self.accumulated_displacement,
        }
    }

    /// Mode from the displacement magnitude: below `joystick_threshold` is
    /// the dead zone, between the thresholds is joystick, above is touchpad.
    fn mode_for_distance(&self, distance: f32) -> ControlMode {
        if distance < self.params.joystick_threshold - MODE_EPSILON {
            ControlMode::Idle
        } else if distance < self.params.touchpad_threshold - MODE_EPSILON {
            ControlMode::Joystick
        } else {
            ControlMode::Touchpad
        }
    }

    fn update_mode(&mut self, is_contact: bool, current: Option<Cop>, initial: Option<Cop>) {
        let old = self.mode;
        self.mode = if !is_contact {
            ControlMode::Idle
        } else {
            match (current, initial) {
                (Some(cur), Some(init)) => self.mode_for_distance(cur.distance(init)),
                _ => ControlMode::Idle,
            }
        };

        if old != self.mode {
            log::debug!("control mode: {} -> {}", old.as_str(), self.mode.as_str());
            // fresh start for the state the new mode owns
            match self.mode {
                ControlMode::Touchpad => self.accumulated_displacement = [0.0, 0.0],
                ControlMode::Joystick => self.last_velocity = [0.0, 0.0],
                ControlMode::Idle => {}
            }
        }
    }

    fn joystick_target(&mut self, cur: Cop, init: Cop, box_position: [f32; 2]) -> [f32; 2] {
        let dx = cur.x - init.x;
        let dy = cur.y - init.y;
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude < 1e-6 {
            self.last_velocity[0] *= 0.9;
            self.last_velocity[1] *= 0.9;
            return [
                box_position[0] + self.last_velocity[0],
                box_position[1] + self.last_velocity[1],
            ];
        }

        let p = &self.params;
        let span = p.touchpad_threshold - p.joystick_threshold;
        let ratio = ((magnitude - p.joystick_threshold) / span).clamp(0.0, 1.0);
        // sub-linear response keeps small displacements controllable
        let speed = ratio.powf(0.7) * p.joystick_max_speed * p.joystick_sensitivity;
        let target_vx = dx / magnitude * speed;
        let target_vy = dy / magnitude * speed;

        let s = p.joystick_smoothing;
        self.last_velocity[0] = s * self.last_velocity[0] + (1.0 - s) * target_vx;
        self.last_velocity[1] = s * self.last_velocity[1] + (1.0 - s) * target_vy;

        [
            box_position[0] + self.last_velocity[0],
            box_position[1] + self.last_velocity[1],
        ]
    }

    fn touchpad_target(&mut self, cur: Cop, init: Cop, box_position: [f32; 2]) -> [f32; 2] {
        let mut dx = cur.x - init.x;
        let mut dy = cur.y - init.y;
        let magnitude = (dx * dx + dy * dy).sqrt();
        let p = &self.params;
        if magnitude > p.touchpad_max_range {
            let scale = p.touchpad_max_range / magnitude;
            dx *= scale;
            dy *= scale;
        }
        let sx = dx * p.touchpad_sensitivity;
        let sy = dy * p.touchpad_sensitivity;

        let d = p.touchpad_damping;
        self.accumulated_displacement[0] = self.accumulated_displacement[0] * d + sx * (1.0 - d);
        self.accumulated_displacement[1] = self.accumulated_displacement[1] * d + sy * (1.0 - d);

        [
            box_position[0] + self.accumulated_displacement[0],
            box_position[1] + self.accumulated_displacement[1],
        ]
    }

    /// One control step: re-selects the mode, then produces the frame's
    /// target position for the box.
    pub fn calculate_target(
        &mut self,
        is_contact: bool,
        current: Option<Cop>,
        initial: Option<Cop>,
        box_position: [f32; 2],
    ) -> [f32; 2] {
        self.update_mode(is_contact, current, initial);

        match (self.mode, current, initial) {
            (ControlMode::Joystick, Some(cur), Some(init)) => {
                self.joystick_target(cur, init, box_position)
            }
            (ControlMode::Touchpad, Some(cur), Some(init)) => {
                self.touchpad_target(cur, init, box_position)
            }
            _ => {
                // coast to a stop instead of snapping
                self.last_velocity[0] *= 0.95;
                self.last_velocity[1] *= 0.95;
                self.accumulated_displacement[0] *= 0.95;
                self.accumulated_displacement[1] *= 0.95;
                box_position
            }
        }
    }

    /// Drops any accumulated offset so a finished touch cannot leak into
    /// the next one.
    pub fn reset_on_contact_end(&mut self) {
        self.accumulated_displacement = [0.0, 0.0];
    }

    pub fn reset(&mut self) {
        self.mode = ControlMode::Idle;
        self.last_velocity = [0.0, 0.0];
        self.accumulated_displacement = [0.0, 0.0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> DualModeControl {
        DualModeControl::new(ControlParams::default())
    }

    fn cop(x: f32, y: f32) -> Option<Cop> {
        Some(Cop { x, y })
    }

    #[test]
    fn mode_selection_is_monotonic_in_distance() {
        let c = control();
        for (distance, expected) in [
            (0.0, ControlMode::Idle),
            (0.049, ControlMode::Idle),
            (0.05, ControlMode::Joystick),
            (1.0, ControlMode::Joystick),
            (9.99, ControlMode::Joystick),
            (10.0, ControlMode::Touchpad),
            (50.0, ControlMode::Touchpad),
        ] {
            assert_eq!(c.mode_for_distance(distance), expected, "distance {distance}");
        }
    }

    #[test]
    fn no_contact_forces_idle() {
        let mut c = control();
        c.calculate_target(true, cop(5.0, 0.0), cop(0.0, 0.0), [32.0, 32.0]);
        assert_eq!(c.mode(), ControlMode::Joystick);
        c.calculate_target(false, cop(5.0, 0.0), cop(0.0, 0.0), [32.0, 32.0]);
        assert_eq!(c.mode(), ControlMode::Idle);
    }

    #[test]
    fn missing_cop_means_idle() {
        let mut c = control();
        let target = c.calculate_target(true, None, None, [32.0, 32.0]);
        assert_eq!(c.mode(), ControlMode::Idle);
        assert_eq!(target, [32.0, 32.0]);
    }

    #[test]
    fn joystick_moves_along_displacement_direction() {
        let mut c = control();
        // displacement purely +x, well inside the joystick band
        let target = c.calculate_target(true, cop(37.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        assert!(target[0] > 32.0);
        assert!((target[1] - 32.0).abs() < 1e-6);
    }

    #[test]
    fn joystick_velocity_is_smoothed() {
        let mut c = control();
        let first = c.calculate_target(true, cop(37.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        let v1 = first[0] - 32.0;
        let second = c.calculate_target(true, cop(37.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        let v2 = second[0] - 32.0;
        // velocity keeps ramping toward the target speed
        assert!(v2 > v1);
        let p = ControlParams::default();
        assert!(v2 <= p.joystick_max_speed * p.joystick_sensitivity);
    }

    #[test]
    fn joystick_speed_capped_at_max() {
        let mut c = control();
        // hold a displacement just under the touchpad threshold for many frames
        let mut speed = 0.0;
        for _ in 0..200 {
            let t = c.calculate_target(true, cop(41.9, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
            speed = t[0] - 32.0;
        }
        let p = ControlParams::default();
        assert!(speed <= p.joystick_max_speed * p.joystick_sensitivity + 1e-3);
    }

    #[test]
    fn touchpad_offset_clamped_to_max_range() {
        let mut c = control();
        // enormous displacement, far beyond max_range
        let mut target = [32.0, 32.0];
        for _ in 0..100 {
            target = c.calculate_target(true, cop(132.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        }
        assert_eq!(c.mode(), ControlMode::Touchpad);
        let p = ControlParams::default();
        let max_offset = p.touchpad_max_range * p.touchpad_sensitivity;
        assert!(target[0] - 32.0 <= max_offset + 1e-3);
    }

    #[test]
    fn contact_end_zeroes_accumulated_displacement() {
        let mut c = control();
        for _ in 0..10 {
            c.calculate_target(true, cop(52.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        }
        assert!(c.info().displacement[0] != 0.0);
        c.reset_on_contact_end();
        assert_eq!(c.info().displacement, [0.0, 0.0]);
    }

    #[test]
    fn idle_state_decays_instead_of_snapping() {
        let mut c = control();
        for _ in 0..5 {
            c.calculate_target(true, cop(37.0, 32.0), cop(32.0, 32.0), [32.0, 32.0]);
        }
        let v_before = c.info().velocity[0];
        assert!(v_before > 0.0);
        c.calculate_target(false, None, None, [32.0, 32.0]);
        let v_after = c.info().velocity[0];
        assert!(v_after < v_before);
        assert!(v_after > 0.0);
    }

    #[test]
    fn unknown_override_keys_are_ignored() {
        let mut c = control();
        let mut overrides = HashMap::new();
        overrides.insert("joystick_sensitivity".to_string(), 3.5);
        overrides.insert("definitely_not_a_param".to_string(), 9.9);
        c.apply_overrides(&overrides);
        assert_eq!(c.params().joystick_sensitivity, 3.5);
        assert_eq!(c.params().touchpad_damping, 0.3);
    }
}
