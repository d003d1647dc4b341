//! The per-frame pipeline: detect → classify → control → integrate.
//!
//! State lives here (episode anchor, control internals, idle counter); every
//! frame flows through once, in arrival order. Degenerate frames produce a
//! no-contact report rather than an error.

use serde::Serialize;
use std::collections::HashMap;

use crate::config::Profile;
use crate::control::{ControlInfo, ControlMode, DualModeControl};
use crate::detector::{Cop, SlideTracker, calculate_cop, classify_tangential, detect_contact};
use crate::frame::PressureFrame;
use crate::idle::{IdleAnalysis, IdleClassifier, IdleThresholds, is_static_press};
use crate::physics::BoxIntegrator;

#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub pressure_threshold: f32,
    pub contact_area_threshold: usize,
    pub sliding_threshold: f32,
    pub tangential_threshold: f32,
    pub gradient_threshold: f32,
    pub enable_idle_detection: bool,
    pub idle_stability_frames: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            pressure_threshold: 0.001,
            contact_area_threshold: 3,
            sliding_threshold: 0.08,
            tangential_threshold: 0.04,
            gradient_threshold: 5e-4,
            enable_idle_detection: false,
            idle_stability_frames: 3,
        }
    }
}

impl DetectionParams {
    fn apply_overrides(&mut self, overrides: &HashMap<String, f64>) {
        for (key, &value) in overrides {
            match key.as_str() {
                "pressure_threshold" => self.pressure_threshold = value as f32,
                "contact_area_threshold" => self.contact_area_threshold = value as usize,
                "sliding_threshold" => self.sliding_threshold = value as f32,
                "tangential_threshold" => self.tangential_threshold = value as f32,
                "gradient_threshold" => self.gradient_threshold = value as f32,
                "enable_idle_detection" => self.enable_idle_detection = value != 0.0,
                "idle_stability_frames" => self.idle_stability_frames = value as u32,
                _ => {}
            }
        }
    }

    fn idle_thresholds(&self) -> IdleThresholds {
        IdleThresholds {
            pressure_threshold: self.pressure_threshold,
            contact_area_threshold: self.contact_area_threshold,
            sliding_threshold: self.sliding_threshold,
            gradient_threshold: self.gradient_threshold,
        }
    }
}

/// Everything the renderer (or the `state` op) needs from one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub is_contact: bool,
    pub is_sliding: bool,
    pub is_tangential: bool,
    pub movement_distance: f32,
    pub current_cop: Option<Cop>,
    pub initial_cop: Option<Cop>,
    pub control_mode: ControlMode,
    pub control: ControlInfo,
    pub box_position: [f32; 2],
    pub box_target_position: [f32; 2],
    pub frame_count: u64,
    pub idle_analysis: Option<IdleAnalysis>,
}

pub struct Engine {
    detection: DetectionParams,
    box_size: f32,
    tracker: SlideTracker,
    idle: IdleClassifier,
    control: DualModeControl,
    integrator: BoxIntegrator,
    target: [f32; 2],
    previous_cop: Option<Cop>,
    was_contact: bool,
    frame_count: u64,
}

impl Engine {
    pub fn new(
        detection: DetectionParams,
        control: DualModeControl,
        integrator: BoxIntegrator,
        box_size: f32,
    ) -> Self {
        let target = integrator.position();
        Self {
            idle: IdleClassifier::new(detection.idle_stability_frames),
            detection,
            box_size,
            tracker: SlideTracker::new(),
            control,
            integrator,
            target,
            previous_cop: None,
            was_contact: false,
            frame_count: 0,
        }
    }

    pub fn from_profile(profile: &Profile) -> Self {
        let d = &profile.detection;
        let detection = DetectionParams {
            pressure_threshold: d.pressure_threshold,
            contact_area_threshold: d.contact_area_threshold,
            sliding_threshold: d.sliding_threshold,
            tangential_threshold: d.tangential_threshold,
            gradient_threshold: d.gradient_threshold,
            enable_idle_detection: d.enable_idle_detection,
            idle_stability_frames: d.idle_stability_frames,
        };
        Self::new(
            detection,
            DualModeControl::new(profile.control.to_params()),
            BoxIntegrator::new(profile.physics.to_params()),
            profile.physics.box_size,
        )
    }

    pub fn detection(&self) -> &DetectionParams {
        &self.detection
    }

    pub fn box_position(&self) -> [f32; 2] {
        self.integrator.position()
    }

    /// Processes one frame and returns its report.
    pub fn process_frame(&mut self, frame: &PressureFrame) -> FrameReport {
        let d = self.detection;

        let mut is_contact = detect_contact(frame, d.pressure_threshold, d.contact_area_threshold);
        let current_cop = calculate_cop(frame, d.pressure_threshold);

        let (is_sliding, movement_distance) = if is_contact {
            self.tracker.update(current_cop, d.sliding_threshold)
        } else {
            (false, 0.0)
        };
        let is_tangential =
            classify_tangential(is_contact, is_sliding, movement_distance, d.tangential_threshold);

        // a pure static press carries no control intent
        if is_contact
            && is_static_press(
                frame,
                is_sliding,
                is_tangential,
                d.gradient_threshold,
                self.previous_cop,
                current_cop,
                d.sliding_threshold,
            )
        {
            is_contact = false;
        }

        let idle_analysis = if d.enable_idle_detection {
            Some(self.idle.analyze(
                frame,
                &d.idle_thresholds(),
                is_sliding,
                is_tangential,
                current_cop,
                self.previous_cop,
            ))
        } else {
            None
        };

        let box_position = self.integrator.position();
        let mut target = self.control.calculate_target(
            is_contact,
            current_cop,
            self.tracker.initial_cop(),
            box_position,
        );

        // keep the whole box inside the field
        let half = self.box_size / 2.0;
        let extent = self.integrator.params().field_extent;
        target[0] = target[0].clamp(half, extent - half);
        target[1] = target[1].clamp(half, extent - half);
        self.target = target;

        if !is_contact {
            if self.was_contact {
                self.control.reset_on_contact_end();
            }
            self.tracker.reset();
        }
        self.was_contact = is_contact;
        self.previous_cop = current_cop;
        self.frame_count += 1;

        FrameReport {
            is_contact,
            is_sliding,
            is_tangential,
            movement_distance,
            current_cop,
            initial_cop: self.tracker.initial_cop(),
            control_mode: self.control.mode(),
            control: self.control.info(),
            box_position,
            box_target_position: self.target,
            frame_count: self.frame_count,
            idle_analysis,
        }
    }

    /// One physics tick, independent of the sensor frame rate.
    pub fn step_physics(&mut self) -> [f32; 2] {
        self.integrator.step(self.target)
    }

    /// Idempotent parameter merge over the whole pipeline: known keys are
    /// applied, unknown keys ignored.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, f64>) {
        self.detection.apply_overrides(overrides);
        self.idle.set_stability_frames(self.detection.idle_stability_frames);
        self.control.apply_overrides(overrides);
        if let Some(&factor) = overrides.get("movement_factor") {
            self.integrator.set_movement_factor(factor as f32);
        }
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.idle.reset();
        self.control.reset();
        self.integrator.reset();
        self.target = self.integrator.position();
        self.previous_cop = None;
        self.was_contact = false;
        self.frame_count = 0;
    }
}
