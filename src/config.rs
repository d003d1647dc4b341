use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{collections::HashMap, fs, io::Write, path::PathBuf};

use crate::control::ControlParams;
use crate::physics::PhysicsParams;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub pressure_threshold: f32,
    pub contact_area_threshold: usize,
    pub sliding_threshold: f32,
    pub tangential_threshold: f32,
    pub gradient_threshold: f32,
    #[serde(default)]
    pub enable_idle_detection: bool,
    #[serde(default = "default_idle_stability_frames")]
    pub idle_stability_frames: u32,
}

fn default_idle_stability_frames() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct Control {
    pub joystick_threshold: f32,
    pub touchpad_threshold: f32,
    pub joystick_sensitivity: f32,
    pub joystick_max_speed: f32,
    pub joystick_smoothing: f32,
    pub touchpad_sensitivity: f32,
    pub touchpad_damping: f32,
    pub touchpad_max_range: f32,
}

impl Control {
    pub fn to_params(&self) -> ControlParams {
        ControlParams {
            joystick_threshold: self.joystick_threshold,
            touchpad_threshold: self.touchpad_threshold,
            joystick_sensitivity: self.joystick_sensitivity,
            joystick_max_speed: self.joystick_max_speed,
            joystick_smoothing: self.joystick_smoothing,
            touchpad_sensitivity: self.touchpad_sensitivity,
            touchpad_damping: self.touchpad_damping,
            touchpad_max_range: self.touchpad_max_range,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Physics {
    pub movement_factor: f32,
    pub box_size: f32,
    pub field_extent: f32,
    pub field_margin: f32,
}

impl Physics {
    pub fn to_params(&self) -> PhysicsParams {
        PhysicsParams {
            movement_factor: self.movement_factor,
            field_extent: self.field_extent,
            field_margin: self.field_margin,
        }
    }
}

/// Named sensor/core polling rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Low,
    Standard,
    High,
    Extreme,
}

impl PerformanceMode {
    pub fn sensor_fps(self) -> u32 {
        match self {
            PerformanceMode::Low => 15,
            PerformanceMode::Standard => 30,
            PerformanceMode::High => 60,
            PerformanceMode::Extreme => 120,
        }
    }

    pub fn interval_ms(self) -> u64 {
        u64::from(1000 / self.sensor_fps())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceMode::Low => "low",
            PerformanceMode::Standard => "standard",
            PerformanceMode::High => "high",
            PerformanceMode::Extreme => "extreme",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Daemon {
    #[serde(default = "default_performance_mode")]
    pub performance_mode: PerformanceMode,
}

fn default_performance_mode() -> PerformanceMode {
    PerformanceMode::Standard
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub detection: Detection,
    pub control: Control,
    pub physics: Physics,
    pub daemon: Daemon,
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("padctl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        parse_profile(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile_name": self.profile.meta.name,
            "profiles": self.list_profiles(),
            "performance_mode": self.profile.daemon.performance_mode.as_str(),
            "sensor_fps": self.profile.daemon.performance_mode.sensor_fps(),
        })
    }
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let d = &p.detection;
    if d.pressure_threshold <= 0.0 {
        return Err(anyhow!("detection.pressure_threshold must be positive"));
    }
    if d.contact_area_threshold == 0 {
        return Err(anyhow!("detection.contact_area_threshold must be at least 1"));
    }
    if d.sliding_threshold <= 0.0 || d.gradient_threshold <= 0.0 {
        return Err(anyhow!("detection thresholds must be positive"));
    }
    if d.tangential_threshold >= d.sliding_threshold {
        return Err(anyhow!(
            "detection.tangential_threshold must be below sliding_threshold"
        ));
    }
    if d.idle_stability_frames == 0 {
        return Err(anyhow!("detection.idle_stability_frames must be at least 1"));
    }

    let c = &p.control;
    if c.joystick_threshold >= c.touchpad_threshold {
        return Err(anyhow!(
            "control.joystick_threshold must be below touchpad_threshold"
        ));
    }
    if !(0.0..1.0).contains(&c.joystick_smoothing) {
        return Err(anyhow!("control.joystick_smoothing must be in [0,1)"));
    }
    if !(0.0..1.0).contains(&c.touchpad_damping) {
        return Err(anyhow!("control.touchpad_damping must be in [0,1)"));
    }

    let ph = &p.physics;
    if ph.movement_factor <= 0.0 || ph.movement_factor > 1.0 {
        return Err(anyhow!("physics.movement_factor must be in (0,1]"));
    }
    if ph.field_margin * 2.0 >= ph.field_extent {
        return Err(anyhow!("physics.field_margin leaves no playable area"));
    }
    if ph.box_size >= ph.field_extent {
        return Err(anyhow!("physics.box_size larger than the field"));
    }
    Ok(())
}

/// Flat override surface for the `set` op: known keys applied, unknown
/// keys ignored.
pub fn overrides_from_json(v: &serde_json::Value) -> HashMap<String, f64> {
    let mut out = HashMap::new();
    if let Some(table) = v.as_object() {
        for (k, val) in table {
            if let Some(n) = val.as_f64() {
                out.insert(k.clone(), n);
            } else if let Some(b) = val.as_bool() {
                out.insert(k.clone(), if b { 1.0 } else { 0.0 });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_profile_parses() {
        let p = parse_profile(default_profile_text()).unwrap();
        assert_eq!(p.detection.pressure_threshold, 0.001);
        assert_eq!(p.detection.contact_area_threshold, 3);
        assert_eq!(p.control.touchpad_threshold, 10.0);
        assert_eq!(p.daemon.performance_mode, PerformanceMode::Standard);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let txt = default_profile_text().replace("joystick_threshold = 0.05", "joystick_threshold = 99.0");
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn rejects_zero_area_threshold() {
        let txt = default_profile_text().replace(
            "contact_area_threshold = 3",
            "contact_area_threshold = 0",
        );
        assert!(parse_profile(&txt).is_err());
    }

    #[test]
    fn performance_mode_rates() {
        assert_eq!(PerformanceMode::Low.sensor_fps(), 15);
        assert_eq!(PerformanceMode::Standard.interval_ms(), 33);
        assert_eq!(PerformanceMode::High.sensor_fps(), 60);
        assert_eq!(PerformanceMode::Extreme.interval_ms(), 8);
    }

    #[test]
    fn overrides_pick_numeric_and_bool_values() {
        let v = serde_json::json!({
            "joystick_sensitivity": 2.5,
            "enable_idle_detection": true,
            "name": "not numeric",
        });
        let m = overrides_from_json(&v);
        assert_eq!(m.get("joystick_sensitivity"), Some(&2.5));
        assert_eq!(m.get("enable_idle_detection"), Some(&1.0));
        assert!(!m.contains_key("name"));
    }
}
