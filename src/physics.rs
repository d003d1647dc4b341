//! Box position integration.

/// Exponential approach toward the target, clamped to the play field.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsParams {
    pub movement_factor: f32,
    pub field_extent: f32,
    pub field_margin: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            movement_factor: 0.15,
            field_extent: 64.0,
            field_margin: 5.0,
        }
    }
}

#[derive(Debug)]
pub struct BoxIntegrator {
    params: PhysicsParams,
    position: [f32; 2],
    home: [f32; 2],
}

impl BoxIntegrator {
    pub fn new(params: PhysicsParams) -> Self {
        let home = [params.field_extent / 2.0, params.field_extent / 2.0];
        Self {
            params,
            position: home,
            home,
        }
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    pub fn set_movement_factor(&mut self, factor: f32) {
        self.params.movement_factor = factor;
    }

    /// One fixed-rate tick toward `target`.
    pub fn step(&mut self, target: [f32; 2]) -> [f32; 2] {
        let f = self.params.movement_factor;
        self.position[0] += (target[0] - self.position[0]) * f;
        self.position[1] += (target[1] - self.position[1]) * f;

        let lo = self.params.field_margin;
        let hi = self.params.field_extent - self.params.field_margin;
        self.position[0] = self.position[0].clamp(lo, hi);
        self.position[1] = self.position[1].clamp(lo, hi);
        self.position
    }

    pub fn reset(&mut self) {
        self.position = self.home;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approaches_target_exponentially() {
        let mut b = BoxIntegrator::new(PhysicsParams::default());
        let p0 = b.position();
        let p1 = b.step([40.0, 32.0]);
        assert!((p1[0] - (p0[0] + (40.0 - p0[0]) * 0.15)).abs() < 1e-6);
        // repeated steps converge
        for _ in 0..200 {
            b.step([40.0, 32.0]);
        }
        assert!((b.position()[0] - 40.0).abs() < 1e-3);
    }

    #[test]
    fn position_clamped_to_field_margin() {
        let mut b = BoxIntegrator::new(PhysicsParams::default());
        for _ in 0..500 {
            b.step([1000.0, -1000.0]);
        }
        assert_eq!(b.position(), [59.0, 5.0]);
    }

    #[test]
    fn reset_returns_home() {
        let mut b = BoxIntegrator::new(PhysicsParams::default());
        b.step([50.0, 50.0]);
        b.reset();
        assert_eq!(b.position(), [32.0, 32.0]);
    }
}
