// Damped-spring smoothing of gauge values
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpringError {
    #[error("stiffness, mass and epsilon must be positive")]
    NonPositive,

    #[error("damping {damping} is below the critical value {critical:.4}")]
    Underdamped { damping: f64, critical: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub epsilon: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            stiffness: 0.025,
            damping: 0.75,
            mass: 1.0,
            epsilon: 1e-4,
        }
    }
}

impl SpringParams {
    /// Damping must reach the critical value `2*sqrt(stiffness*mass)` or the
    /// gauge needle keeps oscillating around its target.
    pub fn validate(&self) -> Result<(), SpringError> {
        if self.stiffness <= 0.0 || self.mass <= 0.0 || self.epsilon <= 0.0 {
            return Err(SpringError::NonPositive);
        }
        let critical = 2.0 * (self.stiffness * self.mass).sqrt();
        if self.damping < critical {
            return Err(SpringError::Underdamped {
                damping: self.damping,
                critical,
            });
        }
        Ok(())
    }
}

/// Per-channel spring state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SmoothedValue {
    pub target: f64,
    pub position: f64,
    pub velocity: f64,
}

impl SmoothedValue {
    pub fn at(position: f64) -> Self {
        Self {
            target: position,
            position,
            velocity: 0.0,
        }
    }

    pub fn is_settled(&self, epsilon: f64) -> bool {
        (self.target - self.position).abs() < epsilon && self.velocity.abs() < epsilon
    }

    /// Advance one frame. Returns true once settled, at which point the
    /// position is snapped exactly onto the target.
    pub fn step(&mut self, params: &SpringParams) -> bool {
        let spring = params.stiffness * (self.target - self.position);
        let acceleration = (spring - params.damping * self.velocity) / params.mass;
        self.velocity += acceleration;
        self.position += self.velocity;

        if self.is_settled(params.epsilon) {
            self.position = self.target;
            self.velocity = 0.0;
            return true;
        }
        false
    }
}
