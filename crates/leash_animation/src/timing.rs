//! Timing specs and leash transform sampling

use crate::easing::Easing;
use leash_core::{Affine2D, Point};
use std::time::Duration;

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone {
    /// Linearly interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Point {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Point::new(self.x.lerp(&other.x, t), self.y.lerp(&other.y, t))
    }
}

/// Transform applied to a leash at one end of an animation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeashTransform {
    pub translation: Point,
    pub scale: Point,
    pub alpha: f32,
}

impl Default for LeashTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LeashTransform {
    pub const IDENTITY: LeashTransform = LeashTransform {
        translation: Point::ZERO,
        scale: Point { x: 1.0, y: 1.0 },
        alpha: 1.0,
    };

    pub fn with_translation(mut self, x: f32, y: f32) -> Self {
        self.translation = Point::new(x, y);
        self
    }

    pub fn with_scale(mut self, sx: f32, sy: f32) -> Self {
        self.scale = Point::new(sx, sy);
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Matrix for this transform, shifted by an optional fixed offset
    pub fn to_matrix(&self, offset: Option<Point>) -> Affine2D {
        let offset = offset.unwrap_or(Point::ZERO);
        Affine2D::translation(
            self.translation.x + offset.x,
            self.translation.y + offset.y,
        )
        .then(&Affine2D::scale(self.scale.x, self.scale.y))
    }
}

impl Interpolate for LeashTransform {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        LeashTransform {
            translation: self.translation.lerp(&other.translation, t),
            scale: self.scale.lerp(&other.scale, t),
            alpha: self.alpha.lerp(&other.alpha, t),
        }
    }
}

/// One transform sample produced by the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSample {
    pub matrix: Affine2D,
    pub alpha: f32,
}

/// Timing and target transform of a leash animation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationSpec {
    pub duration: Duration,
    pub easing: Easing,
    pub from: LeashTransform,
    pub to: LeashTransform,
}

impl AnimationSpec {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            easing: Easing::Linear,
            from: LeashTransform::IDENTITY,
            to: LeashTransform::IDENTITY,
        }
    }

    /// A fade between two alpha values
    pub fn fade(duration: Duration, from: f32, to: f32) -> Self {
        Self::new(duration)
            .from(LeashTransform::IDENTITY.with_alpha(from))
            .to(LeashTransform::IDENTITY.with_alpha(to))
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn from(mut self, from: LeashTransform) -> Self {
        self.from = from;
        self
    }

    pub fn to(mut self, to: LeashTransform) -> Self {
        self.to = to;
        self
    }

    /// Clamp the requested duration to `max`, then scale it
    ///
    /// A non-positive or non-finite scale yields a zero duration.
    pub fn effective_duration(&self, max: Duration, scale: f32) -> Duration {
        let clamped = self.duration.min(max);
        if !scale.is_finite() || scale <= 0.0 {
            return Duration::ZERO;
        }
        let nanos = (clamped.as_nanos() as f64 * scale as f64).round();
        Duration::from_nanos(nanos.min(u64::MAX as f64) as u64)
    }

    /// Sample the transform at linear progress `t` (0.0 to 1.0)
    pub fn sample(&self, t: f32, offset: Option<Point>) -> FrameSample {
        let eased = self.easing.apply(t);
        let transform = self.from.lerp(&self.to, eased);
        FrameSample {
            matrix: transform.to_matrix(offset),
            alpha: transform.alpha.clamp(0.0, 1.0),
        }
    }
}
