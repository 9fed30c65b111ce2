use glam::Vec2;

/// Easing curves used by background transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    OutQuint,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` to eased progress.
    #[inline(always)]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::OutQuint => 1.0 - (1.0 - t).powi(5),
        }
    }
}

pub trait Lerp: Copy {
    fn lerp(self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline(always)]
    fn lerp(self, to: Self, t: f32) -> Self {
        (to - self).mul_add(t, self)
    }
}

impl Lerp for Vec2 {
    #[inline(always)]
    fn lerp(self, to: Self, t: f32) -> Self {
        Vec2::lerp(self, to, t)
    }
}

/// A value animated toward a target over time.
///
/// Retargeting mid-flight starts the new transition from the value currently
/// on screen, so chained `to` calls never snap.
#[derive(Clone, Copy, Debug)]
pub struct Tween<T> {
    from: T,
    to: T,
    elapsed: f32,
    duration: f32,
    easing: Easing,
}

impl<T: Lerp> Tween<T> {
    pub const fn new(value: T) -> Self {
        Self {
            from: value,
            to: value,
            elapsed: 0.0,
            duration: 0.0,
            easing: Easing::Linear,
        }
    }

    /// Starts a transition to `target`. A non-positive duration applies it immediately.
    pub fn to(&mut self, target: T, duration: f32, easing: Easing) {
        self.from = self.value();
        self.to = target;
        self.elapsed = 0.0;
        self.duration = duration.max(0.0);
        self.easing = easing;
    }

    pub fn update(&mut self, dt: f32) {
        if self.is_active() {
            self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        }
    }

    /// Jumps to the end of the running transition.
    pub fn finish(&mut self) {
        self.elapsed = self.duration;
    }

    pub fn value(&self) -> T {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = self.easing.apply(self.elapsed / self.duration);
        self.from.lerp(self.to, t)
    }

    #[inline(always)]
    pub const fn target(&self) -> T {
        self.to
    }

    #[inline(always)]
    pub const fn duration(&self) -> f32 {
        self.duration
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.elapsed < self.duration
    }
}
