use crate::ui::anim::{Easing, Tween};

/// Duration of dim, visibility and blur transitions.
pub const BACKGROUND_FADE_DURATION: f32 = 0.8;
/// How much the user dim is lifted during breaks when lightening is enabled.
pub const BREAK_LIGHTEN_AMOUNT: f32 = 0.3;

/// Values the dim rules depend on, read once per refresh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DimSnapshot {
    pub enable_user_dim: bool,
    pub dim_level: f32,
    pub lighten_during_breaks: bool,
    pub is_break_time: bool,
    pub show_storyboard: bool,
    pub storyboard_replaces_background: bool,
}

impl Default for DimSnapshot {
    fn default() -> Self {
        Self {
            enable_user_dim: false,
            dim_level: 0.0,
            lighten_during_breaks: false,
            is_break_time: false,
            show_storyboard: false,
            storyboard_replaces_background: false,
        }
    }
}

/// Decides whether dimmed content is shown at all.
pub type VisibilityPolicy = fn(&DimSnapshot) -> bool;

/// Content is hidden only while a storyboard is shown that replaces it.
pub fn storyboard_visibility(s: &DimSnapshot) -> bool {
    !(s.show_storyboard && s.storyboard_replaces_background)
}

/// Dim applied to content, after break lightening.
pub fn effective_dim(s: &DimSnapshot) -> f32 {
    if !s.enable_user_dim {
        return 0.0;
    }
    let lighten = if s.lighten_during_breaks && s.is_break_time {
        BREAK_LIGHTEN_AMOUNT
    } else {
        0.0
    };
    (s.dim_level - lighten).max(0.0)
}

/// Alpha and grey-level state of a dimmed container.
#[derive(Debug)]
pub struct UserDim {
    visibility: VisibilityPolicy,
    content_alpha: Tween<f32>,
    content_grey: Tween<f32>,
    snapshot: DimSnapshot,
}

impl UserDim {
    pub fn new(visibility: VisibilityPolicy) -> Self {
        Self {
            visibility,
            content_alpha: Tween::new(1.0),
            content_grey: Tween::new(1.0),
            snapshot: DimSnapshot::default(),
        }
    }

    /// Retargets alpha and colour for `snapshot`.
    pub fn update_visuals(&mut self, snapshot: DimSnapshot) {
        self.snapshot = snapshot;
        let alpha = if (self.visibility)(&snapshot) { 1.0 } else { 0.0 };
        let grey = 1.0 - effective_dim(&snapshot);
        if (self.content_alpha.target() - alpha).abs() > f32::EPSILON {
            self.content_alpha
                .to(alpha, BACKGROUND_FADE_DURATION, Easing::OutQuint);
        }
        if (self.content_grey.target() - grey).abs() > f32::EPSILON {
            self.content_grey
                .to(grey, BACKGROUND_FADE_DURATION, Easing::OutQuint);
        }
    }

    /// Snaps running transitions to their targets.
    pub fn finish_transforms(&mut self) {
        self.content_alpha.finish();
        self.content_grey.finish();
    }

    pub fn update(&mut self, dt: f32) {
        self.content_alpha.update(dt);
        self.content_grey.update(dt);
    }

    #[inline(always)]
    pub fn shows_content(&self) -> bool {
        (self.visibility)(&self.snapshot)
    }

    #[inline(always)]
    pub fn dim_level(&self) -> f32 {
        effective_dim(&self.snapshot)
    }

    #[inline(always)]
    pub fn alpha(&self) -> f32 {
        self.content_alpha.value()
    }

    /// Tint for the content frame: grey scaled by dim, alpha by visibility.
    pub fn tint(&self) -> [f32; 4] {
        let g = self.content_grey.value();
        [g, g, g, self.alpha()]
    }
}
