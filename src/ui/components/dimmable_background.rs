use crate::config::BackgroundSettings;
use crate::core::bindable::{Bindable, Subscription};
use crate::ui::actors::Actor;
use crate::ui::anim::Easing;
use crate::ui::components::beatmap_background::BeatmapBackground;
use crate::ui::components::user_dim::{
    BACKGROUND_FADE_DURATION, DimSnapshot, UserDim, VisibilityPolicy, storyboard_visibility,
};
use glam::Vec2;
use log::{debug, trace, warn};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Scale from the gameplay blur setting to blur sigma.
pub const GAMEPLAY_BLUR_FACTOR: f32 = 25.0;
/// Scale from the UI blur setting to blur sigma.
pub const UI_BLUR_FACTOR: f32 = 25.0;

const BACKGROUND_Z: i16 = -100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundError {
    /// A caller bypassed the dedicated setter.
    InvalidOperation(&'static str),
}

impl core::fmt::Display for BackgroundError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for BackgroundError {}

/// Inputs of the blur formula, read once per refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlurInputs {
    pub blur_amount: f32,
    pub enable_user_dim: bool,
    pub blur_level: f32,
    pub ui_blur_enabled: bool,
    pub ui_blur_level: f32,
}

pub type BlurPolicy = fn(&BlurInputs) -> Vec2;

/// One combined blur intensity for the background.
///
/// Gameplay dim takes precedence over UI blur when both are enabled.
pub fn blur_target(b: &BlurInputs) -> Vec2 {
    let sigma = if b.enable_user_dim {
        b.blur_amount + b.blur_level * GAMEPLAY_BLUR_FACTOR
    } else if b.ui_blur_enabled {
        b.blur_amount * b.ui_blur_level * UI_BLUR_FACTOR
    } else {
        b.blur_amount
    };
    Vec2::splat(sigma)
}

/// Every observable input of the compositor. Clones share cells.
#[derive(Clone, Debug)]
struct Inputs {
    blur_amount: Bindable<f32>,
    enable_user_dim: Bindable<bool>,
    ui_blur_enabled: Bindable<bool>,
    is_break_time: Bindable<bool>,
    storyboard_replaces_background: Bindable<bool>,
    settings: BackgroundSettings,
}

impl Inputs {
    fn blur(&self) -> BlurInputs {
        BlurInputs {
            blur_amount: self.blur_amount.get(),
            enable_user_dim: self.enable_user_dim.get(),
            blur_level: self.settings.blur_level.get(),
            ui_blur_enabled: self.ui_blur_enabled.get(),
            ui_blur_level: self.settings.ui_blur_level.get(),
        }
    }

    fn dim(&self) -> DimSnapshot {
        DimSnapshot {
            enable_user_dim: self.enable_user_dim.get(),
            dim_level: self.settings.dim_level.get(),
            lighten_during_breaks: self.settings.lighten_during_breaks.get(),
            is_break_time: self.is_break_time.get(),
            show_storyboard: self.settings.show_storyboard.get(),
            storyboard_replaces_background: self.storyboard_replaces_background.get(),
        }
    }
}

#[derive(Debug)]
struct Visuals {
    dim: UserDim,
    blur_policy: BlurPolicy,
    background: Option<BeatmapBackground>,
    retiring: SmallVec<[BeatmapBackground; 2]>,
}

impl Visuals {
    fn refresh(&mut self, inputs: &Inputs) {
        self.dim.update_visuals(inputs.dim());
        let target = (self.blur_policy)(&inputs.blur());
        if let Some(bg) = self.background.as_mut()
            && bg.blur_target() != target
        {
            trace!("Background blur -> {}", target.x);
            bg.blur_to(target, BACKGROUND_FADE_DURATION, Easing::OutQuint);
        }
    }
}

/// Dims and blurs the current beatmap background.
///
/// Reacts synchronously to its bindables: any change retargets the dim
/// alpha/colour and the background blur. Content can only be installed
/// through [`DimmableBackground::set_background`].
pub struct DimmableBackground {
    inputs: Inputs,
    visuals: Rc<RefCell<Visuals>>,
    // Set when a change arrives while visuals are borrowed; applied on update.
    stale: Rc<Cell<bool>>,
    _subscriptions: Vec<Subscription>,
}

impl DimmableBackground {
    pub fn new(settings: BackgroundSettings) -> Self {
        Self::with_policies(settings, storyboard_visibility, blur_target)
    }

    pub fn with_policies(
        settings: BackgroundSettings,
        visibility: VisibilityPolicy,
        blur_policy: BlurPolicy,
    ) -> Self {
        let inputs = Inputs {
            blur_amount: Bindable::new(0.0),
            enable_user_dim: Bindable::new(false),
            ui_blur_enabled: Bindable::new(false),
            is_break_time: Bindable::new(false),
            storyboard_replaces_background: Bindable::new(false),
            settings,
        };
        let visuals = Rc::new(RefCell::new(Visuals {
            dim: UserDim::new(visibility),
            blur_policy,
            background: None,
            retiring: SmallVec::new(),
        }));
        {
            let mut v = visuals.borrow_mut();
            v.refresh(&inputs);
            v.dim.finish_transforms();
        }

        let stale = Rc::new(Cell::new(false));
        let mut this = Self {
            inputs,
            visuals,
            stale,
            _subscriptions: Vec::new(),
        };
        this._subscriptions = this.subscribe_all();
        this
    }

    fn subscribe_all(&self) -> Vec<Subscription> {
        let i = &self.inputs;
        let s = &i.settings;
        vec![
            self.on_change(&i.blur_amount),
            self.on_change(&i.enable_user_dim),
            self.on_change(&i.ui_blur_enabled),
            self.on_change(&i.is_break_time),
            self.on_change(&i.storyboard_replaces_background),
            self.on_change(&s.dim_level),
            self.on_change(&s.blur_level),
            self.on_change(&s.ui_blur_level),
            self.on_change(&s.show_storyboard),
            self.on_change(&s.lighten_during_breaks),
        ]
    }

    fn on_change<T: Clone + PartialEq + 'static>(&self, bindable: &Bindable<T>) -> Subscription {
        let visuals: Weak<RefCell<Visuals>> = Rc::downgrade(&self.visuals);
        let stale = Rc::clone(&self.stale);
        let inputs = self.inputs.clone();
        bindable.subscribe(move |_| {
            let Some(visuals) = visuals.upgrade() else {
                return;
            };
            match visuals.try_borrow_mut() {
                Ok(mut v) => v.refresh(&inputs),
                Err(_) => stale.set(true),
            }
        })
    }

    // --- Bindables ---

    /// Extra blur requested by the owning screen.
    #[inline(always)]
    pub fn blur_amount(&self) -> &Bindable<f32> {
        &self.inputs.blur_amount
    }

    /// Gameplay mode: user dim and gameplay blur apply.
    #[inline(always)]
    pub fn enable_user_dim(&self) -> &Bindable<bool> {
        &self.inputs.enable_user_dim
    }

    #[inline(always)]
    pub fn ui_blur_enabled(&self) -> &Bindable<bool> {
        &self.inputs.ui_blur_enabled
    }

    #[inline(always)]
    pub fn is_break_time(&self) -> &Bindable<bool> {
        &self.inputs.is_break_time
    }

    #[inline(always)]
    pub fn storyboard_replaces_background(&self) -> &Bindable<bool> {
        &self.inputs.storyboard_replaces_background
    }

    #[inline(always)]
    pub fn settings(&self) -> &BackgroundSettings {
        &self.inputs.settings
    }

    // --- State ---

    pub fn blur_target(&self) -> Vec2 {
        (self.visuals.borrow().blur_policy)(&self.inputs.blur())
    }

    pub fn shows_content(&self) -> bool {
        self.visuals.borrow().dim.shows_content()
    }

    pub fn dim_level(&self) -> f32 {
        self.visuals.borrow().dim.dim_level()
    }

    /// Tint of the dimmed content frame.
    pub fn content_tint(&self) -> [f32; 4] {
        self.visuals.borrow().dim.tint()
    }

    /// Runs `f` against the installed background, if any.
    pub fn with_background<R>(&self, f: impl FnOnce(Option<&BeatmapBackground>) -> R) -> R {
        f(self.visuals.borrow().background.as_ref())
    }

    pub fn has_background(&self) -> bool {
        self.visuals.borrow().background.is_some()
    }

    pub fn retiring_count(&self) -> usize {
        self.visuals.borrow().retiring.len()
    }

    // --- Mutation ---

    /// Installs `background` as the one current background.
    ///
    /// The previous one is expired and kept only until its running fade ends.
    /// The new background receives the current blur target immediately.
    pub fn set_background(&mut self, mut background: BeatmapBackground) {
        let target = self.blur_target();
        let mut v = self.visuals.borrow_mut();
        if let Some(mut old) = v.background.take() {
            old.expire();
            v.retiring.push(old);
        }
        background.blur_to(target, 0.0, Easing::OutQuint);
        debug!(
            "Installed background '{}' at depth {} (blur {})",
            background.texture().key(),
            background.depth(),
            target.x
        );
        v.background = Some(background);
    }

    /// Mutable access to the current background, e.g. to start its exit fade.
    pub fn with_background_mut<R>(
        &mut self,
        f: impl FnOnce(Option<&mut BeatmapBackground>) -> R,
    ) -> R {
        f(self.visuals.borrow_mut().background.as_mut())
    }

    /// Direct child insertion is not supported; use [`Self::set_background`].
    pub fn add(&mut self, _child: BeatmapBackground) -> Result<(), BackgroundError> {
        warn!("Rejected direct background insertion.");
        Err(BackgroundError::InvalidOperation(
            "use set_background to set a background",
        ))
    }

    pub fn update(&mut self, dt: f32) {
        let mut v = self.visuals.borrow_mut();
        if self.stale.replace(false) {
            v.refresh(&self.inputs);
        }
        v.dim.update(dt);
        if let Some(bg) = v.background.as_mut() {
            bg.update(dt);
        }
        for bg in &mut v.retiring {
            bg.update(dt);
        }
        let before = v.retiring.len();
        v.retiring.retain(|bg| !bg.is_dead());
        let dropped = before - v.retiring.len();
        if dropped > 0 {
            trace!("Dropped {dropped} expired background(s)");
        }
    }

    /// Draw list: one dim frame holding every live background, back to
    /// front by depth.
    pub fn get_actors(&self, screen: [f32; 2]) -> Vec<Actor> {
        let v = self.visuals.borrow();
        let mut layers: SmallVec<[&BeatmapBackground; 3]> = v.retiring.iter().collect();
        if let Some(bg) = v.background.as_ref() {
            layers.push(bg);
        }
        // Larger depth draws first (further back).
        layers.sort_by(|a, b| b.depth().cmp(&a.depth()));

        let children = layers
            .iter()
            .enumerate()
            .map(|(i, bg)| bg.actor(screen, BACKGROUND_Z.saturating_add(i as i16)))
            .collect();
        let tint = v.dim.tint();
        vec![Actor::Frame {
            align: [0.0, 0.0],
            offset: [0.0, 0.0],
            size: screen,
            children,
            tint,
            z: BACKGROUND_Z,
            visible: tint[3] > 0.0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BackgroundError, BlurInputs, DimmableBackground, GAMEPLAY_BLUR_FACTOR, blur_target,
    };
    use crate::assets::BackgroundTexture;
    use crate::config::BackgroundSettings;
    use crate::ui::actors::Actor;
    use crate::ui::components::beatmap_background::BeatmapBackground;
    use crate::ui::components::user_dim::BACKGROUND_FADE_DURATION;
    use glam::Vec2;

    fn bg(key: &str) -> BeatmapBackground {
        BeatmapBackground::new(
            None,
            BackgroundTexture::new(key.to_string(), image::RgbaImage::new(2, 2)),
        )
    }

    fn close(a: Vec2, b: f32) -> bool {
        (a.x - b).abs() <= 1e-4 && (a.y - b).abs() <= 1e-4
    }

    #[test]
    fn gameplay_blur_adds_scaled_level() {
        let t = blur_target(&BlurInputs {
            blur_amount: 2.0,
            enable_user_dim: true,
            blur_level: 0.1,
            ..BlurInputs::default()
        });
        assert!(close(t, 4.5), "expected 2 + 0.1*25, got {t:?}");
    }

    #[test]
    fn ui_blur_multiplies_scaled_level() {
        let t = blur_target(&BlurInputs {
            blur_amount: 2.0,
            ui_blur_enabled: true,
            ui_blur_level: 0.1,
            ..BlurInputs::default()
        });
        assert!(close(t, 5.0), "expected 2 * 0.1 * 25, got {t:?}");
    }

    #[test]
    fn no_mode_passes_amount_through() {
        let t = blur_target(&BlurInputs {
            blur_amount: 7.0,
            blur_level: 1.0,
            ui_blur_level: 1.0,
            ..BlurInputs::default()
        });
        assert!(close(t, 7.0));
    }

    #[test]
    fn gameplay_dim_wins_over_ui_blur() {
        let t = blur_target(&BlurInputs {
            blur_amount: 2.0,
            enable_user_dim: true,
            blur_level: 0.2,
            ui_blur_enabled: true,
            ui_blur_level: 0.9,
        });
        assert!(close(t, 2.0 + 0.2 * GAMEPLAY_BLUR_FACTOR), "got {t:?}");
    }

    #[test]
    fn new_background_gets_target_instantly_then_changes_animate() {
        let mut d = DimmableBackground::new(BackgroundSettings::default());
        d.blur_amount().set(2.0);
        d.set_background(bg("a"));
        d.with_background(|b| {
            let b = b.expect("installed");
            assert!(close(b.blur(), 2.0), "no visible un-blur on swap");
            assert!(b.blur_duration().abs() <= f32::EPSILON);
        });

        d.settings().blur_level.set(0.1);
        d.enable_user_dim().set(true);
        d.with_background(|b| {
            let b = b.expect("installed");
            assert!(close(b.blur_target(), 4.5));
            assert!((b.blur_duration() - BACKGROUND_FADE_DURATION).abs() <= 1e-6);
            assert!(b.blur().x < 4.5, "transition should not be instant");
        });

        d.update(BACKGROUND_FADE_DURATION);
        d.with_background(|b| assert!(close(b.expect("installed").blur(), 4.5)));
    }

    #[test]
    fn replacing_retires_the_previous_background() {
        let mut d = DimmableBackground::new(BackgroundSettings::default());
        d.set_background(bg("a"));
        d.set_background(bg("b"));
        assert_eq!(d.retiring_count(), 1);
        d.with_background(|b| assert_eq!(b.expect("installed").texture().key(), "b"));

        // Retired without a running fade, so it goes on the next update.
        d.update(0.0);
        assert_eq!(d.retiring_count(), 0);
    }

    #[test]
    fn direct_add_is_rejected() {
        let mut d = DimmableBackground::new(BackgroundSettings::default());
        let err = d.add(bg("a")).expect_err("add must be rejected");
        assert!(matches!(err, BackgroundError::InvalidOperation(_)));
        assert!(!d.has_background(), "rejected child must not be installed");
        assert!(err.to_string().contains("set_background"));
    }

    #[test]
    fn storyboard_replacement_hides_content() {
        let settings = BackgroundSettings::default();
        settings.show_storyboard.set(true);
        let mut d = DimmableBackground::new(settings);
        assert!(d.shows_content());

        d.storyboard_replaces_background().set(true);
        assert!(!d.shows_content());
        d.update(BACKGROUND_FADE_DURATION);
        let actors = d.get_actors([640.0, 480.0]);
        assert!(!actors[0].is_visible(), "fully faded frame is not drawn");

        d.settings().show_storyboard.set(false);
        assert!(d.shows_content());
    }

    #[test]
    fn break_time_lightens_user_dim() {
        let settings = BackgroundSettings::default();
        settings.dim_level.set(0.8);
        settings.lighten_during_breaks.set(true);
        let d = DimmableBackground::new(settings);
        assert!(d.dim_level().abs() <= f32::EPSILON, "no dim outside gameplay");

        d.enable_user_dim().set(true);
        assert!((d.dim_level() - 0.8).abs() <= 1e-6);
        d.is_break_time().set(true);
        assert!((d.dim_level() - 0.5).abs() <= 1e-6);
    }

    #[test]
    fn actors_draw_back_to_front_by_depth() {
        let mut d = DimmableBackground::new(BackgroundSettings::default());
        let mut first = bg("old");
        first.set_depth(0);
        d.set_background(first);
        d.with_background_mut(|b| {
            let b = b.expect("installed");
            b.fade_out(0.25, crate::ui::anim::Easing::OutQuint);
        });
        let mut second = bg("new");
        second.set_depth(1);
        d.set_background(second);

        let actors = d.get_actors([100.0, 100.0]);
        let Actor::Frame { children, .. } = &actors[0] else {
            panic!("expected dim frame");
        };
        let keys: Vec<_> = children
            .iter()
            .filter_map(|c| match c {
                Actor::Sprite { texture, .. } => Some(texture.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["new", "old"], "fading old background draws on top");
    }

    #[test]
    fn dropping_the_compositor_detaches_from_settings() {
        let settings = BackgroundSettings::default();
        let d = DimmableBackground::new(settings.clone());
        assert_eq!(settings.dim_level.subscriber_count(), 1);
        drop(d);
        assert_eq!(settings.dim_level.subscriber_count(), 0);
        settings.dim_level.set(0.1);
    }
}
