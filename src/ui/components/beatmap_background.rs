use crate::assets::BackgroundTexture;
use crate::game::beatmap::BeatmapRef;
use crate::ui::actors::Actor;
use crate::ui::anim::{Easing, Tween};
use glam::Vec2;

/// How long a replaced background takes to fade before it is dropped.
pub const EXPIRE_FADE_DURATION: f32 = 0.25;

/// One loaded background image and its per-instance transforms.
///
/// `depth` follows the "larger is further back" convention: a replacement is
/// installed one step behind the outgoing image so the old one fades away
/// on top of it.
#[derive(Debug)]
pub struct BeatmapBackground {
    beatmap: Option<BeatmapRef>,
    texture: BackgroundTexture,
    depth: i32,
    blur: Tween<Vec2>,
    alpha: Tween<f32>,
    expired: bool,
}

impl BeatmapBackground {
    pub fn new(beatmap: Option<BeatmapRef>, texture: BackgroundTexture) -> Self {
        Self {
            beatmap,
            texture,
            depth: 0,
            blur: Tween::new(Vec2::ZERO),
            alpha: Tween::new(1.0),
            expired: false,
        }
    }

    #[inline(always)]
    pub fn beatmap(&self) -> Option<&BeatmapRef> {
        self.beatmap.as_ref()
    }

    #[inline(always)]
    pub fn texture(&self) -> &BackgroundTexture {
        &self.texture
    }

    #[inline(always)]
    pub const fn depth(&self) -> i32 {
        self.depth
    }

    #[inline(always)]
    pub fn set_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    pub fn blur_to(&mut self, sigma: Vec2, duration: f32, easing: Easing) {
        self.blur.to(sigma, duration, easing);
    }

    /// Blur currently on screen.
    #[inline(always)]
    pub fn blur(&self) -> Vec2 {
        self.blur.value()
    }

    #[inline(always)]
    pub fn blur_target(&self) -> Vec2 {
        self.blur.target()
    }

    /// Duration of the most recent blur transition.
    #[inline(always)]
    pub fn blur_duration(&self) -> f32 {
        self.blur.duration()
    }

    #[inline(always)]
    pub fn alpha(&self) -> f32 {
        self.alpha.value()
    }

    pub fn fade_out(&mut self, duration: f32, easing: Easing) {
        self.alpha.to(0.0, duration, easing);
    }

    pub fn finish_transforms(&mut self) {
        self.blur.finish();
        self.alpha.finish();
    }

    /// Marks this background for removal once its running transforms end.
    #[inline(always)]
    pub fn expire(&mut self) {
        self.expired = true;
    }

    /// Expired and finished fading; safe to drop.
    pub fn is_dead(&self) -> bool {
        self.expired && !self.alpha.is_active() && !self.blur.is_active()
    }

    pub fn update(&mut self, dt: f32) {
        self.blur.update(dt);
        self.alpha.update(dt);
    }

    /// Cover-fits the texture to the screen, centered.
    pub fn actor(&self, screen: [f32; 2], z: i16) -> Actor {
        let [sw, sh] = screen;
        let meta = self.texture.meta();
        let (tex_w, tex_h) = (meta.w.max(1) as f32, meta.h.max(1) as f32);
        let screen_aspect = if sh > 0.0 { sw / sh } else { 16.0 / 9.0 };
        let tex_aspect = tex_w / tex_h;

        let size = if screen_aspect > tex_aspect {
            // screen is wider, match width to cover
            [sw, sw / tex_aspect]
        } else {
            // screen is taller/equal, match height to cover
            [sh * tex_aspect, sh]
        };
        let blur = self.blur();

        Actor::Sprite {
            align: [0.5, 0.5],
            offset: [sw * 0.5, sh * 0.5],
            size,
            texture: self.texture.key().to_string(),
            tint: [1.0, 1.0, 1.0, self.alpha()],
            blur: [blur.x, blur.y],
            z,
            visible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BeatmapBackground, EXPIRE_FADE_DURATION};
    use crate::assets::BackgroundTexture;
    use crate::ui::actors::Actor;
    use crate::ui::anim::Easing;
    use glam::Vec2;
    use image::RgbaImage;

    fn wide() -> BeatmapBackground {
        BeatmapBackground::new(
            None,
            BackgroundTexture::new("wide".to_string(), RgbaImage::new(200, 100)),
        )
    }

    #[test]
    fn expired_background_dies_after_its_fade() {
        let mut bg = wide();
        bg.fade_out(EXPIRE_FADE_DURATION, Easing::OutQuint);
        bg.expire();
        assert!(!bg.is_dead(), "still fading");
        bg.update(EXPIRE_FADE_DURATION * 0.5);
        assert!(!bg.is_dead());
        bg.update(EXPIRE_FADE_DURATION);
        assert!(bg.is_dead());
        assert!(bg.alpha().abs() <= 1e-6);
    }

    #[test]
    fn finish_transforms_settles_blur() {
        let mut bg = wide();
        bg.blur_to(Vec2::splat(10.0), 0.8, Easing::OutQuint);
        assert!(bg.blur().x < 10.0);
        bg.finish_transforms();
        assert_eq!(bg.blur(), Vec2::splat(10.0));
    }

    #[test]
    fn actor_cover_fits_and_carries_blur() {
        let mut bg = wide();
        bg.blur_to(Vec2::new(3.0, 3.0), 0.0, Easing::Linear);
        // 2:1 texture on a 4:3 screen is height-matched.
        let Actor::Sprite { size, blur, .. } = bg.actor([800.0, 600.0], -100) else {
            panic!("background should render as a sprite");
        };
        assert!((size[1] - 600.0).abs() <= 1e-3 && (size[0] - 1200.0).abs() <= 1e-3, "{size:?}");
        assert_eq!(blur, [3.0, 3.0]);

        // Same texture on an ultrawide screen is width-matched.
        let Actor::Sprite { size, .. } = bg.actor([3000.0, 1000.0], -100) else {
            panic!("background should render as a sprite");
        };
        assert!((size[0] - 3000.0).abs() <= 1e-3 && (size[1] - 1500.0).abs() <= 1e-3, "{size:?}");
    }
}
