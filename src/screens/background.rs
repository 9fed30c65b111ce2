use crate::assets::{BackgroundLoader, BackgroundTexture};
use crate::config::BackgroundSettings;
use crate::core::bindable::Bindable;
use crate::core::scheduler::{Scheduler, SchedulerHandle};
use crate::core::task::{CancellationToken, spawn_cancellable};
use crate::game::beatmap::{BeatmapRef, same_background};
use crate::ui::actors::Actor;
use crate::ui::anim::Easing;
use crate::ui::components::beatmap_background::{BeatmapBackground, EXPIRE_FADE_DURATION};
use crate::ui::components::dimmable_background::DimmableBackground;
use log::{debug, info, warn};
use std::sync::Arc;

/// Work serialized onto the main update path.
enum Scheduled {
    SetBeatmap(Option<BeatmapRef>),
    Loaded(LoadedBackground),
}

struct LoadedBackground {
    generation: u64,
    token: CancellationToken,
    texture: BackgroundTexture,
}

struct PendingLoad {
    generation: u64,
    token: CancellationToken,
    beatmap: Option<BeatmapRef>,
}

/// `Send` handle for changing the beatmap from outside the update path.
#[derive(Clone)]
pub struct BeatmapRequester(SchedulerHandle<Scheduled>);

impl BeatmapRequester {
    /// Queues a beatmap change. Returns `false` if the screen is gone.
    pub fn set_beatmap(&self, beatmap: Option<BeatmapRef>) -> bool {
        self.0.schedule(Scheduled::SetBeatmap(beatmap))
    }
}

/// Screen background showing the active beatmap's image.
///
/// Beatmap changes build the replacement on a worker thread; the swap itself
/// happens in [`BackgroundScreen::update`]. Only the most recent request is
/// ever installed: each new request cancels the load before it.
pub struct BackgroundScreen {
    beatmap: Option<BeatmapRef>,
    loader: Arc<dyn BackgroundLoader>,
    scheduler: Scheduler<Scheduled>,
    dimmable: DimmableBackground,
    pending: Option<PendingLoad>,
    generation: u64,
}

impl BackgroundScreen {
    pub fn new(
        beatmap: Option<BeatmapRef>,
        loader: Arc<dyn BackgroundLoader>,
        settings: BackgroundSettings,
    ) -> Self {
        let this = Self {
            beatmap: beatmap.clone(),
            loader,
            scheduler: Scheduler::new(),
            dimmable: DimmableBackground::new(settings),
            pending: None,
            generation: 0,
        };
        this.scheduler.schedule(Scheduled::SetBeatmap(beatmap));
        this
    }

    /// Changes the displayed beatmap.
    ///
    /// Requests from here and from [`BeatmapRequester`] share one queue, so
    /// the last call wins regardless of its origin. Re-assigning the
    /// displayed or loading background does not reload it.
    pub fn set_beatmap(&mut self, beatmap: Option<BeatmapRef>) {
        self.beatmap = beatmap.clone();
        self.scheduler.schedule(Scheduled::SetBeatmap(beatmap));
    }

    pub fn requester(&self) -> BeatmapRequester {
        BeatmapRequester(self.scheduler.handle())
    }

    /// Most recently assigned beatmap.
    #[inline(always)]
    pub fn beatmap(&self) -> Option<&BeatmapRef> {
        self.beatmap.as_ref()
    }

    /// Beatmap whose background is currently installed.
    pub fn current_beatmap(&self) -> Option<BeatmapRef> {
        self.dimmable
            .with_background(|bg| bg.and_then(BeatmapBackground::beatmap).cloned())
    }

    #[inline(always)]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    #[inline(always)]
    pub fn dimmable(&self) -> &DimmableBackground {
        &self.dimmable
    }

    // --- Screen-level state, shared with the compositor ---

    #[inline(always)]
    pub fn blur_amount(&self) -> &Bindable<f32> {
        self.dimmable.blur_amount()
    }

    #[inline(always)]
    pub fn enable_user_dim(&self) -> &Bindable<bool> {
        self.dimmable.enable_user_dim()
    }

    #[inline(always)]
    pub fn ui_blur_enabled(&self) -> &Bindable<bool> {
        self.dimmable.ui_blur_enabled()
    }

    #[inline(always)]
    pub fn is_break_time(&self) -> &Bindable<bool> {
        self.dimmable.is_break_time()
    }

    #[inline(always)]
    pub fn storyboard_replaces_background(&self) -> &Bindable<bool> {
        self.dimmable.storyboard_replaces_background()
    }

    // --- Frame ---

    /// Runs scheduled work in order, then advances transitions.
    pub fn update(&mut self, dt: f32) {
        for item in self.scheduler.drain() {
            match item {
                Scheduled::SetBeatmap(beatmap) => self.apply_beatmap(beatmap),
                Scheduled::Loaded(loaded) => self.on_loaded(loaded),
            }
        }
        self.dimmable.update(dt);
    }

    pub fn get_actors(&self, screen: [f32; 2]) -> Vec<Actor> {
        self.dimmable.get_actors(screen)
    }

    // --- Swapping ---

    fn apply_beatmap(&mut self, beatmap: Option<BeatmapRef>) {
        self.beatmap = beatmap.clone();

        let displayed = self.dimmable.with_background(|bg| {
            same_background(bg.and_then(BeatmapBackground::beatmap), beatmap.as_ref())
        });
        if displayed {
            // Back to what is on screen; anything in flight is now stale.
            if let Some(p) = self.pending.take() {
                p.token.cancel();
                debug!("Cancelled background load (generation {})", p.generation);
            }
            return;
        }

        if let Some(p) = self.pending.as_mut()
            && same_background(p.beatmap.as_ref(), beatmap.as_ref())
        {
            // Same image already loading; it installs under the newer beatmap.
            p.beatmap = beatmap;
            return;
        }

        self.start_load(beatmap);
    }

    fn start_load(&mut self, beatmap: Option<BeatmapRef>) {
        if let Some(p) = self.pending.take() {
            p.token.cancel();
            debug!("Cancelled background load (generation {})", p.generation);
        }

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        match &beatmap {
            Some(b) => info!(
                "Loading background for beatmap {} '{}' (generation {generation})",
                b.id(),
                b.info().title
            ),
            None => info!("Loading default background (generation {generation})"),
        }

        let handle = self.scheduler.handle();
        let loader = Arc::clone(&self.loader);
        let job_beatmap = beatmap.clone();
        let spawned = spawn_cancellable("bg-load", &token, move |token| {
            if token.is_cancelled() {
                return;
            }
            let texture = loader.load(job_beatmap.as_ref());
            if token.is_cancelled() {
                return;
            }
            handle.schedule(Scheduled::Loaded(LoadedBackground {
                generation,
                token,
                texture,
            }));
        });

        if !spawned {
            warn!("Loading background on the update path instead.");
            let texture = self.loader.load(beatmap.as_ref());
            self.scheduler.schedule(Scheduled::Loaded(LoadedBackground {
                generation,
                token: token.clone(),
                texture,
            }));
        }

        self.pending = Some(PendingLoad {
            generation,
            token,
            beatmap,
        });
    }

    fn on_loaded(&mut self, loaded: LoadedBackground) {
        let is_current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == loaded.generation);
        if loaded.token.is_cancelled() || !is_current {
            debug!(
                "Discarding superseded background (generation {})",
                loaded.generation
            );
            return;
        }
        let beatmap = self.pending.take().and_then(|p| p.beatmap);
        self.switch_background(BeatmapBackground::new(beatmap, loaded.texture));
    }

    fn switch_background(&mut self, mut background: BeatmapBackground) {
        let depth = self.dimmable.with_background_mut(|current| {
            current.map_or(0, |old| {
                old.finish_transforms();
                old.fade_out(EXPIRE_FADE_DURATION, Easing::OutQuint);
                old.expire();
                old.depth() + 1
            })
        });
        background.set_depth(depth);
        self.dimmable.set_background(background);
    }
}

impl Drop for BackgroundScreen {
    fn drop(&mut self) {
        if let Some(p) = self.pending.take() {
            p.token.cancel();
        }
    }
}
