use beatmap_bg::assets::ImageBackgroundLoader;
use beatmap_bg::config::{self, BackgroundSettings};
use beatmap_bg::game::beatmap::BeatmapRef;
use beatmap_bg::screens::background::BackgroundScreen;
use beatmap_bg::ui::actors::Actor;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_nanos(1_000_000_000 / 60);
const SCREEN: [f32; 2] = [1920.0, 1080.0];
const DEFAULT_INTERVAL: f32 = 3.0;

struct Args {
    interval: f32,
    images: Vec<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut interval = DEFAULT_INTERVAL;
    let mut images = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--interval" {
            let v = args.next().ok_or("--interval needs a value")?;
            interval = v
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| format!("invalid interval '{v}'"))?;
        } else {
            images.push(PathBuf::from(arg));
        }
    }
    if images.is_empty() {
        return Err("usage: beatmap-bg [--interval SECS] IMAGE...".to_string());
    }
    Ok(Args { interval, images })
}

fn summarize(actors: &[Actor]) -> String {
    let mut out = Vec::new();
    for actor in actors {
        actor.walk(&mut |a| match a {
            Actor::Frame { tint, .. } => {
                out.push(format!("frame(grey {:.2}, a {:.2})", tint[0], tint[3]));
            }
            Actor::Sprite { tint, blur, z, .. } => {
                out.push(format!("sprite(z {z}, a {:.2}, blur {:.1})", tint[3], blur[0]));
            }
        });
    }
    out.join(" ")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    log::set_max_level(config::get().log_level.as_level_filter());

    let args = parse_args()?;
    let beatmaps: Vec<BeatmapRef> = args
        .images
        .iter()
        .enumerate()
        .map(|(i, path)| BeatmapRef::from_background_path(i as u64 + 1, path))
        .collect();

    let settings = BackgroundSettings::from_config(&config::get());
    let _persist = settings.persist_on_change();
    let mut screen = BackgroundScreen::new(
        beatmaps.first().cloned(),
        Arc::new(ImageBackgroundLoader),
        settings,
    );
    screen.enable_user_dim().set(true);

    let dt = FRAME.as_secs_f32();
    let frames_per_map = (args.interval / dt).ceil().max(1.0) as usize;
    let mut last_report = Instant::now();

    for (index, beatmap) in beatmaps.iter().enumerate() {
        screen.set_beatmap(Some(beatmap.clone()));
        info!("Showing '{}' ({}/{})", beatmap.info().title, index + 1, beatmaps.len());

        for frame in 0..frames_per_map {
            let started = Instant::now();
            screen.is_break_time().set(frame >= frames_per_map / 2);
            screen.update(dt);

            if last_report.elapsed() >= Duration::from_secs(1) {
                last_report = Instant::now();
                info!("{}", summarize(&screen.get_actors(SCREEN)));
            }

            if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            } else {
                warn!("Frame took {:?}, over budget.", started.elapsed());
            }
        }
    }
    Ok(())
}
