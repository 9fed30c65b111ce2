use crate::game::beatmap::BeatmapRef;
use image::{ImageFormat, ImageReader, RgbaImage};
use log::{debug, warn};
use std::{
    fmt,
    hash::Hasher,
    path::Path,
    sync::Arc,
    time::Instant,
};
use twox_hash::XxHash64;

/// Texture key of the built-in solid black background.
pub const FALLBACK_KEY: &str = "__black";

// --- Texture Metadata ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexMeta {
    pub w: u32,
    pub h: u32,
}

/// A decoded background image ready to be uploaded by a renderer.
#[derive(Clone)]
pub struct BackgroundTexture {
    key: String,
    image: Arc<RgbaImage>,
}

impl BackgroundTexture {
    pub fn new(key: String, image: RgbaImage) -> Self {
        Self {
            key,
            image: Arc::new(image),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_KEY.to_string(), black_rgba())
    }

    #[inline(always)]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline(always)]
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    #[inline(always)]
    pub fn meta(&self) -> TexMeta {
        TexMeta {
            w: self.image.width(),
            h: self.image.height(),
        }
    }

    #[inline(always)]
    pub fn is_fallback(&self) -> bool {
        self.key == FALLBACK_KEY
    }
}

impl fmt::Debug for BackgroundTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TexMeta { w, h } = self.meta();
        write!(f, "BackgroundTexture({} {w}x{h})", self.key)
    }
}

#[inline(always)]
fn black_rgba() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]))
}

pub fn canonical_texture_key<P: AsRef<Path>>(p: P) -> String {
    let p = p.as_ref();
    let rel = p.strip_prefix(Path::new("assets")).unwrap_or(p);
    rel.to_string_lossy().replace('\\', "/")
}

/// Texture key shared by every beatmap that shows the same background, so a
/// renderer can keep one upload per set/file pair.
pub fn background_texture_key(beatmap: &BeatmapRef) -> String {
    let info = beatmap.info();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(info.set_hash.as_bytes());
    hasher.write_u8(0);
    if let Some(file) = &info.background_file {
        hasher.write(canonical_texture_key(file).as_bytes());
    }
    format!("bg/{:016x}", hasher.finish())
}

/// Decodes by extension first, then by sniffing the header. Files with the
/// wrong extension still load, with a warning.
pub(crate) fn open_image_fallback(path: &Path) -> image::ImageResult<image::DynamicImage> {
    let hint = ImageFormat::from_path(path).ok();
    if let Some(fmt) = hint {
        let mut reader = ImageReader::open(path).map_err(image::ImageError::IoError)?;
        reader.set_format(fmt);
        if let Ok(img) = reader.decode() {
            return Ok(img);
        }
    }

    let guessed = ImageReader::open(path)
        .map_err(image::ImageError::IoError)?
        .with_guessed_format()?;
    if let (Some(hint_fmt), Some(real_fmt)) = (hint, guessed.format())
        && hint_fmt != real_fmt
    {
        warn!("Background file '{}' is really {real_fmt:?}", path.display());
    }
    guessed.decode()
}

// --- Background loading ---

/// Builds background textures off the main path.
///
/// Implementations run on worker threads and must not touch visual state.
/// A loader never fails: anything unreadable turns into the fallback texture.
pub trait BackgroundLoader: Send + Sync + 'static {
    fn load(&self, beatmap: Option<&BeatmapRef>) -> BackgroundTexture;
}

/// Decodes background files from disk with the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageBackgroundLoader;

impl BackgroundLoader for ImageBackgroundLoader {
    fn load(&self, beatmap: Option<&BeatmapRef>) -> BackgroundTexture {
        let Some(beatmap) = beatmap else {
            return BackgroundTexture::fallback();
        };
        let Some(path) = beatmap.background_path() else {
            debug!(
                "Beatmap {} has no background file; using fallback.",
                beatmap.id()
            );
            return BackgroundTexture::fallback();
        };

        let started = Instant::now();
        match open_image_fallback(&path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                debug!(
                    "Decoded background {path:?} ({}x{}) in {:?}",
                    rgba.width(),
                    rgba.height(),
                    started.elapsed()
                );
                BackgroundTexture::new(background_texture_key(beatmap), rgba)
            }
            Err(e) => {
                warn!("Failed to open background image {path:?}: {e}. Using fallback.");
                BackgroundTexture::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BackgroundLoader, FALLBACK_KEY, ImageBackgroundLoader, TexMeta, background_texture_key,
        canonical_texture_key,
    };
    use crate::game::beatmap::{BeatmapInfo, BeatmapRef};
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "beatmap-bg-assets-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn map_in(dir: PathBuf, set: &str, file: Option<&str>) -> BeatmapRef {
        BeatmapRef::new(BeatmapInfo {
            id: 1,
            set_hash: set.to_string(),
            title: "t".to_string(),
            directory: dir,
            background_file: file.map(PathBuf::from),
        })
    }

    #[test]
    fn canonical_key_strips_assets_prefix_and_backslashes() {
        assert_eq!(canonical_texture_key("assets/graphics/bg.png"), "graphics/bg.png");
        assert_eq!(canonical_texture_key("songs\\a\\bg.png"), "songs/a/bg.png");
    }

    #[test]
    fn texture_key_follows_background_identity() {
        let a = map_in(PathBuf::from("x"), "set", Some("bg.png"));
        let b = map_in(PathBuf::from("y"), "set", Some("bg.png"));
        let c = map_in(PathBuf::from("x"), "set", Some("other.png"));
        assert_eq!(background_texture_key(&a), background_texture_key(&b));
        assert_ne!(background_texture_key(&a), background_texture_key(&c));
    }

    #[test]
    fn missing_inputs_fall_back_to_black() {
        let loader = ImageBackgroundLoader;
        assert_eq!(loader.load(None).key(), FALLBACK_KEY);

        let no_file = map_in(PathBuf::from("nowhere"), "s", None);
        assert!(loader.load(Some(&no_file)).is_fallback());

        let missing = map_in(PathBuf::from("definitely/not/here"), "s", Some("bg.png"));
        let tex = loader.load(Some(&missing));
        assert!(tex.is_fallback());
        assert_eq!(tex.meta(), TexMeta { w: 1, h: 1 });
    }

    #[test]
    fn decodes_a_real_png() {
        let dir = scratch_dir("png");
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        img.save(dir.join("bg.png")).expect("write test png");

        let beatmap = map_in(dir.clone(), "s", Some("bg.png"));
        let tex = ImageBackgroundLoader.load(Some(&beatmap));
        assert!(!tex.is_fallback());
        assert_eq!(tex.meta(), TexMeta { w: 4, h: 3 });
        assert_eq!(tex.key(), background_texture_key(&beatmap));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn wrong_extension_is_sniffed() {
        let dir = scratch_dir("sniff");
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        img.save(dir.join("real.png")).expect("write test png");
        std::fs::rename(dir.join("real.png"), dir.join("bg.jpg")).expect("rename");

        let beatmap = map_in(dir.clone(), "s", Some("bg.jpg"));
        let tex = ImageBackgroundLoader.load(Some(&beatmap));
        assert!(!tex.is_fallback(), "png bytes behind a .jpg name should still decode");
        assert_eq!(tex.meta(), TexMeta { w: 2, h: 2 });

        let _ = std::fs::remove_dir_all(dir);
    }
}
