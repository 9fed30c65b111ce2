use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Metadata needed to identify a beatmap and locate its background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeatmapInfo {
    pub id: u64,
    /// Hash of the containing beatmap set; beatmaps of one set share files.
    pub set_hash: String,
    pub title: String,
    pub directory: PathBuf,
    /// Background file name, relative to `directory`.
    pub background_file: Option<PathBuf>,
}

/// Shared handle to a beatmap, cheap to clone and safe to send to loaders.
#[derive(Clone, Debug)]
pub struct BeatmapRef(Arc<BeatmapInfo>);

impl BeatmapRef {
    pub fn new(info: BeatmapInfo) -> Self {
        Self(Arc::new(info))
    }

    /// Builds a single-beatmap set around one image file; the file's parent
    /// directory doubles as the set identity.
    pub fn from_background_path(id: u64, path: &Path) -> Self {
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(BeatmapInfo {
            id,
            set_hash: directory.to_string_lossy().into_owned(),
            title,
            directory,
            background_file: path.file_name().map(PathBuf::from),
        })
    }

    #[inline(always)]
    pub fn info(&self) -> &BeatmapInfo {
        &self.0
    }

    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn background_path(&self) -> Option<PathBuf> {
        self.0
            .background_file
            .as_ref()
            .map(|file| self.0.directory.join(file))
    }

    /// Whether both beatmaps would display the same background image.
    pub fn background_equals(&self, other: &Self) -> bool {
        self.0.set_hash == other.0.set_hash && self.0.background_file == other.0.background_file
    }
}

impl PartialEq for BeatmapRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for BeatmapRef {}

/// Null-aware background comparison: a missing beatmap never matches.
pub fn same_background(a: Option<&BeatmapRef>, b: Option<&BeatmapRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.background_equals(b),
        _ => false,
    }
}
