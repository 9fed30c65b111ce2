use crate::core::bindable::{Bindable, Subscription};
use ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

const CONFIG_PATH: &str = "beatmap-bg.ini";
const OPTIONS: &str = "Options";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// User background dim during gameplay. 0.0 = none, 1.0 = black.
    pub dim_level: f32,
    /// Gameplay blur, scaled by the gameplay blur factor.
    pub blur_level: f32,
    /// Blur applied behind UI overlays, scaled by the UI blur factor.
    pub ui_blur_level: f32,
    pub show_storyboard: bool,
    pub lighten_during_breaks: bool,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dim_level: 0.8,
            blur_level: 0.0,
            ui_blur_level: 0.2,
            show_storyboard: true,
            lighten_during_breaks: true,
            log_level: LogLevel::Warn,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// File the configuration was loaded from; saves go back to it.
static CONFIG_FILE: std::sync::LazyLock<Mutex<PathBuf>> =
    std::sync::LazyLock::new(|| Mutex::new(PathBuf::from(CONFIG_PATH)));

#[inline(always)]
fn lock() -> MutexGuard<'static, Config> {
    CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline(always)]
fn config_file() -> PathBuf {
    CONFIG_FILE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// --- INI mapping ---

#[inline(always)]
fn parse_flag(v: &str) -> Option<bool> {
    v.trim().parse::<u8>().ok().map(|v| v != 0)
}

#[inline(always)]
fn parse_unit(v: &str) -> Option<f32> {
    v.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

#[inline(always)]
const fn flag_str(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

/// Reads `[Options]`, using defaults for missing or malformed keys.
pub fn from_ini(conf: &Ini) -> Config {
    #[inline(always)]
    fn get<'a>(conf: &'a Ini, key: &str) -> Option<&'a str> {
        conf.get_from(Some(OPTIONS), key)
    }

    let default = Config::default();

    Config {
        dim_level: get(conf, "DimLevel")
            .and_then(parse_unit)
            .unwrap_or(default.dim_level),
        blur_level: get(conf, "BlurLevel")
            .and_then(parse_unit)
            .unwrap_or(default.blur_level),
        ui_blur_level: get(conf, "UiBlurLevel")
            .and_then(parse_unit)
            .unwrap_or(default.ui_blur_level),
        show_storyboard: get(conf, "ShowStoryboard")
            .and_then(parse_flag)
            .unwrap_or(default.show_storyboard),
        lighten_during_breaks: get(conf, "LightenDuringBreaks")
            .and_then(parse_flag)
            .unwrap_or(default.lighten_during_breaks),
        log_level: get(conf, "LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level),
    }
}

/// Keys are written in alphabetical order so diffs stay stable.
pub fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    conf.with_section(Some(OPTIONS))
        .set("BlurLevel", cfg.blur_level.clamp(0.0, 1.0).to_string())
        .set("DimLevel", cfg.dim_level.clamp(0.0, 1.0).to_string())
        .set("LightenDuringBreaks", flag_str(cfg.lighten_during_breaks))
        .set("LogLevel", cfg.log_level.as_str())
        .set("ShowStoryboard", flag_str(cfg.show_storyboard))
        .set("UiBlurLevel", cfg.ui_blur_level.clamp(0.0, 1.0).to_string());
    conf
}

// --- File I/O ---

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    to_ini(&Config::default()).write_to_file(path)
}

pub fn load() {
    load_from(Path::new(CONFIG_PATH));
}

/// Loads `path` and makes it the target of every later save.
pub fn load_from(path: &Path) {
    *CONFIG_FILE.lock().unwrap_or_else(PoisonError::into_inner) = path.to_path_buf();
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(path) {
        Ok(conf) => {
            let loaded = from_ini(&conf);
            *lock() = loaded;
            info!("Configuration loaded from '{}'.", path.display());
        }
        Err(e) => {
            warn!(
                "Failed to load '{}': {e}. Using default values.",
                path.display()
            );
        }
    }
}

fn save() {
    let cfg = *lock();
    let path = config_file();
    if let Err(e) = to_ini(&cfg).write_to_file(&path) {
        warn!("Failed to save config file '{}': {e}", path.display());
    }
}

pub fn get() -> Config {
    *lock()
}

fn update_unit(value: f32, field: impl FnOnce(&mut Config) -> &mut f32) {
    if !value.is_finite() {
        return;
    }
    let clamped = value.clamp(0.0, 1.0);
    {
        let mut cfg = lock();
        let slot = field(&mut *cfg);
        if (*slot - clamped).abs() < f32::EPSILON {
            return;
        }
        *slot = clamped;
    }
    save();
}

fn update_flag(value: bool, field: impl FnOnce(&mut Config) -> &mut bool) {
    {
        let mut cfg = lock();
        let slot = field(&mut *cfg);
        if *slot == value {
            return;
        }
        *slot = value;
    }
    save();
}

pub fn update_dim_level(level: f32) {
    update_unit(level, |c| &mut c.dim_level);
}

pub fn update_blur_level(level: f32) {
    update_unit(level, |c| &mut c.blur_level);
}

pub fn update_ui_blur_level(level: f32) {
    update_unit(level, |c| &mut c.ui_blur_level);
}

pub fn update_show_storyboard(enabled: bool) {
    update_flag(enabled, |c| &mut c.show_storyboard);
}

pub fn update_lighten_during_breaks(enabled: bool) {
    update_flag(enabled, |c| &mut c.lighten_during_breaks);
}

// --- Observable settings ---

/// The user settings a background reacts to, as observable cells.
#[derive(Clone, Debug)]
pub struct BackgroundSettings {
    pub dim_level: Bindable<f32>,
    pub blur_level: Bindable<f32>,
    pub ui_blur_level: Bindable<f32>,
    pub show_storyboard: Bindable<bool>,
    pub lighten_during_breaks: Bindable<bool>,
}

impl BackgroundSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            dim_level: Bindable::new(cfg.dim_level),
            blur_level: Bindable::new(cfg.blur_level),
            ui_blur_level: Bindable::new(cfg.ui_blur_level),
            show_storyboard: Bindable::new(cfg.show_storyboard),
            lighten_during_breaks: Bindable::new(cfg.lighten_during_breaks),
        }
    }

    /// Writes every later change back to the config file. Dropping the
    /// returned subscriptions stops persisting.
    pub fn persist_on_change(&self) -> Vec<Subscription> {
        vec![
            self.dim_level.subscribe(|c| update_dim_level(c.new)),
            self.blur_level.subscribe(|c| update_blur_level(c.new)),
            self.ui_blur_level.subscribe(|c| update_ui_blur_level(c.new)),
            self.show_storyboard
                .subscribe(|c| update_show_storyboard(c.new)),
            self.lighten_during_breaks
                .subscribe(|c| update_lighten_during_breaks(c.new)),
        ]
    }
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
