pub mod beatmap_background;
pub mod dimmable_background;
pub mod user_dim;
