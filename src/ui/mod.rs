pub mod actors;
pub mod anim;
pub mod components;
