pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod stylize;
pub mod processing {
    pub mod blend;
    pub mod buffer;
    pub mod gradient;
    pub mod normalize;
}
pub mod tasks {
    pub mod stylizer;
}
