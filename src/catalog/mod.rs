pub mod api;
pub mod models;

pub use api::{CatalogClient, ResolveError};
pub use models::{Playlist, Source, TopList, Track, TrackKey};
