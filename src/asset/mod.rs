//! Game assets: downloadable files with a catalogue entry.

mod repository;
mod store;
mod types;

pub use repository::AssetRepository;
pub use store::AssetStore;
pub use types::{Asset, AssetUpdate, NewAsset};
