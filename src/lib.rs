pub mod config;
pub mod dates;
pub mod entities;
pub mod extractor;
pub mod matcher;
pub mod normalize;
pub mod store;

pub use entities::{Offer, OfferSource, RawOffer, Settings};
pub use store::{OfferStore, StorageBackend};
