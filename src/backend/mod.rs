pub mod chapters;
pub mod filters;
pub mod localize;
pub mod mangadex;
pub mod models;
pub mod proxy;
pub mod retry;
