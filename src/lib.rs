//! Share a directory over HTTP: browse, download, search and single-file upload.

pub mod config;
pub mod error;
pub mod listing;
pub mod pages;
pub mod resolve;
pub mod routes;
pub mod upload;

pub use config::{Args, Config};
pub use error::ShareError;
pub use listing::{list, DirectoryEntry, EntryKind, Listing, ListingError};
pub use resolve::resolve;
pub use routes::router;
pub use upload::{StoredUpload, UploadError, UploadReceiver};
