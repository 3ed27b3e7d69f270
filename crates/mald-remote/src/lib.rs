mod classifier;
pub use classifier::HttpClassifier;

mod blob;
pub use blob::{HttpBlobStore, LocalBlobStore};

mod errors;
pub use errors::RemoteError;
