//! User directory - account lookup and the admin capability check.

pub mod directory;
pub mod model;

pub use directory::{DirectoryError, MemoryUserDirectory, UserDirectory};
pub use model::{Role, UserAccount};
