pub mod directory;

pub use directory::{CategoryDirectory, DirectoryError, OwnerDirectory, StaticDirectory};
