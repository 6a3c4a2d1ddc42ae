//! This is a library that provides the objects and storage backends for a map
//! of festival landmarks ("pupi") and the votes that visitors cast for them.

pub mod error;
pub mod pupo;
pub mod store;
pub mod user;
pub mod vote;

pub use error::Error;
pub use error::Result;
pub use store::Database;
