pub mod conflict;
pub mod exclude;
pub mod front_matter;
pub mod hash;
pub mod note;
pub mod version;

mod error;

pub use error::{Error, Result};
