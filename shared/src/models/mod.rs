//! Domain models for the Pescadería Huina back office

mod product;
mod sale;

pub use product::*;
pub use sale::*;
