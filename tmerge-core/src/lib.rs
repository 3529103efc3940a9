pub mod bencode;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod pieces;
pub mod plan;
pub mod progress;
pub mod repair;
pub mod scan;
pub mod verify;

pub use error::{Error, Result};
