extern crate serde;

pub mod config;
pub mod correlation;
pub mod encode;
pub mod error;
pub mod impute;
pub mod inspect;
pub mod io;
pub mod monitor;
pub mod normalize;
pub mod pipeline;
pub mod prune;
pub mod records;
pub mod schema;
pub mod train;

pub use error::{KidneyError, Result};
