//! `officehunt` - An office scavenger hunt backed by a vision model
//!
//! Players photograph a sequence of office objects. Each photo is
//! downsampled and judged by a hosted vision model; progress is saved after
//! every find. When the model cannot be reached the hunt keeps going and the
//! find is marked as offline.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod camera;
pub mod capture;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod game;
pub mod items;
pub mod logging;
pub mod photos;
pub mod server;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use classify::{Classification, Classifier};
pub use config::Config;
pub use error::{Error, Result};
pub use game::{Hunt, Phase, Summary};
pub use items::{Catalog, TargetItem};
pub use logging::init_logging;
pub use session::HuntSession;
pub use storage::{Storage, StorageStats};
