pub mod aggregator;
pub mod alignment;
pub mod config;
pub mod data_loader;
pub mod displacement;
pub mod error;
pub mod grid;
pub mod heatmap;
pub mod io;
pub mod kdtree;
pub mod landmarks;
pub mod mask;
pub mod reference;
pub mod session;
pub mod stabilizer;
pub mod synthetic;
pub mod tracker;
pub mod types;
pub mod visualization;

pub use error::{Error, Result};
