pub mod rigid;

pub use rigid::*;
