pub mod logging;

pub mod collector;
pub mod config;
pub mod error;
pub mod liveness;
pub mod process_tree;
pub mod record_parser;
pub mod sample;
pub mod session;

pub use collector::*;
pub use config::*;
pub use error::*;
pub use liveness::*;
pub use process_tree::*;
pub use record_parser::*;
pub use sample::*;
pub use session::*;
