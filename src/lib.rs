// Clippy configuration: focus on correctness, not style.
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::manual_map)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::len_zero)]

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod time;

pub use data::Value;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
