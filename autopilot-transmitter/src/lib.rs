pub mod camera;
pub mod config;
pub mod control;
pub mod estimation;
pub mod input;
pub mod output;
pub mod shared_core_values;
pub mod util;
