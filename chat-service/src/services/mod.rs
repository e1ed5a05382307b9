pub mod generator;
pub mod persona;
pub mod providers;

pub use generator::{is_retryable, ExhaustionPolicy, ResilientGenerator};
pub use persona::load_persona;
