// ABOUTME: Container engine adapter — the `Backend` of spec.md §4.1.
// ABOUTME: Composable capability traits plus a bollard-backed implementation and build pipeline.

mod bollard;
pub mod build;
mod error;
pub mod traits;

pub use bollard::BollardBackend;
pub use error::RuntimeError;
pub use traits::EngineClient;
