// ABOUTME: Composable capability traits for the container engine adapter (Backend).
// ABOUTME: Defines ImageOps, ContainerOps, NetworkOps, LogOps, RuntimeInfo.

mod container;
mod image;
mod logs;
mod network;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogOps, LogOptions, LogStream};
pub use network::{NetworkError, NetworkOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Full engine capability set — the `Backend` capability sets named in
/// spec.md §9 ("Interface polymorphism"). Auto-implemented for any type that
/// implements all the required traits.
pub trait EngineClient: ImageOps + ContainerOps + NetworkOps + LogOps + RuntimeInfo {}

impl<T> EngineClient for T where T: ImageOps + ContainerOps + NetworkOps + LogOps + RuntimeInfo {}
