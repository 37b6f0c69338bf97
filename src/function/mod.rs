// ABOUTME: Function — the Control Plane's record of one deployed function and its handler.
// ABOUTME: Wraps FunctionHandler with the naming/identity concerns from spec.md §4.1, §4.3.

pub mod handler;
pub mod instance;
#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::runtime::traits::EngineClient;
use crate::types::{FunctionId, NetworkId};

pub use handler::FunctionHandler;
pub use instance::{ContainerInstance, InstanceState};

/// A deployed function: its identity, its private network, and the handler
/// that owns its container fleet.
///
/// The unique id is `<name>-<uuid>` (spec.md §4.1: "each upload gets a fresh
/// unique id so a redeploy never collides with the version it replaces"),
/// and doubles as the image tag and the network name.
pub struct Function {
    pub name: String,
    pub id: FunctionId,
    pub handler: Arc<FunctionHandler>,
}

impl Function {
    /// Allocate a fresh unique id and handler for a newly uploaded function.
    /// Does not create the network or any containers; callers drive that
    /// through the returned handler after creating the network themselves.
    pub fn new(
        name: String,
        max_instances: u32,
        engine: Arc<dyn EngineClient>,
        config: Arc<Config>,
    ) -> Self {
        let unique = format!("{name}-{}", Uuid::new_v4());
        let id = FunctionId::new(unique.clone());
        let network_id = NetworkId::new(unique.clone());
        let handler = Arc::new(FunctionHandler::new(
            id.clone(),
            network_id,
            unique,
            max_instances,
            engine,
            config,
        ));
        Self { name, id, handler }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::testutil::MockEngine;

    #[test]
    fn new_derives_image_tag_and_network_from_unique_id() {
        let f = Function::new(
            "echo".to_string(),
            10,
            Arc::new(MockEngine::default()),
            Arc::new(Config::default()),
        );
        assert!(f.id.as_str().starts_with("echo-"));
        assert_eq!(f.handler.image_tag, f.id.to_string());
        assert_eq!(f.handler.network_id.to_string(), f.id.to_string());
    }
}
