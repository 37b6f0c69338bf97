// ABOUTME: Backend — the container-engine adapter's orchestration layer (spec.md §4.1).
// ABOUTME: Drives the build pipeline, network creation, and initial provisioning for Create.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::runtime::build;
use crate::runtime::traits::{EngineClient, NetworkConfig};

/// The container-engine adapter. Owns no state of its own beyond the engine
/// client and config; every function it creates owns its own artifacts.
pub struct Backend {
    engine: Arc<dyn EngineClient>,
    config: Arc<Config>,
}

impl Backend {
    pub fn new(engine: Arc<dyn EngineClient>, config: Arc<Config>) -> Self {
        Self { engine, config }
    }

    /// Build an image from `source_dir`, create a private network, and
    /// provision `init_n` created-but-not-started instances (spec.md §4.1).
    ///
    /// Failure at any step returns an error after best-effort cleanup of
    /// whatever was already created.
    pub async fn create(
        &self,
        name: &str,
        source_dir: &Path,
        init_n: u32,
        max_n: u32,
    ) -> Result<Function> {
        let function = Function::new(name.to_string(), max_n, self.engine.clone(), self.config.clone());
        let unique_id = function.id.to_string();

        if let Err(e) =
            build::build_and_tag(self.engine.as_ref(), &self.config.tmp_root, &unique_id, source_dir)
                .await
        {
            return Err(e);
        }

        let network_config = NetworkConfig {
            name: function.handler.network_id.to_string(),
            driver: None,
            labels: HashMap::from([("aube.function".to_string(), unique_id.clone())]),
        };
        if let Err(e) = self.engine.create_network(&network_config).await {
            if let Err(cleanup_err) = self.engine.remove_image(&unique_id, true).await {
                tracing::warn!("failed to clean up image {}: {}", unique_id, cleanup_err);
            }
            return Err(Error::engine_failure(e.to_string()));
        }

        if let Err(e) = function.handler.provision(init_n).await {
            function.handler.destroy().await.ok();
            return Err(e);
        }

        if max_n < init_n {
            tracing::warn!(
                "function {} requested max_instances {} below init_instances {}",
                name,
                max_n,
                init_n
            );
        }

        Ok(function)
    }

    /// Tear down backend-wide resources. Optional in v1 (spec.md §4.1):
    /// per-function teardown happens through `FunctionHandler::destroy`.
    pub async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
