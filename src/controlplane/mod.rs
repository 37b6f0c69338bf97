// ABOUTME: Control Plane core — upload pipeline, scale endpoint, RP registration (spec.md §4.5).
// ABOUTME: Owns the function-handlers map; the RP never issues engine RPCs itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::http_client;

pub struct ControlPlane {
    backend: Backend,
    functions: Mutex<HashMap<String, Arc<Function>>>,
    config: Arc<Config>,
}

impl ControlPlane {
    pub fn new(backend: Backend, config: Arc<Config>) -> Self {
        Self {
            backend,
            functions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// `Upload(name, base64ZipPayload)` (spec.md §4.5).
    async fn upload(&self, name: &str, zip_b64: &str) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(zip_b64)
            .map_err(|e| Error::bad_request(format!("invalid base64: {e}")))?;

        let unique_id = Uuid::new_v4();
        let zip_path = self.config.tmp_root.join(format!("{unique_id}.zip"));
        let extract_dir = self.config.tmp_root.join(unique_id.to_string());
        extract_zip(&zip_path, &extract_dir, &bytes).await?;

        let mut guard = self.functions.lock().await;
        let old = guard.get(name).cloned();

        let new_function = match self
            .backend
            .create(
                name,
                &extract_dir,
                self.config.init_instances,
                self.config.max_instances,
            )
            .await
        {
            Ok(f) => f,
            Err(e) => {
                cleanup_extraction(&zip_path, &extract_dir).await;
                return Err(e);
            }
        };

        if let Err(e) = new_function.handler.start().await {
            new_function.handler.destroy().await.ok();
            cleanup_extraction(&zip_path, &extract_dir).await;
            return Err(e);
        }

        let new_handler = new_function.handler.clone();
        guard.insert(name.to_string(), Arc::new(new_function));
        drop(guard);

        let register_url = format!("{}/", self.config.rp_admin_base_url());
        let register_body = AdminInstall {
            name: name.to_string(),
            ips: new_handler.ips().await,
        };
        let (status, _): (_, Option<serde_json::Value>) =
            http_client::post_json(&register_url, &register_body).await?;
        if !status.is_success() {
            return Err(Error::upstream(format!(
                "rp registration for {name} failed with status {status}"
            )));
        }

        if let Some(old_function) = old {
            old_function.handler.destroy().await.ok();
        }

        cleanup_extraction(&zip_path, &extract_dir).await;

        Ok(self.config.public_invoke_url(name))
    }

    /// `Scale(name, amount)` (spec.md §4.5).
    async fn scale(&self, name: &str, amount: u32) -> Result<Vec<String>> {
        let handler = {
            let guard = self.functions.lock().await;
            guard
                .get(name)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("function {name} not found")))?
                .handler
                .clone()
        };

        let pre: std::collections::HashSet<String> = handler.ips().await.into_iter().collect();
        for _ in 0..amount {
            let id = handler.add().await?;
            handler.start_container(&id).await?;
        }
        let post = handler.ips().await;
        Ok(post.into_iter().filter(|ip| !pre.contains(ip)).collect())
    }

    /// `CP.Stop()`: destroy every registered function's fleet (spec.md §6, §9).
    pub async fn stop(&self) -> Result<()> {
        let handlers: Vec<_> = {
            let mut guard = self.functions.lock().await;
            guard.drain().map(|(_, f)| f).collect()
        };
        futures::future::join_all(handlers.iter().map(|f| f.handler.destroy())).await;
        self.backend.stop().await
    }
}

async fn extract_zip(zip_path: &Path, extract_dir: &Path, bytes: &[u8]) -> Result<()> {
    let zip_path = zip_path.to_path_buf();
    let extract_dir = extract_dir.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> Result<()> {
        std::fs::create_dir_all(zip_path.parent().unwrap())
            .map_err(|e| Error::transient(e.to_string()))?;
        std::fs::write(&zip_path, &bytes).map_err(|e| Error::transient(e.to_string()))?;

        let file = std::fs::File::open(&zip_path).map_err(|e| Error::transient(e.to_string()))?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| Error::bad_request(e.to_string()))?;
        archive
            .extract(&extract_dir)
            .map_err(|e| Error::bad_request(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::transient(e.to_string()))?
}

async fn cleanup_extraction(zip_path: &Path, extract_dir: &Path) {
    let zip_path = zip_path.to_path_buf();
    let extract_dir = extract_dir.to_path_buf();
    let _ = tokio::task::spawn_blocking(move || {
        let _ = std::fs::remove_file(&zip_path);
        let _ = std::fs::remove_dir_all(&extract_dir);
    })
    .await;
}

#[derive(Serialize)]
struct AdminInstall {
    name: String,
    ips: Vec<String>,
}

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    zip: String,
}

#[derive(Deserialize)]
struct ScaleRequest {
    name: String,
    amount: u32,
}

#[derive(Serialize)]
struct ScaleResponse {
    ips: Vec<String>,
}

pub fn router(cp: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/upload", post(handle_upload))
        .route("/scale", post(handle_scale))
        .route("/delete", post(handle_delete))
        .with_state(cp)
}

async fn handle_upload(
    State(cp): State<Arc<ControlPlane>>,
    axum::Json(request): axum::Json<UploadRequest>,
) -> Response {
    match cp.upload(&request.name, &request.zip).await {
        Ok(url) => (StatusCode::OK, format!("{url}\n")).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_scale(
    State(cp): State<Arc<ControlPlane>>,
    axum::Json(request): axum::Json<ScaleRequest>,
) -> Response {
    match cp.scale(&request.name, request.amount).await {
        Ok(ips) => axum::Json(ScaleResponse { ips }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_delete() -> Response {
    StatusCode::NOT_IMPLEMENTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::testutil::MockEngine;
    use base64::Engine as _;

    async fn spawn_fake_rp_admin() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let router = Router::new().route("/", post(|| async { StatusCode::OK }));
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        port
    }

    fn sample_zip() -> String {
        let mut bytes = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut bytes));
            writer
                .start_file("main.py", zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut writer, b"print('hi')").unwrap();
            writer.finish().unwrap();
        }
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    async fn control_plane() -> (Arc<ControlPlane>, tempfile::TempDir) {
        let rp_port = spawn_fake_rp_admin().await;
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.rproxy_host = "127.0.0.1".to_string();
        config.rp_admin_port = rp_port;
        config.tmp_root = tmp.path().to_path_buf();
        config.init_instances = 1;
        config.max_instances = 3;
        let config = Arc::new(config);
        let engine: Arc<dyn crate::runtime::traits::EngineClient> =
            Arc::new(MockEngine::default());
        let backend = Backend::new(engine, config.clone());
        (Arc::new(ControlPlane::new(backend, config)), tmp)
    }

    #[tokio::test]
    async fn upload_then_scale_round_trip() {
        let (cp, _tmp) = control_plane().await;
        let url = cp.upload("echo", &sample_zip()).await.unwrap();
        assert!(url.contains("/echo"));

        let new_ips = cp.scale("echo", 1).await.unwrap();
        assert_eq!(new_ips.len(), 1);
    }

    #[tokio::test]
    async fn scale_of_unknown_function_is_not_found() {
        let (cp, _tmp) = control_plane().await;
        let err = cp.scale("nope", 1).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reupload_destroys_old_handler_after_registration() {
        let (cp, _tmp) = control_plane().await;
        cp.upload("echo", &sample_zip()).await.unwrap();
        cp.upload("echo", &sample_zip()).await.unwrap();
        // Both uploads succeeded; only the latest remains registered.
        let guard = cp.functions.lock().await;
        assert_eq!(guard.len(), 1);
    }
}
