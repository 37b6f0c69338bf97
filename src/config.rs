// ABOUTME: Server-wide configuration for aube.
// ABOUTME: Ports, tmp root, and default/maximum instance counts, loadable from YAML or env.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const CONFIG_FILENAME: &str = "aube.yml";

/// Process-wide configuration. Both the CP and the RP read from the same
/// `Config`, mirroring the single-binary layout described in SPEC_FULL §1.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CP admin HTTP port (`/upload`, `/scale`, `/delete`).
    pub cp_port: u16,
    /// RP admin HTTP port (function registration from the CP).
    pub rp_admin_port: u16,
    /// RP user-facing port (WebSocket invocation endpoint).
    pub rp_user_port: u16,
    /// Host the RP is reachable at from the CP's point of view.
    pub rproxy_host: String,
    /// Host the CP is reachable at from the RP's point of view.
    pub controlplane_host: String,
    /// Scratch directory root for function builds.
    pub tmp_root: PathBuf,
    /// Initial instance count for a freshly uploaded function.
    pub init_instances: u32,
    /// Maximum instance count (`maxThreads` in spec.md §3).
    pub max_instances: u32,
    /// Per-attempt timeout for the backend health probe.
    #[serde(with = "humantime_serde")]
    pub health_probe_timeout: Duration,
    /// Delay between health probe attempts.
    #[serde(with = "humantime_serde")]
    pub health_probe_backoff: Duration,
    /// Number of health probe attempts before giving up.
    pub health_probe_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cp_port: 8090,
            rp_admin_port: 8091,
            rp_user_port: 8083,
            rproxy_host: "localhost".to_string(),
            controlplane_host: "localhost".to_string(),
            tmp_root: PathBuf::from("./tmp"),
            init_instances: 1,
            max_instances: 10,
            health_probe_timeout: Duration::from_secs(3),
            health_probe_backoff: Duration::from_secs(1),
            health_probe_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::bad_request(e.to_string()))
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::transient(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Discover `aube.yml` in `dir`, falling back to defaults when absent,
    /// then apply any `AUBE_*` environment variable overrides on top.
    pub fn discover(dir: &std::path::Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILENAME);
        let mut config = if candidate.exists() {
            Self::load(&candidate)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay `AUBE_*` environment variables onto an already-loaded config,
    /// for container deployments that configure aube entirely through the
    /// environment rather than a mounted `aube.yml`.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_var("AUBE_CP_PORT")? {
            self.cp_port = parse_env("AUBE_CP_PORT", &v)?;
        }
        if let Some(v) = env_var("AUBE_RP_ADMIN_PORT")? {
            self.rp_admin_port = parse_env("AUBE_RP_ADMIN_PORT", &v)?;
        }
        if let Some(v) = env_var("AUBE_RP_USER_PORT")? {
            self.rp_user_port = parse_env("AUBE_RP_USER_PORT", &v)?;
        }
        if let Some(v) = env_var("AUBE_RPROXY_HOST")? {
            self.rproxy_host = v;
        }
        if let Some(v) = env_var("AUBE_CONTROLPLANE_HOST")? {
            self.controlplane_host = v;
        }
        if let Some(v) = env_var("AUBE_TMP_ROOT")? {
            self.tmp_root = PathBuf::from(v);
        }
        if let Some(v) = env_var("AUBE_INIT_INSTANCES")? {
            self.init_instances = parse_env("AUBE_INIT_INSTANCES", &v)?;
        }
        if let Some(v) = env_var("AUBE_MAX_INSTANCES")? {
            self.max_instances = parse_env("AUBE_MAX_INSTANCES", &v)?;
        }
        Ok(())
    }

    pub fn cp_base_url(&self) -> String {
        format!("http://{}:{}", self.controlplane_host, self.cp_port)
    }

    pub fn rp_admin_base_url(&self) -> String {
        format!("http://{}:{}", self.rproxy_host, self.rp_admin_port)
    }

    pub fn public_invoke_url(&self, name: &str) -> String {
        format!("http://{}:{}/{}", self.rproxy_host, self.rp_user_port, name)
    }
}

fn env_var(key: &str) -> Result<Option<String>> {
    match std::env::var(key) {
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::bad_request(format!("{key}: {e}"))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::bad_request(format!("{key}: invalid value {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_ports() {
        let config = Config::default();
        assert_eq!(config.cp_port, 8090);
        assert_eq!(config.rp_admin_port, 8091);
        assert_eq!(config.rp_user_port, 8083);
        assert_eq!(config.init_instances, 1);
        assert_eq!(config.max_instances, 10);
    }

    #[test]
    fn discover_falls_back_to_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.cp_port, 8090);
    }

    #[test]
    fn from_yaml_overrides_selected_fields() {
        let yaml = "cp_port: 9090\nmax_instances: 20\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.cp_port, 9090);
        assert_eq!(config.max_instances, 20);
        // unspecified fields keep their default
        assert_eq!(config.rp_admin_port, 8091);
    }

    #[test]
    fn public_invoke_url_shape() {
        let config = Config::default();
        assert_eq!(config.public_invoke_url("echo"), "http://localhost:8083/echo");
    }

    #[test]
    fn env_override_wins_over_yaml_and_default() {
        // SAFETY: test-only, scoped to this process and cleaned up below.
        unsafe {
            std::env::set_var("AUBE_CP_PORT", "9999");
            std::env::set_var("AUBE_RPROXY_HOST", "rp.internal");
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "cp_port: 9090\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.cp_port, 9999);
        assert_eq!(config.rproxy_host, "rp.internal");

        unsafe {
            std::env::remove_var("AUBE_CP_PORT");
            std::env::remove_var("AUBE_RPROXY_HOST");
        }
    }

    #[test]
    fn invalid_env_override_is_bad_request() {
        unsafe {
            std::env::set_var("AUBE_MAX_INSTANCES", "not-a-number");
        }
        let err = Config::default().apply_env_overrides().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadRequest);
        unsafe {
            std::env::remove_var("AUBE_MAX_INSTANCES");
        }
    }
}
