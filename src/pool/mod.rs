// ABOUTME: FunctionPool and Registry — the Reverse-Proxy's view of a function's free/used IPs.
// ABOUTME: spec.md §4.3, §5: exclusive lock per pool, read-write lock over the name->pool map.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client;

struct PoolState {
    free_ips: Vec<String>,
    used_ips: HashSet<String>,
}

/// One function's free/used container-IP pool (spec.md §4.3).
///
/// `acquire`/`release` form the hot path; both run under the pool's single
/// lock, which is held across the scale-out round trip in `acquire` so two
/// concurrent callers never both observe an empty free list and both dial
/// the Control Plane (spec.md §5: "the pool is locked for the whole
/// check-empty/scale/select/move sequence").
pub struct FunctionPool {
    pub name: String,
    state: Mutex<PoolState>,
    config: Arc<Config>,
}

#[derive(Serialize)]
struct ScaleRequest<'a> {
    name: &'a str,
    amount: u32,
}

#[derive(Deserialize)]
struct ScaleResponse {
    ips: Vec<String>,
}

impl FunctionPool {
    pub fn new(name: String, initial_ips: Vec<String>, config: Arc<Config>) -> Self {
        Self {
            name,
            state: Mutex::new(PoolState {
                free_ips: initial_ips,
                used_ips: HashSet::new(),
            }),
            config,
        }
    }

    /// Hand out one free IP, scaling the function out by one instance first
    /// if the free list is empty.
    pub async fn acquire(&self) -> Result<String> {
        let mut guard = self.state.lock().await;
        if guard.free_ips.is_empty() {
            let scaled = self.scale_out().await?;
            guard.free_ips.extend(scaled);
        }
        if guard.free_ips.is_empty() {
            return Err(Error::transient(format!(
                "function {} produced no new instances on scale-out",
                self.name
            )));
        }
        let index = rand::thread_rng().gen_range(0..guard.free_ips.len());
        let ip = guard.free_ips.remove(index);
        guard.used_ips.insert(ip.clone());
        Ok(ip)
    }

    /// Return `ip` to the free list. Errors if `ip` was not checked out.
    pub async fn release(&self, ip: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        if !guard.used_ips.remove(ip) {
            return Err(Error::conflict(format!(
                "ip {ip} is not currently in use by function {}",
                self.name
            )));
        }
        guard.free_ips.push(ip.to_string());
        Ok(())
    }

    /// Append freshly provisioned IPs to the free list, deduplicating
    /// against both the free and used lists (Open Question 4).
    pub async fn add_ips(&self, ips: Vec<String>) {
        let mut guard = self.state.lock().await;
        for ip in ips {
            if !guard.free_ips.contains(&ip) && !guard.used_ips.contains(&ip) {
                guard.free_ips.push(ip);
            }
        }
    }

    async fn scale_out(&self) -> Result<Vec<String>> {
        let url = format!("{}/scale", self.config.cp_base_url());
        let body = ScaleRequest {
            name: &self.name,
            amount: 1,
        };
        let (status, decoded): (_, Option<ScaleResponse>) =
            http_client::post_json(&url, &body).await?;
        if !status.is_success() {
            return Err(Error::upstream(format!(
                "control plane scale-out for {} failed with status {status}",
                self.name
            )));
        }
        Ok(decoded.map(|r| r.ips).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) async fn free_count(&self) -> usize {
        self.state.lock().await.free_ips.len()
    }

    #[cfg(test)]
    pub(crate) async fn used_count(&self) -> usize {
        self.state.lock().await.used_ips.len()
    }
}

/// The Reverse-Proxy's name -> pool map (spec.md §4.3, §5).
///
/// Guarded by a read-write lock: lookups (the hot path, one per dispatched
/// request) take a read lock; install/remove (admin calls from the Control
/// Plane) take a write lock. Each name maps to at most one pool — installing
/// over an existing name replaces it outright (last-writer-wins).
pub struct Registry {
    pools: RwLock<std::collections::HashMap<String, Arc<FunctionPool>>>,
    config: Arc<Config>,
}

impl Registry {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            pools: RwLock::new(std::collections::HashMap::new()),
            config,
        }
    }

    /// Install (or replace) the pool for `name` with `ips` as its initial
    /// free list.
    pub async fn install(&self, name: String, ips: Vec<String>) -> Arc<FunctionPool> {
        let pool = Arc::new(FunctionPool::new(name.clone(), ips, self.config.clone()));
        self.pools.write().await.insert(name, pool.clone());
        pool
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<FunctionPool>> {
        self.pools.read().await.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<FunctionPool>> {
        self.pools.write().await.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<Config> {
        Arc::new(Config::default())
    }

    #[tokio::test]
    async fn acquire_and_release_round_trip() {
        let pool = FunctionPool::new(
            "echo".to_string(),
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            config(),
        );
        let ip = pool.acquire().await.unwrap();
        assert_eq!(pool.free_count().await, 1);
        assert_eq!(pool.used_count().await, 1);
        pool.release(&ip).await.unwrap();
        assert_eq!(pool.free_count().await, 2);
        assert_eq!(pool.used_count().await, 0);
    }

    #[tokio::test]
    async fn release_of_unchecked_out_ip_is_conflict() {
        let pool = FunctionPool::new("echo".to_string(), vec!["10.0.0.1".to_string()], config());
        let err = pool.release("10.0.0.9").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn add_ips_deduplicates_against_free_and_used() {
        let pool = FunctionPool::new("echo".to_string(), vec!["10.0.0.1".to_string()], config());
        let _ = pool.acquire().await.unwrap();
        pool.add_ips(vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()])
            .await;
        // 10.0.0.1 is in used_ips, 10.0.0.2 is new: only the latter appends.
        assert_eq!(pool.free_count().await, 1);
    }

    #[tokio::test]
    async fn registry_install_replaces_previous_pool() {
        let registry = Registry::new(config());
        let first = registry.install("echo".to_string(), vec!["10.0.0.1".to_string()]).await;
        let second = registry
            .install("echo".to_string(), vec!["10.0.0.2".to_string()])
            .await;
        assert!(!Arc::ptr_eq(&first, &second));
        let looked_up = registry.lookup("echo").await.unwrap();
        assert!(Arc::ptr_eq(&looked_up, &second));
    }

    #[tokio::test]
    async fn registry_lookup_of_unknown_name_is_none() {
        let registry = Registry::new(config());
        assert!(registry.lookup("missing").await.is_none());
    }
}

#[cfg(test)]
mod pool_invariants {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Acquire), Just(Op::Release)]
    }

    proptest! {
        // Invariants 1 & 2 (spec.md §8): free/used stay disjoint, and no ip
        // is ever handed out to two acquirers at once. Driven over a pool
        // sized so it never needs to scale out, since a live CP is out of
        // scope for a property test (scale-out coalescing is covered
        // separately in `tests/scale_coalescing.rs`).
        #[test]
        fn free_and_used_never_overlap_and_no_double_hand_out(
            ops in prop::collection::vec(op_strategy(), 1..100)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let ips: Vec<String> = (0..16).map(|n| format!("10.9.0.{n}")).collect();
                let pool = FunctionPool::new("prop-echo".to_string(), ips, Arc::new(Config::default()));
                let mut held: Vec<String> = Vec::new();

                for op in ops {
                    match op {
                        Op::Acquire => {
                            if pool.free_count().await == 0 {
                                continue;
                            }
                            let ip = pool.acquire().await.unwrap();
                            prop_assert!(!held.contains(&ip), "ip {} handed out twice", ip);
                            held.push(ip);
                        }
                        Op::Release => {
                            if let Some(ip) = held.pop() {
                                pool.release(&ip).await.unwrap();
                            }
                        }
                    }
                    let free = pool.free_count().await;
                    let used = pool.used_count().await;
                    prop_assert_eq!(used, held.len());
                    prop_assert_eq!(free + used, 16);
                }
                Ok(())
            })?;
        }
    }
}
