//! The Plaudit node: wires storage, the ledger, the verifier and the
//! housekeeping tasks together.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use plaudit_ledger::Ledger;
use plaudit_store::{KvStore, StoreError};
use plaudit_store_lmdb::{LmdbEnvironment, LmdbKvStore};
use plaudit_types::{Clock, OsTokenSource, SystemClock, TokenSource};
use plaudit_verification::IdentityVerifier;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::housekeeping::{spawn_purge_task, spawn_reconcile_task};
use crate::metrics::NodeMetrics;
use crate::service::{EndorsementService, ServiceOptions};
use crate::shutdown::ShutdownController;

pub struct PlauditNode {
    config: NodeConfig,
    service: EndorsementService,
    shutdown: ShutdownController,
    tasks: Vec<JoinHandle<()>>,
    // Keeps the LMDB environment open for the node's lifetime.
    _environment: Option<LmdbEnvironment>,
}

impl PlauditNode {
    /// Open the LMDB store under `config.data_dir` and build the node with
    /// the system clock and OS randomness.
    pub fn open(config: NodeConfig, verifier: Arc<dyn IdentityVerifier>) -> Result<Self, NodeError> {
        config.validate()?;
        let environment =
            LmdbEnvironment::open(&config.data_dir, config.map_size).map_err(StoreError::from)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let kv: Arc<dyn KvStore> = Arc::new(LmdbKvStore::new(&environment, clock.clone()));
        tracing::info!(path = %environment.path().display(), "store opened");

        let mut node = Self::with_parts(config, kv, clock, Arc::new(OsTokenSource), verifier)?;
        node._environment = Some(environment);
        Ok(node)
    }

    /// Build a node over caller-supplied infrastructure (tests, other backends).
    pub fn with_parts(
        config: NodeConfig,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let ledger = Ledger::new(kv, clock, tokens.clone(), &config.ledger_config());
        let service = EndorsementService::new(
            ledger,
            verifier,
            tokens,
            Arc::new(NodeMetrics::new()),
            ServiceOptions::from_config(&config),
        );
        Ok(Self {
            config,
            service,
            shutdown: ShutdownController::new(),
            tasks: Vec::new(),
            _environment: None,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn service(&self) -> &EndorsementService {
        &self.service
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Start the periodic purge and, when configured, reconciliation.
    pub fn start_housekeeping(&mut self) {
        if self.config.purge_interval_secs > 0 {
            self.tasks.push(spawn_purge_task(
                self.service.clone(),
                Duration::from_secs(self.config.purge_interval_secs),
                self.shutdown.subscribe(),
            ));
        }
        if let Some(secs) = self.config.reconcile_interval_secs {
            self.tasks.push(spawn_reconcile_task(
                self.service.clone(),
                Duration::from_secs(secs),
                self.shutdown.subscribe(),
            ));
        }
        tracing::info!(
            backend = self.service.backend_name(),
            verifier = self.service.verifier_name(),
            tasks = self.tasks.len(),
            "housekeeping started"
        );
    }

    /// Signal shutdown and wait for the housekeeping tasks to finish.
    pub async fn stop(&mut self) {
        self.shutdown.shutdown();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "housekeeping task ended abnormally");
            }
        }
        tracing::info!("node stopped");
    }
}
