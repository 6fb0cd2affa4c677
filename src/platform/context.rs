//! The shared handle threaded through every service and the admin HTTP
//! surface: one broker connection and one instance of each subsystem,
//! fronted by a cloneable `Arc`-backed struct
//! `PlatformContext` shape.

use std::sync::Arc;

use orchestrator_broker::Broker;
use orchestrator_hooks::{ChainRegistry, ExecutionHistory, HookExecutor, HookRegistry};
use orchestrator_retry::RetryEngine;
use orchestrator_router::Router;
use orchestrator_runtime::QueueFabric;
use orchestrator_txlog::{CleanupJob, TransactionLogger, TxLogQuery};
use tokio_util::sync::CancellationToken;

use crate::platform::config::PlatformConfig;

#[derive(Clone)]
pub struct PlatformContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    config: PlatformConfig,
    broker: Arc<dyn Broker>,
    queue_fabric: Arc<QueueFabric>,
    hook_registry: Arc<HookRegistry>,
    hook_executor: Arc<HookExecutor>,
    chain_registry: Arc<ChainRegistry>,
    retry_engine: Arc<RetryEngine>,
    router: Arc<Router>,
    txlog: Arc<TransactionLogger>,
    txlog_query: Arc<TxLogQuery>,
    txlog_cleanup: Arc<CleanupJob>,
}

impl PlatformContext {
    pub fn new(config: PlatformConfig, broker: Arc<dyn Broker>, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let hook_registry = Arc::new(HookRegistry::new(broker.clone()));
        let history = Arc::new(ExecutionHistory::new(broker.clone()));
        let hook_executor = Arc::new(HookExecutor::new(hook_registry.clone(), history));
        let chain_registry = Arc::new(ChainRegistry::default());
        let retry_engine = Arc::new(RetryEngine::new(broker.clone(), config.retry_config()));
        let router = Arc::new(Router::new(broker.clone()));
        let queue_fabric = Arc::new(QueueFabric::new(broker.clone()));
        let txlog = Arc::new(TransactionLogger::new(broker.clone(), config.txlog_config())?);
        let txlog_query = Arc::new(TxLogQuery::new(broker.clone()));
        let txlog_cleanup = Arc::new(CleanupJob::new(
            broker.clone(),
            config.txlog.retention_days,
            config.txlog.file_sink_dir.clone().map(std::path::PathBuf::from),
        ));

        for (id, settings) in &config.agents {
            router.register_agent(settings.to_agent(id));
        }

        Ok(Self {
            shared: Arc::new(SharedState {
                config,
                broker,
                queue_fabric,
                hook_registry,
                hook_executor,
                chain_registry,
                retry_engine,
                router,
                txlog,
                txlog_query,
                txlog_cleanup,
            }),
            shutdown,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.shared.config
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        self.shared.broker.clone()
    }

    pub fn queue_fabric(&self) -> Arc<QueueFabric> {
        self.shared.queue_fabric.clone()
    }

    pub fn hook_registry(&self) -> Arc<HookRegistry> {
        self.shared.hook_registry.clone()
    }

    pub fn hook_executor(&self) -> Arc<HookExecutor> {
        self.shared.hook_executor.clone()
    }

    pub fn chain_registry(&self) -> Arc<ChainRegistry> {
        self.shared.chain_registry.clone()
    }

    pub fn retry_engine(&self) -> Arc<RetryEngine> {
        self.shared.retry_engine.clone()
    }

    pub fn router(&self) -> Arc<Router> {
        self.shared.router.clone()
    }

    pub fn txlog(&self) -> Arc<TransactionLogger> {
        self.shared.txlog.clone()
    }

    pub fn txlog_query(&self) -> Arc<TxLogQuery> {
        self.shared.txlog_query.clone()
    }

    pub fn txlog_cleanup(&self) -> Arc<CleanupJob> {
        self.shared.txlog_cleanup.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
