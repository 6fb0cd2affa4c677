//! Boots every background service the platform needs — per-agent task
//! cycles, the retry engine's processing/housekeeping/analysis loops, the
//! transaction logger's flush loop and daily cleanup, telemetry, and the
//! admin HTTP surface — as `ServiceRegistration`s spawned under a shared
//! `CancellationToken` driving a `Platform`/`PlatformRuntime`
//! shutdown-propagation pattern.

use std::sync::Arc;

use anyhow::Result;
use orchestrator_broker::{InMemoryBroker, RedisBroker};
use orchestrator_hooks::builtin::{self, PredictiveRouterHook};
use orchestrator_hooks::HookKind;
use orchestrator_runtime::{AgentRuntime, AgentRuntimeConfig, ModelClient, NullModelClient};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::platform::admin::admin_service;
use crate::platform::config::PlatformConfig;
use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;
use crate::platform::telemetry::telemetry_service;

pub struct Platform {
    config: PlatformConfig,
    services: Vec<ServiceRegistration>,
    model_client: Arc<dyn ModelClient>,
}

impl Platform {
    pub fn new(config: PlatformConfig) -> Self {
        let mut services = Vec::new();
        services.push(telemetry_service(config.observability.clone()));
        Self { config, services, model_client: Arc::new(NullModelClient) }
    }

    /// Overrides the model client every agent runtime dispatches through.
    /// Production wiring would supply a real provider client here; the
    /// default `NullModelClient` is only appropriate for smoke-testing the
    /// rest of the pipeline without a model behind it.
    pub fn with_model_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.model_client = client;
        self
    }

    pub fn register_service(&mut self, service: ServiceRegistration) {
        self.services.push(service);
    }

    async fn build_broker(&self) -> Result<Arc<dyn orchestrator_broker::Broker>> {
        if self.config.broker.in_memory {
            info!("using in-memory broker (broker.in_memory=true)");
            Ok(Arc::new(InMemoryBroker::new()))
        } else {
            info!(url = %self.config.broker.url, "connecting to broker");
            Ok(Arc::new(RedisBroker::connect(&self.config.broker.url).await?))
        }
    }

    pub async fn start(self) -> Result<PlatformRuntime> {
        initialize_logging(&self.config);

        let root_token = CancellationToken::new();
        let broker = self.build_broker().await?;
        let context = PlatformContext::new(self.config.clone(), broker, root_token.child_token())?;

        if self.config.hooks.enabled {
            register_hooks(&context)?;
        }

        let mut tasks: Vec<(String, JoinHandle<Result<()>>)> = Vec::new();
        let mut services = self.services;
        if self.config.admin.enabled {
            services.push(admin_service(self.config.admin.clone()));
        }

        for service in services {
            let handle = service.spawn(context.clone(), root_token.child_token());
            tasks.push((service.name().to_string(), handle));
        }

        {
            let engine = context.retry_engine();
            let token = root_token.child_token();
            tasks.push(("retry-engine".to_string(), tokio::spawn(async move { engine.run(token).await })));
        }
        {
            let logger = context.txlog();
            let token = root_token.child_token();
            tasks.push(("txlog-flush".to_string(), tokio::spawn(async move { logger.run(token).await })));
        }
        {
            let cleanup = context.txlog_cleanup();
            let token = root_token.child_token();
            tasks.push(("txlog-cleanup".to_string(), tokio::spawn(async move { cleanup.run(token).await })));
        }

        for (agent_id, _settings) in &self.config.agents {
            let runtime = Arc::new(AgentRuntime::new(
                agent_id.clone(),
                context.broker(),
                context.queue_fabric(),
                context.hook_executor(),
                context.chain_registry(),
                context.retry_engine(),
                context.router(),
                self.model_client.clone(),
                AgentRuntimeConfig::default(),
            ));
            let token = root_token.child_token();
            let name = format!("agent-runtime:{agent_id}");
            tasks.push((name, tokio::spawn(async move { runtime.run(token).await })));
        }

        info!(agents = self.config.agents.len(), "platform boot completed");

        Ok(PlatformRuntime { context, cancel_token: root_token, tasks })
    }
}

/// Registers the built-in pre-execution-safety and post-execution-logging
/// hooks, then wires the predictive router hook separately since the
/// router crate can't be a dependency of `orchestrator-hooks` itself
/// (see `orchestrator_hooks::builtin::router_advisor`).
fn register_hooks(context: &PlatformContext) -> Result<()> {
    let registry = context.hook_registry();
    builtin::register_all(&registry, context.broker())?;
    registry.register(HookKind::Router(Arc::new(PredictiveRouterHook::new(context.router()))))?;
    Ok(())
}

pub struct PlatformRuntime {
    context: PlatformContext,
    cancel_token: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl PlatformRuntime {
    pub fn context(&self) -> PlatformContext {
        self.context.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel_token.cancel();

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(Ok(())) => info!(service = %name, "service shutdown cleanly"),
                Ok(Err(err)) => return Err(err),
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

fn initialize_logging(config: &PlatformConfig) {
    let filter = &config.observability.log_level;
    let _ = tracing_subscriber::fmt().with_env_filter(filter.as_str()).try_init();
}
