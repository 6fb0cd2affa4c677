//! One agent's task cycle, run in a loop for the agent's lifetime: pull a
//! task off the ready queue, run it through the hook pipeline and model
//! client, hand failures to the retry engine, and report the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_broker::Broker;
use orchestrator_core::{now_ms, Agent, ExecutionContext, SystemSnapshot, Task};
use orchestrator_hooks::{ChainMode, ChainRegistry, ChainStepConfig, HookExecutor, HookType};
use orchestrator_retry::{RetryEngine, RetryOutcome};
use orchestrator_router::Router;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RuntimeError;
use crate::events;
use crate::model_client::ModelClient;
use crate::queue_fabric::QueueFabric;
use crate::task_store::TaskStatus;

#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Overall time budget per `dequeue_one` poll before the cycle loops
    /// back around to check for a shutdown signal.
    pub poll_timeout: Duration,
    /// How long a single task is given to finish before the cycle gives
    /// up waiting on the model client and reports a timeout failure.
    pub task_timeout: Duration,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self { poll_timeout: Duration::from_millis(500), task_timeout: Duration::from_secs(120) }
    }
}

/// The terminal outcome of one task cycle, returned from `run_one` mainly
/// so tests can assert on it without scraping logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Blocked { reason: String },
    Retried,
    DeadLettered { reason: String },
    TimedOut,
}

pub struct AgentRuntime {
    agent_id: String,
    broker: Arc<dyn Broker>,
    queue_fabric: Arc<QueueFabric>,
    hook_executor: Arc<HookExecutor>,
    chain_registry: Arc<ChainRegistry>,
    retry_engine: Arc<RetryEngine>,
    router: Arc<Router>,
    model_client: Arc<dyn ModelClient>,
    config: AgentRuntimeConfig,
}

impl AgentRuntime {
    pub fn new(
        agent_id: impl Into<String>,
        broker: Arc<dyn Broker>,
        queue_fabric: Arc<QueueFabric>,
        hook_executor: Arc<HookExecutor>,
        chain_registry: Arc<ChainRegistry>,
        retry_engine: Arc<RetryEngine>,
        router: Arc<Router>,
        model_client: Arc<dyn ModelClient>,
        config: AgentRuntimeConfig,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            broker,
            queue_fabric,
            hook_executor,
            chain_registry,
            retry_engine,
            router,
            model_client,
            config,
        }
    }

    async fn system_snapshot(&self) -> SystemSnapshot {
        let total_queue_depth = self.router.total_queue_depth().await.unwrap_or(0) as usize;
        SystemSnapshot { active_agents: self.router.agent_count(), total_queue_depth }
    }

    /// Runs one full cycle: dequeue, pre-task gate, model dispatch,
    /// post-task/task-error chain, retry hand-off, in-flight release.
    /// Returns `Ok(None)` when the poll window elapsed with nothing to
    /// dequeue (a normal idle tick, not an error).
    pub async fn run_one(&self) -> Result<Option<CycleOutcome>, RuntimeError> {
        let Some(mut task) = self.queue_fabric.dequeue_one(&self.agent_id, self.config.poll_timeout).await? else {
            return Ok(None);
        };

        events::publish(
            &self.broker,
            format!("agent:{}:task_assigned", self.agent_id),
            "task_assigned",
            &task,
            &self.agent_id,
            None,
        )
        .await;

        let agent_snapshot = self.router.agent(&self.agent_id).unwrap_or_else(|| Agent::new(self.agent_id.clone(), self.agent_id.clone()));
        let mut ctx = ExecutionContext::new(task.clone())
            .with_agent(agent_snapshot)
            .with_system(self.system_snapshot().await);

        let pre_task = self
            .hook_executor
            .execute(HookType::PreTask, &mut ctx, &ChainStepConfig { mode: ChainMode::Sequential, continue_on_error: true })
            .await;

        if pre_task.blocked {
            let reason = "blocked by security policy".to_string();
            self.finish_blocked(&mut task, &reason).await?;
            return Ok(Some(CycleOutcome::Blocked { reason }));
        }

        ctx.apply_modifications();
        task = ctx.task.clone();

        let started = Instant::now();
        ctx.execution.started_at_ms = Some(now_ms());
        let outcome = match tokio::time::timeout(self.config.task_timeout, self.model_client.execute(&task)).await {
            Ok(result) => result,
            Err(_) => Err("execution timed out".to_string()),
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        ctx.execution.duration_ms = Some(duration_ms);

        match outcome {
            Ok(result) => {
                ctx.execution.result = Some(result);
                self.hook_executor
                    .execute(HookType::PostTask, &mut ctx, &self.chain_registry.step_config(&HookType::PostTask))
                    .await;
                self.finish_success(&task, duration_ms).await?;
                Ok(Some(CycleOutcome::Completed))
            }
            Err(error_message) => {
                ctx.execution.error = Some(error_message.clone());
                self.hook_executor
                    .execute(HookType::TaskError, &mut ctx, &self.chain_registry.step_config(&HookType::TaskError))
                    .await;
                let attempt = task.retry_metadata.as_ref().map(|m| m.attempt).unwrap_or(0) + 1;
                self.finish_failure(task, error_message, attempt).await
            }
        }
    }

    async fn finish_blocked(&self, task: &mut Task, reason: &str) -> Result<(), RuntimeError> {
        self.queue_fabric.store().set_status(&task.id, TaskStatus::Failed).await?;
        events::publish(&self.broker, format!("agent:{}:failed", self.agent_id), "failed", task, &self.agent_id, Some(reason)).await;
        events::publish(&self.broker, format!("queue:{}:failed", self.agent_id), "failed", task, &self.agent_id, Some(reason)).await;
        self.queue_fabric.release_in_flight(&self.agent_id, &task.id).await?;
        warn!(task_id = %task.id, agent = %self.agent_id, "task blocked by safety hook");
        Ok(())
    }

    async fn finish_success(&self, task: &Task, duration_ms: u64) -> Result<(), RuntimeError> {
        self.queue_fabric.store().set_status(&task.id, TaskStatus::Completed).await?;
        events::publish(&self.broker, format!("agent:{}:completed", self.agent_id), "completed", task, &self.agent_id, None).await;
        events::publish(&self.broker, format!("queue:{}:complete", self.agent_id), "complete", task, &self.agent_id, None).await;
        self.queue_fabric.release_in_flight(&self.agent_id, &task.id).await?;

        if let Some(retry_meta) = &task.retry_metadata {
            let class = orchestrator_retry::classify(&retry_meta.original_error);
            let recovery_time = Duration::from_millis(now_ms().saturating_sub(retry_meta.retry_start_ms));
            if let Err(err) = self.retry_engine.record_success(&self.agent_id, class, recovery_time).await {
                warn!(task_id = %task.id, error = %err, "failed to record retry-engine success");
            }
        }

        info!(task_id = %task.id, agent = %self.agent_id, duration_ms, "task completed");
        Ok(())
    }

    async fn finish_failure(&self, task: Task, error_message: String, attempt: u32) -> Result<Option<CycleOutcome>, RuntimeError> {
        events::publish(&self.broker, format!("agent:{}:failed", self.agent_id), "failed", &task, &self.agent_id, Some(&error_message)).await;
        events::publish(&self.broker, format!("queue:{}:failed", self.agent_id), "failed", &task, &self.agent_id, Some(&error_message)).await;

        let task_id = task.id.clone();
        let outcome = self
            .retry_engine
            .schedule_retry(task, self.agent_id.clone(), error_message.clone(), attempt, None)
            .await;

        self.queue_fabric.release_in_flight(&self.agent_id, &task_id).await?;

        match outcome {
            Ok(RetryOutcome::Scheduled(_)) => {
                self.queue_fabric.store().set_status(&task_id, TaskStatus::RetryScheduled).await?;
                if let Err(err) = self.retry_engine.record_failure(&self.agent_id, orchestrator_retry::classify(&error_message)).await {
                    warn!(task_id = %task_id, error = %err, "failed to record circuit-breaker failure");
                }
                Ok(Some(CycleOutcome::Retried))
            }
            Ok(RetryOutcome::DeadLettered { reason }) => {
                self.queue_fabric.store().set_status(&task_id, TaskStatus::DeadLettered).await?;
                Ok(Some(CycleOutcome::DeadLettered { reason }))
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "retry engine failed to process task failure");
                Err(RuntimeError::from(err))
            }
        }
    }

    /// Runs cycles until `cancel` fires, recovering this agent's orphaned
    /// in-flight entries first.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        self.queue_fabric.recover_orphans(&self.agent_id).await?;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            tokio::select! {
                result = self.run_one() => {
                    if let Err(err) = result {
                        error!(agent = %self.agent_id, error = %err, "task cycle failed");
                    }
                }
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::memory::InMemoryBroker;
    use orchestrator_core::{AgentStatus, Priority};
    use orchestrator_hooks::{builtin, ExecutionHistory, HookRegistry};

    fn runtime(broker: Arc<dyn Broker>, model_client: Arc<dyn ModelClient>) -> AgentRuntime {
        let registry = Arc::new(HookRegistry::new(broker.clone()));
        builtin::register_all(&registry, broker.clone()).unwrap();
        let history = Arc::new(ExecutionHistory::new(broker.clone()));
        let hook_executor = Arc::new(HookExecutor::new(registry, history));
        let chain_registry = Arc::new(ChainRegistry::default());
        let retry_config =
            orchestrator_retry::RetryConfig { base_delay: Duration::from_millis(0), ..Default::default() };
        let retry_engine = Arc::new(RetryEngine::new(broker.clone(), retry_config));
        let router = Arc::new(Router::new(broker.clone()));
        let mut agent = Agent::new("claude-1", "claude-1");
        agent.status = AgentStatus::Active;
        agent.capabilities.insert("analysis".into());
        router.register_agent(agent);
        let queue_fabric = Arc::new(QueueFabric::new(broker.clone()));

        AgentRuntime::new(
            "claude-1",
            broker,
            queue_fabric,
            hook_executor,
            chain_registry,
            retry_engine,
            router,
            model_client,
            AgentRuntimeConfig { poll_timeout: Duration::from_millis(150), task_timeout: Duration::from_secs(5) },
        )
    }

    #[tokio::test]
    async fn happy_path_completes_and_clears_queues() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let runtime = runtime(broker.clone(), Arc::new(NullModelClient));

        let task = Task::new(Some("t1".into()), Some("analysis".into()), "summarize X".into(), Priority::Normal, 2).unwrap();
        runtime.queue_fabric.enqueue(&task, "claude-1").await.unwrap();

        let outcome = runtime.run_one().await.unwrap();
        assert_eq!(outcome, Some(CycleOutcome::Completed));
        assert_eq!(broker.llen(&orchestrator_broker::keys::in_flight("claude-1")).await.unwrap(), 0);
        let info = runtime.queue_fabric.store().get("t1").await.unwrap().unwrap();
        assert_eq!(info.status, "completed");
    }

    #[tokio::test]
    async fn rate_limit_then_success_retries_then_completes() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let client = Arc::new(SimulatedModelClient::new(vec![Err("429 rate limit".into()), Ok(serde_json::json!("ok"))]));
        let runtime = runtime(broker.clone(), client);

        let task = Task::new(Some("t2".into()), Some("analysis".into()), "summarize Y".into(), Priority::Normal, 2).unwrap();
        runtime.queue_fabric.enqueue(&task, "claude-1").await.unwrap();

        let first = runtime.run_one().await.unwrap();
        assert_eq!(first, Some(CycleOutcome::Retried));

        runtime.retry_engine.process_due().await.unwrap();
        let second = runtime.run_one().await.unwrap();
        assert_eq!(second, Some(CycleOutcome::Completed));
    }

    #[tokio::test]
    async fn auth_failure_dead_letters_without_retry() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let client = Arc::new(SimulatedModelClient::new(vec![Err("401 unauthorized".into())]));
        let runtime = runtime(broker.clone(), client);

        let task = Task::new(Some("t3".into()), Some("analysis".into()), "summarize Z".into(), Priority::Normal, 2).unwrap();
        runtime.queue_fabric.enqueue(&task, "claude-1").await.unwrap();

        let outcome = runtime.run_one().await.unwrap();
        match outcome {
            Some(CycleOutcome::DeadLettered { reason }) => assert_eq!(reason, "non_recoverable"),
            other => panic!("expected dead-letter outcome, got {other:?}"),
        }
        assert!(runtime.retry_engine.dlq.get("t3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dangerous_prompt_blocks_before_model_call() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let client = Arc::new(SimulatedModelClient::new(vec![Ok(serde_json::json!("should not run"))]));
        let runtime = runtime(broker.clone(), client.clone());

        let task = Task::new(Some("t4".into()), Some("analysis".into()), "rm -rf / now".into(), Priority::Normal, 2).unwrap();
        runtime.queue_fabric.enqueue(&task, "claude-1").await.unwrap();

        let outcome = runtime.run_one().await.unwrap();
        assert_eq!(outcome, Some(CycleOutcome::Blocked { reason: "blocked by security policy".into() }));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn idle_poll_returns_none() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let runtime = runtime(broker, Arc::new(NullModelClient));
        assert!(runtime.run_one().await.unwrap().is_none());
    }
}
