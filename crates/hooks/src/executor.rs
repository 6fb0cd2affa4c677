use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use orchestrator_core::{now_ms, ContextModifications};

use crate::chain::{ChainMode, ChainStepConfig};
use crate::context::HookContext;
use crate::descriptor::HookType;
use crate::handler::{HookDecision, HookHandler};
use crate::record::{ExecutionHistory, ExecutionResult, PerHookResult};
use crate::registry::HookRegistry;

pub struct HookExecutor {
    registry: Arc<HookRegistry>,
    history: Arc<ExecutionHistory>,
    default_timeout: Duration,
}

impl HookExecutor {
    pub fn new(registry: Arc<HookRegistry>, history: Arc<ExecutionHistory>) -> Self {
        Self {
            registry,
            history,
            default_timeout: Duration::from_secs(30),
        }
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Runs every enabled hook of `hook_type` against `ctx`, applying the
    /// given chain step config, and records the execution.
    pub async fn execute(
        &self,
        hook_type: HookType,
        ctx: &mut HookContext,
        step: &ChainStepConfig,
    ) -> ExecutionResult {
        let hooks = self.registry.hooks_for_type(&hook_type);
        let results = match step.mode {
            ChainMode::Sequential => self.run_sequential(&hooks, ctx, step.continue_on_error).await,
            ChainMode::Parallel => {
                let (results, aggregated) = self.run_parallel(&hooks, ctx, step.continue_on_error).await;
                ctx.modifications.merge(aggregated);
                results
            }
        };

        let blocked = results.iter().any(|r| r.decision.is_block());
        let execution = ExecutionResult {
            hook_type: hook_type.to_string(),
            task_id: ctx.task.id.clone(),
            timestamp_ms: now_ms(),
            results,
            blocked,
        };

        if let Err(err) = self.history.record(execution.clone()).await {
            tracing::warn!(error = %err, "failed to record hook execution");
        }

        execution
    }

    async fn run_one(
        &self,
        descriptor_timeout: Duration,
        handler: &Arc<dyn HookHandler>,
        ctx: &mut HookContext,
    ) -> PerHookResult {
        let timeout = descriptor_timeout.min(self.default_timeout);
        let hook_id = handler.descriptor().id;
        let start = Instant::now();

        let decision = match tokio::time::timeout(timeout, handler.validate(ctx)).await {
            Ok(decision) => decision,
            Err(_) => {
                return PerHookResult {
                    hook_id,
                    success: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result: None,
                    stop_chain: false,
                    decision: HookDecision::Allow,
                };
            }
        };

        if decision.is_block() {
            return PerHookResult {
                hook_id,
                success: true,
                duration_ms: start.elapsed().as_millis() as u64,
                result: None,
                stop_chain: true,
                decision,
            };
        }

        match tokio::time::timeout(timeout, handler.execute(ctx)).await {
            Ok(outcome) => {
                ctx.modifications.merge(outcome.context_modifications.clone());
                PerHookResult {
                    hook_id,
                    success: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result: outcome.result,
                    stop_chain: outcome.stop_chain,
                    decision,
                }
            }
            Err(_) => PerHookResult {
                hook_id,
                success: false,
                duration_ms: start.elapsed().as_millis() as u64,
                result: None,
                stop_chain: false,
                decision: HookDecision::Allow,
            },
        }
    }

    async fn run_sequential(
        &self,
        hooks: &[(crate::descriptor::HookDescriptor, Arc<dyn HookHandler>)],
        ctx: &mut HookContext,
        continue_on_error: bool,
    ) -> Vec<PerHookResult> {
        let mut results = Vec::new();
        for (descriptor, handler) in hooks {
            let result = self.run_one(descriptor.timeout, handler, ctx).await;
            let should_stop = result.stop_chain || result.decision.is_block() || (!result.success && !continue_on_error);
            results.push(result);
            if should_stop {
                break;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        hooks: &[(crate::descriptor::HookDescriptor, Arc<dyn HookHandler>)],
        ctx: &HookContext,
        continue_on_error: bool,
    ) -> (Vec<PerHookResult>, ContextModifications) {
        let default_timeout = self.default_timeout;
        let futures = hooks.iter().map(|(descriptor, handler)| {
            let mut local_ctx = ctx.clone();
            let handler = Arc::clone(handler);
            let timeout = descriptor.timeout.min(default_timeout);
            async move {
                let hook_id = handler.descriptor().id;
                let start = Instant::now();

                let decision = match tokio::time::timeout(timeout, handler.validate(&local_ctx)).await {
                    Ok(decision) => decision,
                    Err(_) => {
                        return (
                            PerHookResult {
                                hook_id,
                                success: false,
                                duration_ms: start.elapsed().as_millis() as u64,
                                result: None,
                                stop_chain: false,
                                decision: HookDecision::Allow,
                            },
                            ContextModifications::default(),
                        );
                    }
                };

                if decision.is_block() {
                    return (
                        PerHookResult {
                            hook_id,
                            success: true,
                            duration_ms: start.elapsed().as_millis() as u64,
                            result: None,
                            stop_chain: true,
                            decision,
                        },
                        ContextModifications::default(),
                    );
                }

                match tokio::time::timeout(timeout, handler.execute(&mut local_ctx)).await {
                    Ok(outcome) => (
                        PerHookResult {
                            hook_id,
                            success: true,
                            duration_ms: start.elapsed().as_millis() as u64,
                            result: outcome.result,
                            stop_chain: outcome.stop_chain,
                            decision,
                        },
                        outcome.context_modifications,
                    ),
                    Err(_) => (
                        PerHookResult {
                            hook_id,
                            success: false,
                            duration_ms: start.elapsed().as_millis() as u64,
                            result: None,
                            stop_chain: false,
                            decision: HookDecision::Allow,
                        },
                        ContextModifications::default(),
                    ),
                }
            }
        });

        let outcomes = join_all(futures).await;
        let mut results = Vec::with_capacity(outcomes.len());
        let mut aggregated = ContextModifications::default();
        for (result, modifications) in outcomes {
            aggregated.merge(modifications);
            let stop = !result.success && !continue_on_error;
            results.push(result);
            if stop {
                break;
            }
        }
        (results, aggregated)
    }
}
