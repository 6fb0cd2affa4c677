use std::collections::HashMap;

use crate::descriptor::HookType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone)]
pub struct ChainStepConfig {
    pub mode: ChainMode,
    pub continue_on_error: bool,
}

impl Default for ChainStepConfig {
    fn default() -> Self {
        Self {
            mode: ChainMode::Parallel,
            continue_on_error: true,
        }
    }
}

/// A named composition of hook-type steps, e.g. `task-processing` =
/// `[pre-task, post-task]`.
#[derive(Debug, Clone)]
pub struct Chain {
    pub name: String,
    pub steps: Vec<HookType>,
}

pub struct ChainRegistry {
    chains: HashMap<String, Chain>,
    step_configs: HashMap<String, ChainStepConfig>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        let mut registry = Self {
            chains: HashMap::new(),
            step_configs: HashMap::new(),
        };
        registry.register(Chain {
            name: "task-processing".to_string(),
            steps: vec![HookType::PreTask, HookType::PostTask],
        });
        registry
    }
}

impl ChainRegistry {
    pub fn register(&mut self, chain: Chain) {
        self.chains.insert(chain.name.clone(), chain);
    }

    pub fn chain(&self, name: &str) -> Option<&Chain> {
        self.chains.get(name)
    }

    pub fn set_step_config(&mut self, hook_type: &HookType, config: ChainStepConfig) {
        self.step_configs.insert(hook_type.to_string(), config);
    }

    pub fn step_config(&self, hook_type: &HookType) -> ChainStepConfig {
        self.step_configs.get(&hook_type.to_string()).cloned().unwrap_or_default()
    }
}
