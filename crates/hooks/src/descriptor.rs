use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The point in the task lifecycle a hook chain runs at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookType {
    PreTask,
    PreTaskAssignment,
    PostTask,
    TaskError,
    Custom(String),
}

impl std::fmt::Display for HookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookType::PreTask => write!(f, "pre-task"),
            HookType::PreTaskAssignment => write!(f, "pre-task-assignment"),
            HookType::PostTask => write!(f, "post-task"),
            HookType::TaskError => write!(f, "task-error"),
            HookType::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Metadata loaded at registration time: `{name, version, type,
/// description, priority, enabled, timeout}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub hook_type: HookType,
    pub description: String,
    pub priority: i32,
    pub enabled: bool,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl HookDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, hook_type: HookType, priority: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            hook_type,
            description: String::new(),
            priority,
            enabled: true,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
