/// The envelope passed through every hook chain: agent, task, system
/// snapshot, execution frame, shared map, modifications map. This is
/// exactly the execution-context shape the agent runtime already builds,
/// so the hook pipeline reuses it rather than defining a parallel type.
pub type HookContext = orchestrator_core::ExecutionContext;
