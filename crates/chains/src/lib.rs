//! The three agentic chains (planning, execution, reflection) and the
//! stagnation checker that binds them together (§4.7-§4.8).

pub mod execution;
pub mod planning;
pub mod reflection;
pub mod stagnation;

pub use execution::ExecutionResult;
pub use reflection::ReflectionOutcome;

use sa_domain::stream::Usage;

/// The raw prompt/response pair behind one agent invocation, handed back
/// to the caller so it can be persisted as a per-run artifact.
#[derive(Debug, Clone)]
pub struct AgentCallLog {
    pub usage: Option<Usage>,
    pub prompt: String,
    pub raw_response: String,
}
