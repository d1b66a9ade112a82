// Resume coach: prompt assembly, the completion relay, and the per-session
// conversation log. All completion-service calls go through llm_client.

pub mod handlers;
pub mod prompts;
pub mod relay;
pub mod session;
