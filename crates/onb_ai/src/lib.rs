pub mod evidence;
pub mod grounded;
pub mod guardrails;
pub mod llm;
pub mod ollama;
pub mod prompts;
pub mod provider;
pub mod session;
pub mod simulated;

pub use provider::{AnswerProvider, ProviderAnswer};
pub use session::{ChatSession, CoordinatorState, PendingAnswer, TurnOutcome};
