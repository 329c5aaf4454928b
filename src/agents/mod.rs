pub mod conflict;
pub mod explainability;
pub mod fuzzy_ticker;
pub mod orchestrator;
pub mod router;
pub mod specialists;

pub use conflict::{ConflictPolicy, DefaultConflictPolicy};
pub use explainability::ExplainabilityAgent;
pub use fuzzy_ticker::FuzzyTickerResolver;
pub use orchestrator::{AgentRoutingDecision, Orchestrator};
pub use router::{AgentRouter, RouterMessage, RouterOutcome, SpecialistSet};
