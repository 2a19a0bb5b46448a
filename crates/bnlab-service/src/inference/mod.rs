mod orchestrator;

pub use orchestrator::{run, InferenceError, InferenceOutcome};
