//! Turn orchestration layer
//!
//! This module connects the components of Amica:
//! input -> safety filter -> conversation session -> transcript -> speech

mod config;
mod orchestrator;

pub use config::{AmicaConfig, MessageTexts};
pub use orchestrator::{
    OrchestratorBuilder, SubmitOutcome, TurnEvent, TurnId, TurnOrchestrator, TurnOrigin,
    TurnPhase, TurnState, TurnUpdate,
};
