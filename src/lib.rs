//! Webpilot CLI crate: wiring between the core crates and the outside world.
//!
//! The interesting machinery lives in `dom-perceiver`, `stability-gate`, and
//! `agent-loop`; this crate supplies the thin collaborators they speak to:
//! a Chrome bridge, an OpenAI-compatible decision client, and the command
//! line front end.

pub mod browser;
pub mod config;
pub mod llm;
pub mod session;

pub use config::AppConfig;
pub use session::run_session;
