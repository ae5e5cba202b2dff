//! Web front end for the text-to-speech demo
//!
//! Serves a single page with a text box and a "Generate Speech" button, plus
//! the JSON and download endpoints behind it.

pub mod api;
pub mod error;
pub mod handler;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod ui;

pub use handler::{RequestOutcome, RequestPhase, RequestSession, SpeechRequestHandler};
pub use routes::create_router;
pub use state::AppState;
