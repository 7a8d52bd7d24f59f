//! The OmniFS container engine.
//!
//! One [`Engine`] value owns the open container, the in-memory session map,
//! and the event ring; a [`Pipeline`] wraps it in a bounded request queue
//! drained by a single worker thread. Producers enqueue [`Request`] records
//! from any number of threads; the worker executes them strictly in arrival
//! order, so every container mutation has a total order and the engine
//! itself needs no interior locking.
//!
//! ```no_run
//! use omnifs_engine::{Config, Engine, Pipeline};
//! use omnifs_protocol::Operation;
//!
//! # async fn demo() -> Result<(), omnifs_engine::EngineError> {
//! let config = Config::default();
//! let engine = Engine::open_or_format(&config, "data/system.omni")?;
//! let pipeline = Pipeline::start(engine, &config)?;
//!
//! let response = pipeline
//!     .execute(
//!         "",
//!         Operation::Login {
//!             username: "admin".into(),
//!             password: "admin123".into(),
//!         },
//!     )
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! [`Request`]: omnifs_protocol::Request

mod auth;
mod config;
mod engine;
mod error;
mod events;
mod fs;
pub mod path;
mod pipeline;
mod session;
mod users;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use events::{EventLevel, EventLog, EventRecord};
pub use pipeline::{LifecycleState, Pipeline};
pub use session::{Session, SessionManager};

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
