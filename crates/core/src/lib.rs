pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use error::{PlaybackCause, PlaybackError};
pub use gate::{Gate, GateState};
pub use session::{Session, Toggled};
pub use state::{SessionState, TrackPhase};

pub use ambience_backend::{AudioSessionPolicy, Backend, BackendKind, GateError, Volume};
pub use ambience_catalog::{Catalog, CatalogError, Track, TrackId};
