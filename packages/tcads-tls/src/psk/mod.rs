//! The pre-shared-key authentication mode: key derivation, the in-memory duplex stream
//! that lets a blocking TLS implementation be driven as a state machine, and the engine
//! itself.

pub mod engine;
pub mod key;
pub mod stream;

pub use engine::{EngineState, PskEngineOutput, PskTlsEngine, MAX_PENDING_WRITE_BYTES};
pub use key::{PskKey, PskKeyError, PSK_LENGTH};
pub use stream::MemoryStream;
