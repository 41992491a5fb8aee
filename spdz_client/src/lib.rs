//! External client of a SPDZ computation: submits a private value to all
//! computation parties as a triple-masked input and retrieves a result whose
//! integrity is checked with a shared random MAC.

pub mod error;
pub mod fields;
pub mod messages;
pub mod protocol;
pub mod session;
pub mod setup;
pub mod simulator;
pub mod transport;

pub use error::{ClientError, ConfigError, ConnectionError, ProtocolError};
pub use fields::{Gfp, PrimeField};
pub use messages::RoundControl;
pub use session::{run_session, ClientSession, SessionConfig, SessionState};
