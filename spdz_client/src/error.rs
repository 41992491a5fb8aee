use std::{io, path::PathBuf};

use thiserror::Error;

use crate::transport::TransportError;

/// Errors while loading the field setup artifact or building session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read setup artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Malformed(String),

    #[error("Field modulus {0} is not prime")]
    InvalidModulus(String),

    #[error("Unsupported binary field extension degree {0}")]
    UnsupportedDegree(u32),

    #[error("Number of parties must be at least 1")]
    NoParties,
}

/// Errors while opening connections to computation parties.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to party {party_id} at {addr}: {source}")]
    Connect {
        party_id: usize,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Handshake with party {party_id} failed: {source}")]
    Handshake {
        party_id: usize,
        #[source]
        source: io::Error,
    },

    #[error("Port for party {party_id} is out of range")]
    PortOutOfRange { party_id: usize },

    #[error("No computation parties to connect to")]
    NoParties,
}

/// Malformed or missing protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unexpected message from party {party_id}, expected {expected}")]
    UnexpectedMessage {
        party_id: usize,
        expected: &'static str,
    },

    #[error("Party {party_id} sent {received} triples, expected {expected}")]
    TripleCount {
        party_id: usize,
        received: usize,
        expected: usize,
    },

    #[error("Party {party_id} sent a value outside of the field")]
    NonCanonicalElement { party_id: usize },

    #[error("No party contributed a share")]
    NoShares,

    #[error("Session connections are already closed")]
    SessionClosed,
}

/// Any failure of a client session. All of them are fatal for the session.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Summed triple does not satisfy `a * b = c`: some party is cheating or faulty.
    #[error("Incorrect triple at {index}, aborting")]
    TripleMismatch { index: usize },

    /// Summed result does not satisfy `y * r = w`: the revealed value cannot be trusted.
    #[error("Unable to authenticate output value as correct, aborting")]
    Authentication,
}
