use std::{fmt, path::PathBuf};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::{info, warn};

use crate::{
    error::{ClientError, ConfigError, ProtocolError},
    fields::{Gfp, PrimeField},
    messages::RoundControl,
    protocol,
    setup::{self, FieldParameters},
    transport::{self, PartyConnections, PartyEndpoints},
};

/// Lifecycle of a client session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    InputSubmitted,
    ResultPending,
    Verified,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Verified | SessionState::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything needed to run one client session against a set of parties.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub client_id: u32,
    pub round: RoundControl,
    pub endpoints: PartyEndpoints,
    pub params_path: PathBuf,
}

impl SessionConfig {
    /// Configuration with default host, port base and artifact location.
    pub fn new(
        client_id: u32,
        num_parties: usize,
        round: RoundControl,
    ) -> Result<Self, ConfigError> {
        if num_parties == 0 {
            return Err(ConfigError::NoParties);
        }
        Ok(Self {
            client_id,
            round,
            endpoints: PartyEndpoints {
                host: transport::DEFAULT_HOST.into(),
                port_base: transport::DEFAULT_PORT_BASE,
                num_parties,
            },
            params_path: setup::params_path(setup::DEFAULT_PREP_ROOT, num_parties),
        })
    }
}

/// Client session owning one connection per computation party.
pub struct ClientSession<'a, C> {
    field: &'a PrimeField,
    client_id: u32,
    connections: Option<PartyConnections<C>>,
    state: SessionState,
}

impl<'a> ClientSession<'a, TcpStream> {
    /// Connect to all parties over TCP.
    pub async fn connect(
        field: &'a PrimeField,
        config: &SessionConfig,
    ) -> Result<ClientSession<'a, TcpStream>, ClientError> {
        let connections =
            transport::connect_to_parties(&config.endpoints, config.client_id, config.round)
                .await?;
        Ok(Self::new(field, config.client_id, connections))
    }
}

impl<'a, C> ClientSession<'a, C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Session over connections that already completed the handshake.
    pub fn new(
        field: &'a PrimeField,
        client_id: u32,
        connections: PartyConnections<C>,
    ) -> Self {
        let mut session = Self {
            field,
            client_id,
            connections: Some(connections),
            state: SessionState::Disconnected,
        };
        session.transition(SessionState::Connected);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Submit private value and wait for the authenticated result.
    /// Connections are closed on both success and failure.
    pub async fn run(&mut self, value: &Gfp) -> Result<Gfp, ClientError> {
        let mut connections = match self.connections.take() {
            Some(connections) if !self.state.is_terminal() => connections,
            _ => return Err(self.abort(ProtocolError::SessionClosed.into())),
        };

        let result = self.exchange(value, &mut connections).await;
        connections.close().await;

        match result {
            Ok(result) => {
                self.transition(SessionState::Verified);
                Ok(result)
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    async fn exchange(
        &mut self,
        value: &Gfp,
        connections: &mut PartyConnections<C>,
    ) -> Result<Gfp, ClientError> {
        protocol::submit_value(self.field, value, connections).await?;
        self.transition(SessionState::InputSubmitted);

        self.transition(SessionState::ResultPending);
        protocol::reveal(self.field, connections).await
    }

    fn transition(&mut self, state: SessionState) {
        info!(client_id = self.client_id, "session {} -> {}", self.state, state);
        self.state = state;
    }

    fn abort(&mut self, err: ClientError) -> ClientError {
        warn!(client_id = self.client_id, "session aborted: {}", err);
        self.state = SessionState::Aborted;
        err
    }
}

/// Run the whole client lifecycle: load field parameters, connect, submit
/// `value` and return the authenticated result.
pub async fn run_session(config: &SessionConfig, value: i64) -> Result<Gfp, ClientError> {
    let params = FieldParameters::load(&config.params_path)?;
    let field = &params.prime;

    let mut session = ClientSession::connect(field, config).await?;
    session.run(&field.from_i64(value)).await
}
