use tokio::net::TcpStream;
use tracing::info;

use super::{open_channel, PartyConnections};
use crate::{error::ConnectionError, messages::RoundControl};

/// Default host of the computation parties.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port of party 0. Party `i` listens on `port_base + i`.
pub const DEFAULT_PORT_BASE: u16 = 14000;

/// Network location of the computation parties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartyEndpoints {
    pub host: String,
    pub port_base: u16,
    pub num_parties: usize,
}

impl PartyEndpoints {
    /// Port of party with given ID.
    pub fn port(&self, party_id: usize) -> Result<u16, ConnectionError> {
        u16::try_from(party_id)
            .ok()
            .and_then(|offset| self.port_base.checked_add(offset))
            .ok_or(ConnectionError::PortOutOfRange { party_id })
    }
}

/// Connect to every party in increasing ID order and send the client handshake.
/// The whole set is abandoned on first failure.
pub async fn connect_to_parties(
    endpoints: &PartyEndpoints,
    client_id: u32,
    round: RoundControl,
) -> Result<PartyConnections<TcpStream>, ConnectionError> {
    if endpoints.num_parties == 0 {
        return Err(ConnectionError::NoParties);
    }
    let mut channels = Vec::with_capacity(endpoints.num_parties);

    for party_id in 0..endpoints.num_parties {
        let port = endpoints.port(party_id)?;
        let socket = TcpStream::connect((endpoints.host.as_str(), port))
            .await
            .map_err(|source| ConnectionError::Connect {
                party_id,
                addr: format!("{}:{}", endpoints.host, port),
                source,
            })?;
        socket
            .set_nodelay(true)
            .map_err(|source| ConnectionError::Handshake { party_id, source })?;

        channels.push(open_channel(socket, party_id, client_id, round).await?);
    }

    info!(
        "Finish setup socket connections to {} SPDZ engines.",
        channels.len()
    );
    Ok(PartyConnections::new(channels))
}
