mod networking;

pub use networking::*;

use std::{fmt, io};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;
use tracing::{debug, warn};

use crate::{
    error::ConnectionError,
    messages::{ClientMessage, PartyMessage, RoundControl},
};

/// Error type for channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    Send(usize),
    Recv(usize),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Send(id) => write!(f, "Error while sending message to party {}", id),
            Self::Recv(id) => write!(f, "Error while receiving message from party {}", id),
        }
    }
}

impl std::error::Error for TransportError {}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<Item, SinkItem, C> = tokio_serde::Framed<
    tokio_util::codec::Framed<C, LengthDelimitedCodec>,
    Item,
    SinkItem,
    Bincode<Item, SinkItem>,
>;

/// Client end of a connection to a computation party.
pub type ClientChannel<C> = BincodeStreamSink<PartyMessage, ClientMessage, C>;

/// Party end of a connection from a client.
pub type PartyChannel<C> = BincodeStreamSink<ClientMessage, PartyMessage, C>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_channel_with_bincode<Item, SinkItem, C>(
    channel: C,
) -> BincodeStreamSink<Item, SinkItem, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create in-process pipe: client end and raw party end.
pub fn client_duplex(max_buf_size: usize) -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(max_buf_size)
}

/// Send the client identity (raw, unframed) and the round control flag
/// (framed) over a freshly opened stream.
pub async fn open_channel<C>(
    mut stream: C,
    party_id: usize,
    client_id: u32,
    round: RoundControl,
) -> Result<ClientChannel<C>, ConnectionError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let handshake_error = |source: io::Error| ConnectionError::Handshake { party_id, source };

    stream.write_u32_le(client_id).await.map_err(handshake_error)?;
    stream.flush().await.map_err(handshake_error)?;

    let mut channel: ClientChannel<C> = wrap_channel_with_bincode(stream);
    channel
        .send(ClientMessage::RoundControl {
            finish: round.is_finish(),
        })
        .await
        .map_err(handshake_error)?;

    debug!(party_id, client_id, "handshake sent");
    Ok(channel)
}

/// Party side of the client handshake: read client identity and round control flag.
pub async fn accept_client<C>(mut stream: C) -> io::Result<(u32, RoundControl, PartyChannel<C>)>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = stream.read_u32_le().await?;
    let mut channel: PartyChannel<C> = wrap_channel_with_bincode(stream);
    let round = match channel.next().await {
        Some(Ok(ClientMessage::RoundControl { finish: true })) => RoundControl::Finish,
        Some(Ok(ClientMessage::RoundControl { finish: false })) => RoundControl::Continue,
        Some(Err(err)) => return Err(err),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Expected round control message",
            ))
        }
    };
    Ok((client_id, round, channel))
}

/// Create in-process connections from a client to mock parties, with the
/// handshake already consumed on the party side.
pub async fn mock_client_channels(
    num_parties: usize,
    max_buf_size: usize,
) -> io::Result<(
    PartyConnections<DuplexStream>,
    Vec<PartyChannel<DuplexStream>>,
)> {
    let (clients, parties): (Vec<_>, Vec<_>) = (0..num_parties)
        .map(|_| client_duplex(max_buf_size))
        .unzip();

    let connections = PartyConnections::handshake(clients, 0, RoundControl::Continue)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

    let mut channels = Vec::with_capacity(num_parties);
    for party in parties {
        let (_, _, channel) = accept_client(party).await?;
        channels.push(channel);
    }
    Ok((connections, channels))
}

/// Ordered set of connections to all computation parties, indexed by party ID.
/// Dropping the set closes every connection.
pub struct PartyConnections<C> {
    channels: Vec<ClientChannel<C>>,
}

impl<C> PartyConnections<C> {
    /// Wrap already opened channels, ordered by party ID.
    pub fn new(channels: Vec<ClientChannel<C>>) -> Self {
        Self { channels }
    }

    /// Number of computation parties.
    pub fn num_parties(&self) -> usize {
        self.channels.len()
    }
}

impl<C> PartyConnections<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform client handshake over each stream, in order.
    /// Streams opened before a failing one are dropped together with it.
    pub async fn handshake(
        streams: impl IntoIterator<Item = C>,
        client_id: u32,
        round: RoundControl,
    ) -> Result<Self, ConnectionError> {
        let mut channels = Vec::new();
        for (party_id, stream) in streams.into_iter().enumerate() {
            channels.push(open_channel(stream, party_id, client_id, round).await?);
        }
        if channels.is_empty() {
            return Err(ConnectionError::NoParties);
        }
        Ok(Self::new(channels))
    }

    /// Send the same message to all parties.
    pub async fn send_to_all(&mut self, msg: ClientMessage) -> Result<(), TransportError> {
        futures::future::try_join_all(self.channels.iter_mut().enumerate().map(
            |(id, channel)| {
                let msg = msg.clone();
                async move {
                    channel
                        .send(msg)
                        .await
                        .map_err(|_| TransportError::Send(id))
                }
            },
        ))
        .await
        .map(|_| ())
    }

    /// Receive one message from every party. Result is ordered by party ID.
    pub async fn receive_from_all(&mut self) -> Result<Vec<(usize, PartyMessage)>, TransportError> {
        futures::future::try_join_all(self.channels.iter_mut().enumerate().map(
            |(id, channel)| async move {
                match channel.next().await {
                    Some(Ok(msg)) => Ok((id, msg)),
                    _ => Err(TransportError::Recv(id)),
                }
            },
        ))
        .await
    }

    /// Flush and shut down all connections. Failures are only logged.
    pub async fn close(mut self) {
        for (id, channel) in self.channels.iter_mut().enumerate() {
            if let Err(err) = channel.close().await {
                warn!("Failed to close connection to party {}: {}", id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::PrimeField;
    use num_bigint::BigUint;

    #[tokio::test]
    async fn test_handshake_layout() {
        let (client, mut party) = client_duplex(1024);
        let connections = PartyConnections::handshake([client], 7, RoundControl::Finish)
            .await
            .unwrap();
        assert_eq!(connections.num_parties(), 1);

        assert_eq!(party.read_u32_le().await.unwrap(), 7);
        let mut channel: PartyChannel<_> = wrap_channel_with_bincode(party);
        match channel.next().await {
            Some(Ok(ClientMessage::RoundControl { finish })) => assert!(finish),
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accept_client() {
        let (client, party) = client_duplex(1024);
        let _connections = PartyConnections::handshake([client], 2, RoundControl::Continue)
            .await
            .unwrap();
        let (client_id, round, _) = accept_client(party).await.unwrap();
        assert_eq!((client_id, round), (2, RoundControl::Continue));
    }

    #[tokio::test]
    async fn test_accept_client_without_round_control() {
        let (mut client, party) = client_duplex(1024);
        client.write_u32_le(1).await.unwrap();
        let mut channel: ClientChannel<_> = wrap_channel_with_bincode(client);
        channel
            .send(ClientMessage::MaskedInputs(Vec::new()))
            .await
            .unwrap();
        let err = accept_client(party).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_broadcast_and_gather() {
        let field = PrimeField::new(BigUint::from(101u32)).unwrap();
        let (clients, parties): (Vec<_>, Vec<_>) = (0..3).map(|_| client_duplex(1024)).unzip();
        let mut connections = PartyConnections::handshake(clients, 0, RoundControl::Continue)
            .await
            .unwrap();

        let mut party_channels = Vec::new();
        for mut party in parties {
            assert_eq!(party.read_u32_le().await.unwrap(), 0);
            let mut channel: PartyChannel<_> = wrap_channel_with_bincode(party);
            assert!(matches!(
                channel.next().await,
                Some(Ok(ClientMessage::RoundControl { finish: false }))
            ));
            party_channels.push(channel);
        }

        connections
            .send_to_all(ClientMessage::MaskedInputs(vec![field.from_u64(5)]))
            .await
            .unwrap();
        for channel in party_channels.iter_mut() {
            match channel.next().await {
                Some(Ok(ClientMessage::MaskedInputs(values))) => {
                    assert_eq!(values, vec![field.from_u64(5)])
                }
                other => panic!("Unexpected message {:?}", other),
            }
            channel
                .send(PartyMessage::TripleShares(Vec::new()))
                .await
                .unwrap();
        }

        let received = connections.receive_from_all().await.unwrap();
        assert_eq!(
            received.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_handshake_requires_parties() {
        let streams: Vec<DuplexStream> = Vec::new();
        assert!(matches!(
            PartyConnections::handshake(streams, 0, RoundControl::Finish).await,
            Err(ConnectionError::NoParties)
        ));
    }

    #[tokio::test]
    async fn test_receive_from_closed_party() {
        let (client, party) = client_duplex(1024);
        let mut connections = PartyConnections::handshake([client], 0, RoundControl::Continue)
            .await
            .unwrap();
        drop(party);
        assert_eq!(
            connections.receive_from_all().await.unwrap_err(),
            TransportError::Recv(0)
        );
    }
}
