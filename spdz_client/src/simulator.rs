//! In-process stand-in for the computation parties running the bankers bonus
//! program: every client submits one value, the round ends with the first
//! client that sets the finish flag, and all clients receive the authenticated
//! ID of the client with the highest value.
//!
//! The simulator sees all parties at once and computes in plain; it exists to
//! drive clients in tests.

use std::{io, mem};

use futures::{SinkExt, StreamExt};
use itertools::izip;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use thiserror::Error;
use tokio::io::DuplexStream;
use tracing::debug;

use crate::{
    fields::{Gfp, PrimeField},
    messages::{ClientMessage, PartyMessage, ResultShare, TripleShare},
    protocol::Triple,
    transport::{accept_client, client_duplex, PartyChannel},
};

/// Buffer size of each in-process pipe.
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// Misbehaviour of one simulated party.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Party adds one to its share of `c` in every dealt triple.
    CorruptTriple { party_id: usize },
    /// Party adds one to its share of the revealed result.
    CorruptResult { party_id: usize },
}

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Client #{0} disconnected before sending its input")]
    ClientDisconnected(usize),

    #[error("Client #{0} sent an unexpected message")]
    UnexpectedMessage(usize),

    #[error("Client #{0} sent different masked inputs to different parties")]
    InconsistentInputs(usize),

    #[error("No client finished the round")]
    RoundNotFinished,
}

/// Inputs reconstructed by the parties and the winning client ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    pub inputs: Vec<(u32, Gfp)>,
    pub winner: Gfp,
}

/// Set of simulated computation parties.
pub struct SimulatedParties {
    field: PrimeField,
    num_parties: usize,
    fault: Option<Fault>,
    rng: SmallRng,
    clients: Vec<Vec<DuplexStream>>,
}

impl SimulatedParties {
    pub fn new(field: PrimeField, num_parties: usize, seed: u64) -> Self {
        Self {
            field,
            num_parties,
            fault: None,
            rng: SmallRng::seed_from_u64(seed),
            clients: Vec::new(),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Open pipes for the next client. Returns client ends ordered by party ID.
    /// Clients are served in the order they were connected.
    pub fn connect_client(&mut self) -> Vec<DuplexStream> {
        let (client_ends, party_ends): (Vec<_>, Vec<_>) = (0..self.num_parties)
            .map(|_| client_duplex(PIPE_BUFFER_SIZE))
            .unzip();
        self.clients.push(party_ends);
        client_ends
    }

    /// Serve all connected clients until one finishes the round.
    pub async fn run(mut self) -> Result<RoundOutcome, SimulatorError> {
        let mut inputs = Vec::new();
        let mut waiting = Vec::new();

        for (index, streams) in mem::take(&mut self.clients).into_iter().enumerate() {
            let mut channels = Vec::with_capacity(streams.len());
            let mut client = None;
            for stream in streams {
                let (client_id, round, channel) = accept_client(stream).await?;
                client = Some((client_id, round));
                channels.push(channel);
            }
            let (client_id, round) = client.ok_or(SimulatorError::ClientDisconnected(index))?;

            let value = self.receive_input(index, &mut channels).await?;
            debug!(client_id, %value, "input received");
            inputs.push((client_id, value));
            waiting.push(channels);

            if round.is_finish() {
                let winner = self.highest_bidder(&inputs);
                for channels in waiting.iter_mut() {
                    self.send_result(&winner, channels).await?;
                }
                return Ok(RoundOutcome { inputs, winner });
            }
        }

        Err(SimulatorError::RoundNotFinished)
    }

    /// Deal a triple to the client and let every party derive its share of the input.
    async fn receive_input(
        &mut self,
        index: usize,
        channels: &mut [PartyChannel<DuplexStream>],
    ) -> Result<Gfp, SimulatorError> {
        let field = &self.field;
        let (_, mut shares) = deal_triple(field, self.num_parties, &mut self.rng);
        if let Some(Fault::CorruptTriple { party_id }) = self.fault {
            shares[party_id].c = field.add(&shares[party_id].c, &field.one());
        }

        for (channel, share) in channels.iter_mut().zip(&shares) {
            channel
                .send(PartyMessage::TripleShares(vec![share.clone()]))
                .await?;
        }

        let mut masked: Option<Gfp> = None;
        for channel in channels.iter_mut() {
            let value = match channel.next().await {
                Some(Ok(ClientMessage::MaskedInputs(values))) => {
                    let [value]: [Gfp; 1] = values
                        .try_into()
                        .map_err(|_| SimulatorError::UnexpectedMessage(index))?;
                    value
                }
                Some(Ok(_)) => return Err(SimulatorError::UnexpectedMessage(index)),
                Some(Err(err)) => return Err(err.into()),
                None => return Err(SimulatorError::ClientDisconnected(index)),
            };
            if let Some(previous) = &masked {
                if *previous != value {
                    return Err(SimulatorError::InconsistentInputs(index));
                }
            }
            masked = Some(value);
        }
        let masked = masked.ok_or(SimulatorError::ClientDisconnected(index))?;

        // Party 0 takes the public masked value, everyone subtracts its share of `a`.
        let input_shares: Vec<Gfp> = shares
            .iter()
            .enumerate()
            .map(|(party_id, share)| {
                if party_id == 0 {
                    field.sub(&masked, &share.a)
                } else {
                    field.neg(&share.a)
                }
            })
            .collect();
        Ok(field.sum(&input_shares))
    }

    /// ID of the client with the highest value; the earliest one wins ties.
    fn highest_bidder(&self, inputs: &[(u32, Gfp)]) -> Gfp {
        let mut best: Option<(u32, _)> = None;
        for (client_id, value) in inputs {
            let value = self.field.to_signed(value);
            let is_better = best
                .as_ref()
                .map_or(true, |(_, best_value)| value > *best_value);
            if is_better {
                best = Some((*client_id, value));
            }
        }
        let winner = best.map(|(client_id, _)| client_id).unwrap_or_default();
        self.field.from_u64(winner.into())
    }

    async fn send_result(
        &mut self,
        winner: &Gfp,
        channels: &mut [PartyChannel<DuplexStream>],
    ) -> Result<(), SimulatorError> {
        let field = &self.field;
        let mut shares = deal_result(field, winner, self.num_parties, &mut self.rng);
        if let Some(Fault::CorruptResult { party_id }) = self.fault {
            shares[party_id].y = field.add(&shares[party_id].y, &field.one());
        }
        for (channel, share) in channels.iter_mut().zip(shares) {
            channel.send(PartyMessage::ResultShare(share)).await?;
        }
        Ok(())
    }
}

/// Random additive sharing of `value` among `num_parties` parties.
pub fn share_additively<R: Rng + ?Sized>(
    field: &PrimeField,
    value: &Gfp,
    num_parties: usize,
    rng: &mut R,
) -> Vec<Gfp> {
    let mut shares: Vec<Gfp> = (1..num_parties).map(|_| field.random(rng)).collect();
    let sum = field.sum(&shares);
    shares.push(field.sub(value, &sum));
    shares
}

/// Random valid triple and its additive sharing.
pub fn deal_triple<R: Rng + ?Sized>(
    field: &PrimeField,
    num_parties: usize,
    rng: &mut R,
) -> (Triple, Vec<TripleShare>) {
    let a = field.random(rng);
    let b = field.random(rng);
    let c = field.mul(&a, &b);
    let shares = izip!(
        share_additively(field, &a, num_parties, rng),
        share_additively(field, &b, num_parties, rng),
        share_additively(field, &c, num_parties, rng)
    )
    .map(|(a, b, c)| TripleShare { a, b, c })
    .collect();
    (Triple { a, b, c }, shares)
}

/// Additive sharing of `(y, r, y * r)` for a fresh random `r`.
pub fn deal_result<R: Rng + ?Sized>(
    field: &PrimeField,
    y: &Gfp,
    num_parties: usize,
    rng: &mut R,
) -> Vec<ResultShare> {
    let r = field.random(rng);
    let w = field.mul(y, &r);
    izip!(
        share_additively(field, y, num_parties, rng),
        share_additively(field, &r, num_parties, rng),
        share_additively(field, &w, num_parties, rng)
    )
    .map(|(y, r, w)| ResultShare { y, r, w })
    .collect()
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use num_traits::One;

    use super::*;

    fn field() -> PrimeField {
        PrimeField::new((BigUint::one() << 127u32) - 1u32).unwrap()
    }

    #[test]
    fn test_additive_shares_sum_to_value() {
        let field = field();
        let mut rng = SmallRng::seed_from_u64(11);
        for num_parties in 1..5 {
            let value = field.random(&mut rng);
            let shares = share_additively(&field, &value, num_parties, &mut rng);
            assert_eq!(shares.len(), num_parties);
            assert_eq!(field.sum(&shares), value);
        }
    }

    #[test]
    fn test_dealt_triple_is_consistent() {
        let field = field();
        let mut rng = SmallRng::seed_from_u64(12);
        let (triple, shares) = deal_triple(&field, 3, &mut rng);
        assert!(triple.is_valid(&field));
        assert_eq!(field.sum(shares.iter().map(|s| &s.a)), triple.a);
        assert_eq!(field.sum(shares.iter().map(|s| &s.b)), triple.b);
        assert_eq!(field.sum(shares.iter().map(|s| &s.c)), triple.c);
    }

    #[test]
    fn test_highest_bidder_prefers_first_on_ties() {
        let field = field();
        let parties = SimulatedParties::new(field.clone(), 2, 0);
        let inputs = vec![
            (0, field.from_i64(-5)),
            (1, field.from_i64(7)),
            (2, field.from_i64(7)),
        ];
        assert_eq!(parties.highest_bidder(&inputs), field.from_u64(1));
    }

    #[tokio::test]
    async fn test_round_without_finishing_client() {
        let parties = SimulatedParties::new(field(), 2, 0);
        assert!(matches!(
            parties.run().await,
            Err(SimulatorError::RoundNotFinished)
        ));
    }
}
