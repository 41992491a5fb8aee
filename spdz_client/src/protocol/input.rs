use itertools::Itertools;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::{
    error::{ClientError, ProtocolError},
    fields::{Gfp, PrimeField},
    messages::{ClientMessage, PartyMessage, TripleShare},
    transport::PartyConnections,
};

/// Multiplicative triple `(a, b, c)`, valid if `a * b = c`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triple {
    pub a: Gfp,
    pub b: Gfp,
    pub c: Gfp,
}

impl Triple {
    pub fn zero(field: &PrimeField) -> Self {
        Self {
            a: field.zero(),
            b: field.zero(),
            c: field.zero(),
        }
    }

    /// Add share received from given party.
    pub fn accumulate(
        &mut self,
        field: &PrimeField,
        party_id: usize,
        share: &TripleShare,
    ) -> Result<(), ProtocolError> {
        if ![&share.a, &share.b, &share.c]
            .into_iter()
            .all(|x| field.contains(x))
        {
            return Err(ProtocolError::NonCanonicalElement { party_id });
        }
        self.a = field.add(&self.a, &share.a);
        self.b = field.add(&self.b, &share.b);
        self.c = field.add(&self.c, &share.c);
        Ok(())
    }

    pub fn is_valid(&self, field: &PrimeField) -> bool {
        field.mul(&self.a, &self.b) == self.c
    }
}

/// Sum triple shares from all parties, one triple per input.
/// Fails if no party contributed.
pub fn combine_triples(
    field: &PrimeField,
    num_inputs: usize,
    messages: impl IntoIterator<Item = (usize, PartyMessage)>,
) -> Result<Vec<Triple>, ProtocolError> {
    let mut triples = vec![Triple::zero(field); num_inputs];
    let mut contributed = false;

    for (party_id, msg) in messages {
        contributed = true;
        let shares = match msg {
            PartyMessage::TripleShares(shares) => shares,
            _ => {
                return Err(ProtocolError::UnexpectedMessage {
                    party_id,
                    expected: "triple shares",
                })
            }
        };
        if shares.len() != num_inputs {
            return Err(ProtocolError::TripleCount {
                party_id,
                received: shares.len(),
                expected: num_inputs,
            });
        }
        for (triple, share) in triples.iter_mut().zip_eq(&shares) {
            triple.accumulate(field, party_id, share)?;
        }
    }

    if !contributed {
        return Err(ProtocolError::NoShares);
    }
    Ok(triples)
}

/// Check all summed triples. Fails on the first triple with `a * b != c`.
pub fn check_triples(field: &PrimeField, triples: &[Triple]) -> Result<(), ClientError> {
    match triples.iter().position(|triple| !triple.is_valid(field)) {
        Some(index) => {
            error!("Incorrect triple at {}, aborting", index);
            Err(ClientError::TripleMismatch { index })
        }
        None => Ok(()),
    }
}

/// Mask every input with the first component of its triple.
pub fn mask_inputs(field: &PrimeField, values: &[Gfp], triples: &[Triple]) -> Vec<Gfp> {
    values
        .iter()
        .zip_eq(triples)
        .map(|(value, triple)| field.add(value, &triple.a))
        .collect()
}

/// Submit private inputs: receive a triple per input from every party, check
/// the summed triples and broadcast the masked inputs. Nothing is sent if a
/// triple does not check out.
pub async fn submit<C>(
    field: &PrimeField,
    values: &[Gfp],
    connections: &mut PartyConnections<C>,
) -> Result<(), ClientError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let messages = connections
        .receive_from_all()
        .await
        .map_err(ProtocolError::from)?;
    let triples = combine_triples(field, values.len(), messages)?;
    check_triples(field, &triples)?;
    debug!("{} triples verified", triples.len());

    let masked = mask_inputs(field, values, &triples);
    connections
        .send_to_all(ClientMessage::MaskedInputs(masked))
        .await
        .map_err(ProtocolError::from)?;

    info!("Sent private inputs to each SPDZ engine, waiting for result...");
    Ok(())
}

/// Submit a single private value.
pub async fn submit_value<C>(
    field: &PrimeField,
    value: &Gfp,
    connections: &mut PartyConnections<C>,
) -> Result<(), ClientError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    submit(field, std::slice::from_ref(value), connections).await
}
