use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info};

use crate::{
    error::{ClientError, ProtocolError},
    fields::{Gfp, PrimeField},
    messages::{PartyMessage, ResultShare},
    transport::PartyConnections,
};

/// Revealed value `y` together with random mask `r` and their product `w`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultBundle {
    pub y: Gfp,
    pub r: Gfp,
    pub w: Gfp,
}

impl ResultBundle {
    pub fn zero(field: &PrimeField) -> Self {
        Self {
            y: field.zero(),
            r: field.zero(),
            w: field.zero(),
        }
    }

    /// Add share received from given party.
    pub fn accumulate(
        &mut self,
        field: &PrimeField,
        party_id: usize,
        share: &ResultShare,
    ) -> Result<(), ProtocolError> {
        if ![&share.y, &share.r, &share.w]
            .into_iter()
            .all(|x| field.contains(x))
        {
            return Err(ProtocolError::NonCanonicalElement { party_id });
        }
        self.y = field.add(&self.y, &share.y);
        self.r = field.add(&self.r, &share.r);
        self.w = field.add(&self.w, &share.w);
        Ok(())
    }

    /// Sum result shares from all parties. Fails if no party contributed.
    pub fn combine(
        field: &PrimeField,
        messages: impl IntoIterator<Item = (usize, PartyMessage)>,
    ) -> Result<Self, ProtocolError> {
        let mut bundle = Self::zero(field);
        let mut contributed = false;
        for (party_id, msg) in messages {
            contributed = true;
            match msg {
                PartyMessage::ResultShare(share) => bundle.accumulate(field, party_id, &share)?,
                _ => {
                    return Err(ProtocolError::UnexpectedMessage {
                        party_id,
                        expected: "result share",
                    })
                }
            }
        }
        if !contributed {
            return Err(ProtocolError::NoShares);
        }
        Ok(bundle)
    }

    /// Authenticate the bundle, returning `y` only if `y * r = w`.
    pub fn verify(self, field: &PrimeField) -> Result<Gfp, ClientError> {
        if field.mul(&self.y, &self.r) != self.w {
            error!("Unable to authenticate output value as correct, aborting.");
            return Err(ClientError::Authentication);
        }
        Ok(self.y)
    }
}

/// Receive result shares from all parties, sum them and authenticate the result.
pub async fn reveal<C>(
    field: &PrimeField,
    connections: &mut PartyConnections<C>,
) -> Result<Gfp, ClientError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let messages = connections
        .receive_from_all()
        .await
        .map_err(ProtocolError::from)?;
    let result = ResultBundle::combine(field, messages)?.verify(field)?;
    info!("Output value authenticated");
    Ok(result)
}
