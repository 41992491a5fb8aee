use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fields::Gfp;

/// Whether the client closes the current round of inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundControl {
    /// More clients will join this round.
    Continue,
    /// Stop the round and compute the result.
    Finish,
}

impl RoundControl {
    pub fn is_finish(self) -> bool {
        self == RoundControl::Finish
    }
}

impl FromStr for RoundControl {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(RoundControl::Continue),
            "1" => Ok(RoundControl::Finish),
            _ => Err("Finish flag must be 0 (false) or 1 (true)"),
        }
    }
}

/// Messages sent by client to every computation party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    RoundControl { finish: bool },
    /// Inputs masked with the first component of their triples.
    MaskedInputs(Vec<Gfp>),
}

/// Messages sent by a computation party to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyMessage {
    /// One triple share per client input.
    TripleShares(Vec<TripleShare>),
    ResultShare(ResultShare),
}

/// One party's additive share of a triple `(a, b, c)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleShare {
    pub a: Gfp,
    pub b: Gfp,
    pub c: Gfp,
}

/// One party's additive share of an authenticated result `(y, r, y * r)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultShare {
    pub y: Gfp,
    pub r: Gfp,
    pub w: Gfp,
}
