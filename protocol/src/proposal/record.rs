//! Wire form of a proposal as the coordinating service stores it.

use serde::{Deserialize, Serialize};

use super::state::{Accepted, Broadcast, Draft, Pending, Proposal, Rejected, Removed};
use super::types::{Action, ProposalBody};
use super::ProposalError;
use crate::codec::{Encodable, Hash256};
use crate::crypto::keys::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Created but not published.
    Temporary,
    Pending,
    Accepted,
    Rejected,
    Broadcasted,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRecord {
    #[serde(flatten)]
    pub body: ProposalBody,
    pub status: ProposalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_signature: Option<Signature>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Hex of the unsigned transaction the service built, or of the signed
    /// one once broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<Hash256>,
}

impl ProposalRecord {
    pub fn raw_bytes(&self) -> Result<Option<Vec<u8>>, ProposalError> {
        self.raw
            .as_deref()
            .map(|r| hex::decode(r).map_err(|e| ProposalError::InvalidRecord(format!("raw: {}", e))))
            .transpose()
    }
}

impl From<&Draft> for ProposalRecord {
    fn from(draft: &Draft) -> Self {
        Self {
            body: draft.body().clone(),
            status: ProposalStatus::Temporary,
            proposal_signature: None,
            actions: Vec::new(),
            raw: Some(draft.transaction().encode_hex()),
            txid: None,
        }
    }
}

impl From<&Pending> for ProposalRecord {
    fn from(pending: &Pending) -> Self {
        Self {
            body: pending.body().clone(),
            status: ProposalStatus::Pending,
            proposal_signature: Some(*pending.proposal_signature()),
            actions: pending.actions().to_vec(),
            raw: Some(pending.body().build_transaction().encode_hex()),
            txid: None,
        }
    }
}

impl TryFrom<ProposalRecord> for Proposal {
    type Error = ProposalError;

    fn try_from(record: ProposalRecord) -> Result<Self, Self::Error> {
        let status = record.status;
        let missing = |what: &str| ProposalError::InvalidRecord(format!("{:?} proposal without {}", status, what));
        if status != ProposalStatus::Removed {
            record.body.check_bounds()?;
        }
        Ok(match status {
            ProposalStatus::Temporary => Proposal::Draft(Draft::new(record.body)),
            ProposalStatus::Pending => {
                let sig = record.proposal_signature.ok_or_else(|| missing("a proposal signature"))?;
                Proposal::Pending(Pending::from_parts(record.body, sig, record.actions))
            }
            ProposalStatus::Accepted => {
                let sig = record.proposal_signature.ok_or_else(|| missing("a proposal signature"))?;
                Proposal::Accepted(Accepted::from_parts(record.body, sig, record.actions))
            }
            ProposalStatus::Rejected => Proposal::Rejected(Rejected::from_parts(record.body, record.actions)),
            ProposalStatus::Broadcasted => {
                let txid = record.txid.ok_or_else(|| missing("a txid"))?;
                let raw = match record.raw.as_deref() {
                    Some(r) => hex::decode(r).map_err(|e| ProposalError::InvalidRecord(e.to_string()))?,
                    None => Vec::new(),
                };
                Proposal::Broadcast(Broadcast::from_parts(record.body, record.actions, txid, raw))
            }
            ProposalStatus::Removed => Proposal::Removed(Removed { id: record.body.id }),
        })
    }
}
