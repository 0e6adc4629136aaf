//! Aggregate statistics snapshots.

use serde::{Deserialize, Serialize};

use crate::{ProposalId, Timestamp};

/// Endorsement count for one organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationCount {
    pub name: String,
    pub count: u64,
}

/// Statistics across every proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_endorsements: u64,
    pub unique_organizations: u64,
    /// Ordered by count descending, then name ascending.
    pub top_organizations: Vec<OrganizationCount>,
    pub generated_at: Timestamp,
}

impl GlobalStats {
    pub fn empty(generated_at: Timestamp) -> Self {
        Self {
            total_endorsements: 0,
            unique_organizations: 0,
            top_organizations: Vec::new(),
            generated_at,
        }
    }
}

/// Statistics for a single proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStats {
    pub proposal_id: String,
    pub total: u64,
}

impl ProposalStats {
    pub fn new(proposal: &ProposalId, total: u64) -> Self {
        Self {
            proposal_id: proposal.to_string(),
            total,
        }
    }
}

/// Either flavour of statistics, as returned by the stats operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatsSnapshot {
    Global(GlobalStats),
    Proposal(ProposalStats),
}
