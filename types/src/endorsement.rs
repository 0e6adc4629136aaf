//! Endorsement records.

use serde::{Deserialize, Serialize};

use crate::{Identity, IdentityId, ProposalId, Timestamp, TypesError};

/// Descriptive fields supplied (or re-confirmed) by the endorser.
///
/// Both fields are required and stored trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndorsementFields {
    job_title: String,
    employer: String,
}

impl EndorsementFields {
    /// Trim and validate. Reports every missing field at once.
    pub fn new(job_title: &str, employer: &str) -> Result<Self, TypesError> {
        let job_title = job_title.trim();
        let employer = employer.trim();

        let mut missing = Vec::new();
        if job_title.is_empty() {
            missing.push("jobTitle");
        }
        if employer.is_empty() {
            missing.push("employer");
        }
        if !missing.is_empty() {
            return Err(TypesError::MissingFields(missing));
        }

        Ok(Self {
            job_title: job_title.to_string(),
            employer: employer.to_string(),
        })
    }

    pub fn job_title(&self) -> &str {
        &self.job_title
    }

    pub fn employer(&self) -> &str {
        &self.employer
    }
}

/// One identity's endorsement of one proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endorsement {
    pub proposal_id: ProposalId,
    pub identity: IdentityId,
    pub display_name: String,
    pub job_title: String,
    pub employer: String,
    /// When the record was last written.
    pub timestamp: Timestamp,
}

impl Endorsement {
    pub fn new(
        proposal_id: ProposalId,
        identity: &Identity,
        fields: EndorsementFields,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            proposal_id,
            identity: identity.id.clone(),
            display_name: identity.display_name.clone(),
            job_title: fields.job_title,
            employer: fields.employer,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_trimmed() {
        let fields = EndorsementFields::new("  Engineer ", "\tAcme\n").unwrap();
        assert_eq!(fields.job_title(), "Engineer");
        assert_eq!(fields.employer(), "Acme");
    }

    #[test]
    fn blank_fields_are_all_reported() {
        match EndorsementFields::new(" ", "") {
            Err(TypesError::MissingFields(missing)) => {
                assert_eq!(missing, vec!["jobTitle", "employer"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            EndorsementFields::new("Engineer", " "),
            Err(TypesError::MissingFields(m)) if m == vec!["employer"]
        ));
    }

    #[test]
    fn record_serializes_in_camel_case() {
        let identity = Identity::new(IdentityId::parse("0000-0001").unwrap(), "Ada");
        let record = Endorsement::new(
            ProposalId::parse("alpha-beta").unwrap(),
            &identity,
            EndorsementFields::new("Engineer", "Acme").unwrap(),
            Timestamp::new(7),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["proposalId"], "alpha-beta");
        assert_eq!(json["displayName"], "Ada");
        assert_eq!(json["jobTitle"], "Engineer");
        assert_eq!(json["timestamp"], 7);
    }
}
