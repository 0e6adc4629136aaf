use proptest::prelude::*;

use plaudit_types::{EndorsementFields, ProposalId, SessionToken, Timestamp, TOKEN_BYTES};

proptest! {
    /// Any string over the allowed alphabet within the length bound parses.
    #[test]
    fn allowed_alphabet_always_parses(raw in "[A-Za-z0-9-]{1,128}") {
        let id = ProposalId::parse(raw.clone()).unwrap();
        prop_assert_eq!(id.as_str(), raw.as_str());
    }

    /// A single foreign character anywhere makes the id invalid.
    #[test]
    fn one_foreign_char_rejects(
        prefix in "[a-z0-9-]{0,20}",
        bad in "[ :/!?#%.,_\\\\]",
        suffix in "[a-z0-9-]{0,20}",
    ) {
        let raw = format!("{prefix}{bad}{suffix}");
        prop_assert!(ProposalId::parse(raw).is_err());
    }

    /// A valid id can never contain the key separator.
    #[test]
    fn valid_ids_never_contain_separator(raw in ".{0,40}") {
        if let Ok(id) = ProposalId::parse(raw) {
            prop_assert!(!id.as_str().contains(':'));
        }
    }

    /// Tokens built from any bytes are accepted back by `parse`.
    #[test]
    fn token_from_bytes_parses(bytes in prop::array::uniform32(any::<u8>())) {
        let token = SessionToken::from_bytes(&bytes);
        prop_assert_eq!(token.as_str().len(), TOKEN_BYTES * 2);
        prop_assert!(SessionToken::parse(token.as_str()).is_ok());
    }

    /// Endorsement fields are stored trimmed and never blank.
    #[test]
    fn fields_are_trimmed(title in "\\PC{0,30}", employer in "\\PC{0,30}") {
        match EndorsementFields::new(&title, &employer) {
            Ok(fields) => {
                prop_assert_eq!(fields.job_title(), title.trim());
                prop_assert_eq!(fields.employer(), employer.trim());
                prop_assert!(!fields.job_title().is_empty());
                prop_assert!(!fields.employer().is_empty());
            }
            Err(_) => prop_assert!(title.trim().is_empty() || employer.trim().is_empty()),
        }
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }
}
