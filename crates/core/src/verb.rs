//! Workflow verbs

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Action keyword performed on a target.
///
/// The set is closed: the state projector gives `SUBMIT`/`WITHDRAW`,
/// `LOCK`/`UNLOCK`, `APPROVE` and `REJECT` a fixed meaning, the others are
/// plain attestations (e.g. `RELEASE` for printing a document).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verb {
    Submit,
    Verify,
    Approve,
    Release,
    Withdraw,
    Reject,
    Lock,
    Unlock,
}

impl Verb {
    /// Stable uppercase code, identical to `Display`
    pub fn code(&self) -> &'static str {
        self.into()
    }

    /// Human label used by catalog defaults
    pub fn label(&self) -> &'static str {
        match self {
            Verb::Submit => "Submit",
            Verb::Verify => "Verify",
            Verb::Approve => "Approve",
            Verb::Release => "Release/Print",
            Verb::Withdraw => "Withdraw",
            Verb::Reject => "Reject",
            Verb::Lock => "Lock",
            Verb::Unlock => "Unlock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_verb_parse_case_insensitive() {
        assert_eq!("approve".parse::<Verb>().unwrap(), Verb::Approve);
        assert_eq!("SUBMIT".parse::<Verb>().unwrap(), Verb::Submit);
        assert_eq!("UnLock".parse::<Verb>().unwrap(), Verb::Unlock);
        assert!("SHRED".parse::<Verb>().is_err());
    }

    #[test]
    fn test_display_matches_code() {
        for verb in Verb::iter() {
            assert_eq!(verb.to_string(), verb.code());
        }
        assert_eq!(Verb::Approve.code(), "APPROVE");
        assert_eq!(Verb::Unlock.code(), "UNLOCK");
    }

    #[test]
    fn test_serde_uses_uppercase() {
        let json = serde_json::to_string(&Verb::Withdraw).unwrap();
        assert_eq!(json, "\"WITHDRAW\"");
    }
}
