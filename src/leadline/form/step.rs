// SPDX-License-Identifier: MIT

//! The closed set of form steps and their forward-only transition order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of the intake form, in strict forward order.
///
/// Completion is not a step: the machine reports it as a distinct outcome
/// and the session is destroyed at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Name,
    Country,
    Phone,
    ContactTime,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Name, Step::Country, Step::Phone, Step::ContactTime];

    /// The step that follows this one, or `None` for the final step.
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Name => Some(Step::Country),
            Step::Country => Some(Step::Phone),
            Step::Phone => Some(Step::ContactTime),
            Step::ContactTime => None,
        }
    }

    /// Key under which this step's accepted value is checkpointed.
    pub fn field_key(self) -> &'static str {
        match self {
            Step::Name => "name",
            Step::Country => "country",
            Step::Phone => "phone",
            Step::ContactTime => "contact_time",
        }
    }

    pub fn as_str(self) -> &'static str {
        self.field_key()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Step::Name),
            "country" => Ok(Step::Country),
            "phone" => Ok(Step::Phone),
            "contact_time" => Ok(Step::ContactTime),
            other => Err(format!("unknown form step: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain_ends_at_contact_time() {
        let mut step = Step::Name;
        let mut visited = vec![step];
        while let Some(next) = step.next() {
            visited.push(next);
            step = next;
        }
        assert_eq!(visited, Step::ALL);
    }

    #[test]
    fn test_steps_are_ordered() {
        assert!(Step::Name < Step::Country);
        assert!(Step::Country < Step::Phone);
        assert!(Step::Phone < Step::ContactTime);
    }

    #[test]
    fn test_str_round_trip() {
        for step in Step::ALL {
            assert_eq!(step.as_str().parse::<Step>().unwrap(), step);
        }
        assert!("completed".parse::<Step>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Step::ContactTime).unwrap(),
            "\"contact_time\""
        );
    }
}
