//! Roster people, panels, and the selected/remaining partition.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One eligible person from the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Source identifier (value of the configured id column).
    pub id: String,
    /// Category name -> value carried by this person.
    pub attributes: HashMap<String, String>,
    /// Normalized concatenation of the configured address columns, used for
    /// same-address flagging. `None` when address checking is off.
    pub address_key: Option<String>,
}

/// A set of distinct selected-person identifiers produced by the algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub members: Vec<String>,
}

impl Panel {
    /// Validate that the panel's members are distinct and all drawn from the
    /// roster.
    pub fn validate_against(&self, roster: &[Person]) -> Result<(), CoreError> {
        let mut seen = HashSet::with_capacity(self.members.len());
        for id in &self.members {
            if !seen.insert(id.as_str()) {
                return Err(CoreError::Internal(format!(
                    "Panel contains duplicate member \"{id}\""
                )));
            }
        }
        let roster_ids: HashSet<&str> = roster.iter().map(|p| p.id.as_str()).collect();
        for id in &self.members {
            if !roster_ids.contains(id.as_str()) {
                return Err(CoreError::Internal(format!(
                    "Panel member \"{id}\" is not in the roster"
                )));
            }
        }
        Ok(())
    }
}

/// Split the full roster into the selected people (panel order) and everyone
/// else (roster order).
pub fn partition<'a>(roster: &'a [Person], panel: &Panel) -> (Vec<&'a Person>, Vec<&'a Person>) {
    let by_id: HashMap<&str, &Person> = roster.iter().map(|p| (p.id.as_str(), p)).collect();
    let selected_ids: HashSet<&str> = panel.members.iter().map(String::as_str).collect();

    let selected: Vec<&Person> = panel
        .members
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .collect();
    let remaining: Vec<&Person> = roster
        .iter()
        .filter(|p| !selected_ids.contains(p.id.as_str()))
        .collect();

    (selected, remaining)
}

/// Ids of selected people who share an address key with another selected
/// person. Returned in panel order, each id at most once.
pub fn flag_same_address(selected: &[&Person]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for person in selected {
        if let Some(key) = person.address_key.as_deref() {
            *counts.entry(key).or_default() += 1;
        }
    }

    selected
        .iter()
        .filter(|p| {
            p.address_key
                .as_deref()
                .is_some_and(|key| counts[key] > 1)
        })
        .map(|p| p.id.clone())
        .collect()
}
