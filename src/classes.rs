//! Behavior categories and the user's class selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use anyhow::{anyhow, Result};

/// Classroom behaviors in model output index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BehaviorClass {
    HandRaising,
    Reading,
    Writing,
    PhoneUse,
    HeadDown,
    Sleeping,
}

impl BehaviorClass {
    pub const ALL: [BehaviorClass; 6] = [
        BehaviorClass::HandRaising,
        BehaviorClass::Reading,
        BehaviorClass::Writing,
        BehaviorClass::PhoneUse,
        BehaviorClass::HeadDown,
        BehaviorClass::Sleeping,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BehaviorClass::HandRaising => "hand-raising",
            BehaviorClass::Reading => "reading",
            BehaviorClass::Writing => "writing",
            BehaviorClass::PhoneUse => "phone use",
            BehaviorClass::HeadDown => "head down",
            BehaviorClass::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn default_class_names() -> Vec<String> {
    BehaviorClass::ALL
        .iter()
        .map(|class| class.label().to_string())
        .collect()
}

/// Set of class ids the detector should report on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassSelection(BTreeSet<usize>);

impl ClassSelection {
    pub fn new<I: IntoIterator<Item = usize>>(ids: I) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Every class in `0..count`.
    pub fn all(count: usize) -> Self {
        Self::new(0..count)
    }

    pub fn contains(&self, class_id: usize) -> bool {
        self.0.contains(&class_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma-separated id list such as `"0, 2,5"`. `"all"` selects `0..class_count`.
    pub fn parse(value: &str, class_count: usize) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(Self::all(class_count));
        }
        let mut ids = BTreeSet::new();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let id: usize = entry
                .parse()
                .map_err(|_| anyhow!("class id '{}' is not a non-negative integer", entry))?;
            if id >= class_count {
                return Err(anyhow!(
                    "class id {} is out of range (known classes: {})",
                    id,
                    class_count
                ));
            }
            ids.insert(id);
        }
        Ok(Self(ids))
    }
}

impl fmt::Display for ClassSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(","))
    }
}
