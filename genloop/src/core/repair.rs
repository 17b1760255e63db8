//! Pure planning for the repair pass.
//!
//! The planner only sees the names of one directory; applying the plan is left
//! to [`crate::io::repair`].

use std::collections::BTreeSet;

use crate::core::error::NamingIssue;
use crate::core::sanitize::{Sanitizer, is_well_formed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Already in sanitized form; left alone.
    WellFormed,
    /// Renamed to `target`.
    Malformed { target: String, issues: Vec<NamingIssue> },
    /// No recognizable name could be recovered; reported and left alone.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedName {
    pub name: String,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub entries: Vec<PlannedName>,
}

impl RepairPlan {
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.classification {
                Classification::Malformed { target, .. } => {
                    Some((entry.name.as_str(), target.as_str()))
                }
                _ => None,
            })
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.classification == Classification::Ambiguous)
            .map(|entry| entry.name.as_str())
    }

    pub fn is_noop(&self) -> bool {
        self.renames().next().is_none()
    }
}

/// Plan renames for the file names of one directory.
///
/// Names are processed in sorted order. Every original name counts as taken, and
/// each chosen target is added as it is picked, so targets never collide with
/// each other or with files that stay.
pub fn plan_repair<S: AsRef<str>>(names: &[S], sanitizer: &Sanitizer) -> RepairPlan {
    plan_repair_with_reserved(names, &BTreeSet::new(), sanitizer)
}

/// Like [`plan_repair`], but targets also avoid `reserved` (for example the
/// names of sibling directories, which are never renamed).
pub fn plan_repair_with_reserved<S: AsRef<str>>(
    names: &[S],
    reserved: &BTreeSet<String>,
    sanitizer: &Sanitizer,
) -> RepairPlan {
    let sorted: BTreeSet<&str> = names.iter().map(|name| name.as_ref()).collect();
    let mut taken: BTreeSet<String> = sorted.iter().map(|name| name.to_string()).collect();
    taken.extend(reserved.iter().cloned());
    let mut entries = Vec::with_capacity(sorted.len());

    for name in sorted {
        let classification = if is_well_formed(name) {
            Classification::WellFormed
        } else if !sanitizer.has_usable_name(name) {
            Classification::Ambiguous
        } else {
            taken.remove(name);
            let sanitized = sanitizer.sanitize(name, &taken, None);
            taken.insert(sanitized.name.clone());
            Classification::Malformed {
                target: sanitized.name,
                issues: sanitized.issues,
            }
        };
        entries.push(PlannedName {
            name: name.to_string(),
            classification,
        });
    }

    RepairPlan { entries }
}
