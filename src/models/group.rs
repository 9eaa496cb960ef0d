use super::file::FileRecord;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a companion relates to its group's primary file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssociationKind {
    Index,
    MatePair,
    Sidecar,
}

/// A file attached to a group's primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Companion {
    pub record: FileRecord,
    pub association_kind: AssociationKind,
}

/// A primary file plus its detected companions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationGroup {
    pub primary: FileRecord,
    pub companions: Vec<Companion>,
}

impl AssociationGroup {
    pub fn singleton(primary: FileRecord) -> Self {
        Self {
            primary,
            companions: Vec::new(),
        }
    }

    pub fn backend_id(&self) -> &str {
        &self.primary.backend_id
    }

    /// Attach a companion; companions keep insertion order
    pub fn push(&mut self, record: FileRecord, association_kind: AssociationKind) {
        self.companions.push(Companion {
            record,
            association_kind,
        });
    }

    /// Primary first, then companions in order
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        std::iter::once(&self.primary).chain(self.companions.iter().map(|c| &c.record))
    }

    pub fn len(&self) -> usize {
        1 + self.companions.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn companions_of_kind(&self, kind: AssociationKind) -> impl Iterator<Item = &Companion> {
        self.companions
            .iter()
            .filter(move |c| c.association_kind == kind)
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.records().map(|r| r.size_bytes).sum()
    }
}
