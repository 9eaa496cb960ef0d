//! Grouping of primary files with their companions.
//!
//! Rules run in priority order over one backend's records at a time and each
//! record is consumed at most once:
//!
//! 1. BAM/CRAM with `.bai`/`.crai` (either `x.bam.bai` or `x.bai` naming)
//! 2. FASTQ mates differing only by `_R1`/`_R2` or `_1`/`_2`
//! 3. FASTA with `.fai`, `.dict` and the BWA index suite
//! 4. VCF/GVCF/BCF with `.tbi`/`.csi`
//! 5. everything left becomes a singleton

mod rules;

pub use rules::{completeness, expected_companions};

use crate::models::{AssociationGroup, AssociationKind, FileRecord, FileType};
use rules::{mate_of, reference_stem, strip_extension, MateKey, REFERENCE_COMPANIONS, VARIANT_INDEXES};
use std::collections::{BTreeMap, HashMap};

/// Stateless grouping engine
#[derive(Debug, Clone, Copy, Default)]
pub struct AssociationDetector;

impl AssociationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Partition records into groups. Output is sorted by
    /// `(backend_id, primary path)` and independent of input order.
    pub fn group(&self, records: Vec<FileRecord>) -> Vec<AssociationGroup> {
        let mut by_backend: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in records {
            by_backend
                .entry(record.backend_id.clone())
                .or_default()
                .push(record);
        }

        by_backend
            .into_values()
            .flat_map(|records| BackendGrouping::new(records).run())
            .collect()
    }
}

/// Rule application over a single backend's records
struct BackendGrouping {
    records: Vec<FileRecord>,
    by_path: HashMap<String, usize>,
    consumed: Vec<bool>,
    groups: Vec<(usize, Vec<(usize, AssociationKind)>)>,
}

impl BackendGrouping {
    fn new(mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records.dedup_by(|a, b| a.path == b.path);

        let by_path = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.path.clone(), i))
            .collect();
        let consumed = vec![false; records.len()];

        Self {
            records,
            by_path,
            consumed,
            groups: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<AssociationGroup> {
        self.alignment_indexes();
        self.mate_pairs();
        self.reference_indexes();
        self.variant_indexes();
        self.singletons();
        self.into_groups()
    }

    /// Unconsumed record at `path` with the given type
    fn available(&self, path: &str, file_type: FileType) -> Option<usize> {
        self.by_path
            .get(path)
            .copied()
            .filter(|&i| !self.consumed[i] && self.records[i].file_type == file_type)
    }

    fn primaries_of(&self, types: &[FileType]) -> Vec<usize> {
        (0..self.records.len())
            .filter(|&i| !self.consumed[i] && types.contains(&self.records[i].file_type))
            .collect()
    }

    fn commit(&mut self, primary: usize, companions: Vec<(usize, AssociationKind)>) {
        self.consumed[primary] = true;
        for (i, _) in &companions {
            self.consumed[*i] = true;
        }
        self.groups.push((primary, companions));
    }

    fn alignment_indexes(&mut self) {
        for primary in self.primaries_of(&[FileType::Bam, FileType::Cram]) {
            let path = self.records[primary].path.clone();
            let (ext, index_ext, index_type) = match self.records[primary].file_type {
                FileType::Bam => ("bam", "bai", FileType::Bai),
                _ => ("cram", "crai", FileType::Crai),
            };

            let mut candidates = vec![format!("{path}.{index_ext}")];
            if let Some(stem) = strip_extension(&path, &[ext]) {
                candidates.push(format!("{stem}.{index_ext}"));
            }

            if let Some(index) = candidates
                .iter()
                .find_map(|candidate| self.available(candidate, index_type))
            {
                self.commit(primary, vec![(index, AssociationKind::Index)]);
            }
        }
    }

    fn mate_pairs(&mut self) {
        let mut mates: BTreeMap<MateKey, [Option<usize>; 2]> = BTreeMap::new();
        for i in self.primaries_of(&[FileType::Fastq]) {
            if let Some((key, mate)) = mate_of(&self.records[i].path) {
                let slot = &mut mates.entry(key).or_default()[usize::from(mate - 1)];
                slot.get_or_insert(i);
            }
        }

        for pair in mates.into_values() {
            if let [Some(first), Some(second)] = pair {
                // Records are path-sorted, so the lower index is lexicographically first
                let (primary, mate) = (first.min(second), first.max(second));
                self.commit(primary, vec![(mate, AssociationKind::MatePair)]);
            }
        }
    }

    fn reference_indexes(&mut self) {
        for primary in self.primaries_of(&[FileType::Fasta]) {
            let path = self.records[primary].path.clone();
            let stem = reference_stem(&path).map(str::to_string);

            let mut companions = Vec::new();
            for (ext, kind) in REFERENCE_COMPANIONS {
                let expected_type = FileType::from_path(&format!("x.{ext}"));
                let mut candidates = vec![format!("{path}.{ext}")];
                if let Some(stem) = &stem {
                    candidates.push(format!("{stem}.{ext}"));
                }

                let found = candidates
                    .iter()
                    .find_map(|candidate| self.available(candidate, expected_type))
                    .filter(|i| !companions.iter().any(|(c, _)| c == i));
                if let Some(index) = found {
                    companions.push((index, *kind));
                }
            }

            if !companions.is_empty() {
                self.commit(primary, companions);
            }
        }
    }

    fn variant_indexes(&mut self) {
        for primary in self.primaries_of(&[FileType::Vcf, FileType::Gvcf, FileType::Bcf]) {
            let path = self.records[primary].path.clone();
            let companions: Vec<(usize, AssociationKind)> = VARIANT_INDEXES
                .iter()
                .filter_map(|ext| {
                    let candidate = format!("{path}.{ext}");
                    let index_type = FileType::from_path(&candidate);
                    self.available(&candidate, index_type)
                })
                .map(|i| (i, AssociationKind::Index))
                .collect();

            if !companions.is_empty() {
                self.commit(primary, companions);
            }
        }
    }

    fn singletons(&mut self) {
        for i in 0..self.records.len() {
            if !self.consumed[i] {
                self.commit(i, Vec::new());
            }
        }
    }

    fn into_groups(self) -> Vec<AssociationGroup> {
        let mut slots: Vec<Option<FileRecord>> = self.records.into_iter().map(Some).collect();
        let mut groups: Vec<AssociationGroup> = self
            .groups
            .into_iter()
            .filter_map(|(primary, companions)| {
                let mut group = AssociationGroup::singleton(slots[primary].take()?);
                for (i, kind) in companions {
                    if let Some(record) = slots[i].take() {
                        group.push(record, kind);
                    }
                }
                Some(group)
            })
            .collect();

        groups.sort_by(|a, b| a.primary.path.cmp(&b.primary.path));
        groups
    }
}
