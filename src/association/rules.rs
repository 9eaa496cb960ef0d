//! Companion naming rules and the expected-companion table

use crate::models::{file_name, is_compressed, strip_compression, AssociationGroup, AssociationKind, FileType};
use once_cell::sync::Lazy;
use regex::Regex;

/// `<stem><_R|_><1|2>.<fastq|fq>[.<compression>]`
static MATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<stem>.+?)(?P<sep>_R?)(?P<mate>[12])(?P<ext>\.(?:fastq|fq)(?:\.(?:gz|bgz|bz2|zst))?)$")
        .expect("mate pattern is valid")
});

/// Extensions a FASTA's companions may carry, in attachment order
pub(crate) const REFERENCE_COMPANIONS: &[(&str, AssociationKind)] = &[
    ("fai", AssociationKind::Index),
    ("dict", AssociationKind::Sidecar),
    ("amb", AssociationKind::Index),
    ("ann", AssociationKind::Index),
    ("bwt", AssociationKind::Index),
    ("pac", AssociationKind::Index),
    ("sa", AssociationKind::Index),
];

/// Index extensions accepted for variant files
pub(crate) const VARIANT_INDEXES: &[&str] = &["tbi", "csi"];

/// Which mate of a pair a FASTQ path is
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct MateKey {
    pub stem: String,
    pub separator: String,
    pub extension: String,
}

/// Parse a FASTQ path into its pairing key and mate number
pub(crate) fn mate_of(path: &str) -> Option<(MateKey, u8)> {
    let captures = MATE_PATTERN.captures(path)?;
    let mate = if &captures["mate"] == "1" { 1 } else { 2 };
    Some((
        MateKey {
            stem: captures["stem"].to_string(),
            separator: captures["sep"].to_ascii_uppercase(),
            extension: captures["ext"].to_ascii_lowercase(),
        },
        mate,
    ))
}

/// Strip a case-insensitive extension (with its dot) from the end of `path`
pub(crate) fn strip_extension<'a>(path: &'a str, extensions: &[&str]) -> Option<&'a str> {
    let lower = path.to_ascii_lowercase();
    extensions.iter().find_map(|ext| {
        let suffix = format!(".{ext}");
        (lower.len() > suffix.len() && lower.ends_with(&suffix))
            .then(|| &path[..path.len() - suffix.len()])
    })
}

/// Path with the FASTA extension (and compression) removed: `ref/hg38`
pub(crate) fn reference_stem(path: &str) -> Option<&str> {
    strip_extension(strip_compression(path), &["fasta", "fa", "fna"])
}

/// Companions a primary of this shape should have for a complete group
pub fn expected_companions(primary_type: FileType, primary_path: &str) -> usize {
    match primary_type {
        FileType::Bam | FileType::Cram => 1,
        FileType::Fastq => usize::from(mate_of(primary_path).is_some()),
        FileType::Fasta => 2,
        FileType::Bcf => 1,
        FileType::Vcf | FileType::Gvcf => usize::from(is_compressed(file_name(primary_path))),
        _ => 0,
    }
}

/// Fraction of expected companions present, 1.0 when none are expected
pub fn completeness(group: &AssociationGroup) -> f64 {
    let primary = &group.primary;
    let expected = expected_companions(primary.file_type, &primary.path);
    if expected == 0 {
        return 1.0;
    }

    let present = match primary.file_type {
        FileType::Fasta => [FileType::Fai, FileType::Dict]
            .iter()
            .filter(|t| group.companions.iter().any(|c| c.record.file_type == **t))
            .count(),
        FileType::Fastq => group.companions_of_kind(AssociationKind::MatePair).count(),
        _ => group.companions_of_kind(AssociationKind::Index).count(),
    };

    present.min(expected) as f64 / expected as f64
}
