use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Key/value tags attached to a stored object
pub type TagSet = BTreeMap<String, String>;

/// Compression suffixes stripped before a file is classified
pub const COMPRESSION_SUFFIXES: &[&str] = &[".gz", ".bgz", ".bz2", ".zst"];

/// Genomics file formats and their index variants
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum FileType {
    #[strum(to_string = "fastq", serialize = "fq")]
    Fastq,
    #[strum(to_string = "fasta", serialize = "fa", serialize = "fna")]
    Fasta,
    #[strum(to_string = "bam")]
    Bam,
    #[strum(to_string = "cram")]
    Cram,
    #[strum(to_string = "sam")]
    Sam,
    #[strum(to_string = "vcf")]
    Vcf,
    #[strum(to_string = "gvcf", serialize = "g.vcf")]
    Gvcf,
    #[strum(to_string = "bcf")]
    Bcf,
    #[strum(to_string = "bed")]
    Bed,
    #[strum(to_string = "gff", serialize = "gff3", serialize = "gtf")]
    Gff,
    #[strum(to_string = "bai")]
    Bai,
    #[strum(to_string = "crai")]
    Crai,
    #[strum(to_string = "fai")]
    Fai,
    #[strum(to_string = "dict")]
    Dict,
    #[strum(to_string = "tbi")]
    Tbi,
    #[strum(to_string = "csi")]
    Csi,
    #[strum(to_string = "bwa_index", serialize = "bwa")]
    BwaIndex,
    #[strum(to_string = "unknown")]
    Unknown,
}

/// Extension table, checked in order. `.g.vcf` must precede `.vcf`.
const EXTENSIONS: &[(&str, FileType)] = &[
    (".g.vcf", FileType::Gvcf),
    (".gvcf", FileType::Gvcf),
    (".vcf", FileType::Vcf),
    (".bcf", FileType::Bcf),
    (".fastq", FileType::Fastq),
    (".fq", FileType::Fastq),
    (".fasta", FileType::Fasta),
    (".fna", FileType::Fasta),
    (".fa", FileType::Fasta),
    (".bam", FileType::Bam),
    (".cram", FileType::Cram),
    (".sam", FileType::Sam),
    (".bed", FileType::Bed),
    (".gff3", FileType::Gff),
    (".gff", FileType::Gff),
    (".gtf", FileType::Gff),
    (".bai", FileType::Bai),
    (".crai", FileType::Crai),
    (".fai", FileType::Fai),
    (".dict", FileType::Dict),
    (".tbi", FileType::Tbi),
    (".csi", FileType::Csi),
    (".amb", FileType::BwaIndex),
    (".ann", FileType::BwaIndex),
    (".bwt", FileType::BwaIndex),
    (".pac", FileType::BwaIndex),
    (".sa", FileType::BwaIndex),
];

impl FileType {
    /// Infer the file type from an object path or file name
    pub fn from_path(path: &str) -> Self {
        let name = file_name(path).to_ascii_lowercase();
        let name = strip_compression(&name);

        EXTENSIONS
            .iter()
            .find(|(ext, _)| name.len() > ext.len() && name.ends_with(ext))
            .map(|(_, file_type)| *file_type)
            .unwrap_or(FileType::Unknown)
    }

    /// Family this type belongs to; index types share their data family
    pub fn family(&self) -> FileFamily {
        match self {
            FileType::Bam | FileType::Cram | FileType::Sam | FileType::Bai | FileType::Crai => {
                FileFamily::Alignment
            }
            FileType::Fastq => FileFamily::Sequence,
            FileType::Fasta | FileType::Fai | FileType::Dict | FileType::BwaIndex => {
                FileFamily::Reference
            }
            FileType::Vcf | FileType::Gvcf | FileType::Bcf | FileType::Tbi | FileType::Csi => {
                FileFamily::Variant
            }
            FileType::Bed | FileType::Gff => FileFamily::Annotation,
            FileType::Unknown => FileFamily::Other,
        }
    }

    /// Whether this type is an index or dictionary for another file
    pub fn is_index(&self) -> bool {
        matches!(
            self,
            FileType::Bai
                | FileType::Crai
                | FileType::Fai
                | FileType::Dict
                | FileType::Tbi
                | FileType::Csi
                | FileType::BwaIndex
        )
    }

    pub fn is_known(&self) -> bool {
        *self != FileType::Unknown
    }
}

/// Coarse grouping used for partial type relevance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileFamily {
    Alignment,
    Sequence,
    Reference,
    Variant,
    Annotation,
    Other,
}

/// Retrieval class of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StorageTier {
    Standard,
    InfrequentAccess,
    IntelligentTiering,
    InstantRetrieval,
    Archive,
    DeepArchive,
}

impl StorageTier {
    /// Map a provider storage-class string (e.g. `STANDARD_IA`, `GLACIER`)
    pub fn from_storage_class(class: &str) -> Self {
        match class.trim().to_ascii_uppercase().as_str() {
            "STANDARD_IA" | "ONEZONE_IA" => StorageTier::InfrequentAccess,
            "INTELLIGENT_TIERING" => StorageTier::IntelligentTiering,
            "GLACIER_IR" => StorageTier::InstantRetrieval,
            "GLACIER" => StorageTier::Archive,
            "DEEP_ARCHIVE" => StorageTier::DeepArchive,
            _ => StorageTier::Standard,
        }
    }

    /// Map a managed-store resource status (`ACTIVE`, `ARCHIVED`, ...)
    pub fn from_store_status(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("ARCHIVED") {
            StorageTier::Archive
        } else {
            StorageTier::Standard
        }
    }

    /// Whether the object needs a restore step before it can be read
    pub fn requires_restore(&self) -> bool {
        matches!(self, StorageTier::Archive | StorageTier::DeepArchive)
    }
}

/// Unique identity of a record within a search
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub backend_id: String,
    pub path: String,
}

/// One physical object discovered in a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Connector that produced the record
    pub backend_id: String,

    /// Canonical locator inside the backend
    pub path: String,

    /// URI an end user can fetch the object from
    pub access_uri: String,

    /// Object size in bytes
    pub size_bytes: u64,

    /// Last modification (or creation) time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,

    /// Retrieval class
    pub storage_tier: StorageTier,

    /// Format inferred from the path
    pub file_type: FileType,

    /// Tags, populated lazily
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSet>,
}

impl FileRecord {
    /// Create a record, inferring its file type from the path
    pub fn new(
        backend_id: impl Into<String>,
        path: impl Into<String>,
        access_uri: impl Into<String>,
        size_bytes: u64,
        last_modified: Option<DateTime<Utc>>,
        storage_tier: StorageTier,
    ) -> Self {
        let path = path.into();
        let file_type = FileType::from_path(&path);

        Self {
            backend_id: backend_id.into(),
            path,
            access_uri: access_uri.into(),
            size_bytes,
            last_modified,
            storage_tier,
            file_type,
            tags: None,
        }
    }

    /// Return a copy of this record carrying the given tags
    pub fn with_tags(self, tags: TagSet) -> Self {
        Self {
            tags: Some(tags),
            ..self
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            backend_id: self.backend_id.clone(),
            path: self.path.clone(),
        }
    }

    /// Final path segment
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Final `/`-separated segment of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Strip one trailing compression suffix, if present
pub fn strip_compression(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    COMPRESSION_SUFFIXES
        .iter()
        .find(|suffix| lower.len() > suffix.len() && lower.ends_with(*suffix))
        .map(|suffix| &name[..name.len() - suffix.len()])
        .unwrap_or(name)
}

pub fn is_compressed(name: &str) -> bool {
    strip_compression(name).len() != name.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path("runs/NA12878_R1.fastq.gz"), FileType::Fastq);
        assert_eq!(FileType::from_path("runs/NA12878.fq"), FileType::Fastq);
        assert_eq!(FileType::from_path("ref/hg38.fa.gz"), FileType::Fasta);
        assert_eq!(FileType::from_path("ref/hg38.fna"), FileType::Fasta);
        assert_eq!(FileType::from_path("aln/sample.BAM"), FileType::Bam);
        assert_eq!(FileType::from_path("aln/sample.bam.bai"), FileType::Bai);
        assert_eq!(FileType::from_path("aln/sample.cram.crai"), FileType::Crai);
        assert_eq!(FileType::from_path("vc/sample.g.vcf.gz"), FileType::Gvcf);
        assert_eq!(FileType::from_path("vc/sample.vcf.gz"), FileType::Vcf);
        assert_eq!(FileType::from_path("vc/sample.vcf.gz.tbi"), FileType::Tbi);
        assert_eq!(FileType::from_path("ann/genes.gtf.gz"), FileType::Gff);
        assert_eq!(FileType::from_path("ref/hg38.fa.bwt"), FileType::BwaIndex);
        assert_eq!(FileType::from_path("notes/readme.txt"), FileType::Unknown);
        assert_eq!(FileType::from_path(".bam"), FileType::Unknown);
    }

    #[test]
    fn test_file_type_parsing() {
        assert_eq!(FileType::from_str("FASTQ").unwrap(), FileType::Fastq);
        assert_eq!(FileType::from_str("fq").unwrap(), FileType::Fastq);
        assert_eq!(FileType::from_str("gff3").unwrap(), FileType::Gff);
        assert!(FileType::from_str("docx").is_err());
        assert_eq!(FileType::BwaIndex.to_string(), "bwa_index");
    }

    #[test]
    fn test_families() {
        assert_eq!(FileType::Bam.family(), FileType::Cram.family());
        assert_eq!(FileType::Tbi.family(), FileFamily::Variant);
        assert_ne!(FileType::Fastq.family(), FileType::Fasta.family());
        assert!(FileType::Crai.is_index());
        assert!(!FileType::Vcf.is_index());
    }

    #[test]
    fn test_storage_tiers() {
        assert_eq!(StorageTier::from_storage_class("GLACIER"), StorageTier::Archive);
        assert_eq!(StorageTier::from_storage_class("standard_ia"), StorageTier::InfrequentAccess);
        assert_eq!(StorageTier::from_storage_class("mystery"), StorageTier::Standard);
        assert_eq!(StorageTier::from_store_status("ARCHIVED"), StorageTier::Archive);
        assert!(StorageTier::DeepArchive.requires_restore());
        assert!(!StorageTier::InstantRetrieval.requires_restore());
    }

    #[test]
    fn test_record_with_tags_keeps_identity() {
        let record = FileRecord::new(
            "s3-a",
            "runs/a.bam",
            "s3://bucket/runs/a.bam",
            42,
            None,
            StorageTier::Standard,
        );
        let key = record.key();
        let tagged = record.with_tags(TagSet::from([("sample".into(), "NA1".into())]));

        assert_eq!(tagged.key(), key);
        assert_eq!(tagged.file_type, FileType::Bam);
        assert_eq!(tagged.file_name(), "a.bam");
    }

    #[test]
    fn test_compression_helpers() {
        assert_eq!(strip_compression("a.vcf.gz"), "a.vcf");
        assert_eq!(strip_compression("a.vcf"), "a.vcf");
        assert!(is_compressed("a.fq.bgz"));
        assert!(!is_compressed("a.bam"));
    }
}
