//! Variant identity & key (spec §3). Canonical form: `"{chrom}:{pos}:{ref}>{alt}"`.
//!
//! Chromosome normalization (Open Question 1 in spec.md §9): this service
//! strips a leading `chr` prefix and applies that rule at exactly one
//! place — here — so the write path (`submit`) and any future read path
//! can never disagree about the canonical form.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVariant {
    #[error("chromosome '{0}' is not recognized")]
    UnknownChromosome(String),
    #[error("position must be a positive integer, got {0}")]
    NonPositivePosition(i64),
    #[error("reference allele must be one or more of A/C/G/T, got '{0}'")]
    InvalidReferenceAllele(String),
    #[error("alternate allele must be one or more of A/C/G/T, got '{0}'")]
    InvalidAlternateAllele(String),
}

fn normalize_chrom(raw: &str) -> String {
    raw.strip_prefix("chr")
        .or_else(|| raw.strip_prefix("Chr"))
        .or_else(|| raw.strip_prefix("CHR"))
        .unwrap_or(raw)
        .to_string()
}

fn is_valid_chrom(chrom: &str) -> bool {
    matches!(chrom, "X" | "Y" | "M" | "MT")
        || chrom
            .parse::<u32>()
            .is_ok_and(|n| (1..=22).contains(&n))
}

fn is_valid_allele(allele: &str) -> bool {
    !allele.is_empty() && allele.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}

impl VariantRequest {
    /// Validates and normalizes a raw submission, per the façade's
    /// synchronous `invalid_input` contract (spec §4.1).
    pub fn normalize(
        chrom: &str,
        pos: i64,
        reference: &str,
        alt: &str,
    ) -> Result<VariantRequest, InvalidVariant> {
        let chrom = normalize_chrom(chrom.trim());
        if !is_valid_chrom(&chrom) {
            return Err(InvalidVariant::UnknownChromosome(chrom));
        }
        if pos <= 0 {
            return Err(InvalidVariant::NonPositivePosition(pos));
        }
        if !is_valid_allele(reference) {
            return Err(InvalidVariant::InvalidReferenceAllele(reference.to_string()));
        }
        if !is_valid_allele(alt) {
            return Err(InvalidVariant::InvalidAlternateAllele(alt.to_string()));
        }

        Ok(VariantRequest {
            chrom,
            pos: pos as u64,
            reference: reference.to_string(),
            alt: alt.to_string(),
        })
    }

    pub fn key(&self) -> VariantKey {
        VariantKey(format!(
            "{}:{}:{}>{}",
            self.chrom, self.pos, self.reference, self.alt
        ))
    }
}

/// The canonical string key used everywhere downstream of the façade:
/// the pending registry, the VEP call tagging, and the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey(String);

impl VariantKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    #[cfg(test)]
    pub fn new_for_test(raw: &str) -> Self {
        VariantKey(raw.to_string())
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VariantKey> for String {
    fn from(key: VariantKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_chr_prefix_and_normalizes_case() {
        let with_prefix = VariantRequest::normalize("chr7", 140453136, "A", "T").unwrap();
        let without_prefix = VariantRequest::normalize("7", 140453136, "A", "T").unwrap();
        assert_eq!(with_prefix.key(), without_prefix.key());
        assert_eq!(with_prefix.key().as_str(), "7:140453136:A>T");
    }

    #[test]
    fn rejects_non_acgt_alleles() {
        assert!(VariantRequest::normalize("1", 1, "N", "N").is_err());
        assert!(VariantRequest::normalize("X", 1, "N>N", "A").is_err());
    }

    #[test]
    fn rejects_unknown_chromosome() {
        assert!(VariantRequest::normalize("99", 1, "A", "T").is_err());
        assert!(VariantRequest::normalize("", 1, "A", "T").is_err());
    }

    #[test]
    fn accepts_sex_and_mitochondrial_chromosomes() {
        assert!(VariantRequest::normalize("X", 1, "A", "T").is_ok());
        assert!(VariantRequest::normalize("Y", 1, "A", "T").is_ok());
        assert!(VariantRequest::normalize("MT", 1, "A", "T").is_ok());
    }
}
