//! VEP response parser (spec §4.4): turns one batch's worth of VEP
//! response items into, per requested variant key, either a parsed
//! `(AnnotationRecord, Vec<TranscriptRow>)` pair or a per-variant parse
//! failure. Extra response items that don't correspond to any requested
//! key are ignored; requested keys absent from the response are reported
//! as `NoAnnotationReturned`.

use std::collections::HashMap;

use itertools::Itertools;
use variant_db::models::{AnnotationRecord, TranscriptRow};
use vep_client::{VepColocatedVariant, VepResponseItem, VepTranscriptConsequence};

use crate::key::VariantKey;

const DELIMITER: &str = "; ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    NoAnnotationReturned,
    ParseError(String),
}

pub type ParsedVariant = (AnnotationRecord, Vec<TranscriptRow>);

fn to_transcript_row(t: &VepTranscriptConsequence) -> TranscriptRow {
    TranscriptRow {
        transcript_id: t.transcript_id.clone(),
        polyphen_score: t.polyphen_score,
        protein_notation: t.hgvsp.clone(),
        revel_score: t.revel_score,
        spliceai_delta_score: t.spliceai_ds_max,
        mane: t.mane_select,
        loftee_class: t.loftee_class.clone(),
        // Missing impact imputes to MODIFIER, the least severe category,
        // rather than silently becoming a different enum member.
        impact: t.impact.clone().unwrap_or_else(|| "MODIFIER".to_string()),
        gerp_score: t.gerp_score,
        cdna_notation: t.hgvsc.clone(),
        consequences: t.consequence_terms.iter().join(","),
    }
}

fn gene_symbol(
    transcripts: &[VepTranscriptConsequence],
    most_severe_consequence: &str,
) -> Option<String> {
    transcripts
        .iter()
        .find(|t| t.mane_select)
        .or_else(|| {
            transcripts
                .iter()
                .find(|t| t.consequence_terms.iter().any(|c| c == most_severe_consequence))
        })
        .or_else(|| transcripts.first())
        .and_then(|t| t.gene_symbol.clone())
}

fn allele_frequency(colocated: &[VepColocatedVariant]) -> Option<f64> {
    colocated
        .iter()
        .flat_map(|c| &c.frequencies)
        .find(|f| f.population == "gnomad_exomes")
        .and_then(|f| f.frequency)
}

fn max_allele_freq(colocated: &[VepColocatedVariant]) -> Option<f64> {
    colocated
        .iter()
        .flat_map(|c| &c.frequencies)
        .filter_map(|f| f.frequency)
        .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
}

fn join_non_empty<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = values.filter(|v| !v.is_empty()).join(DELIMITER);
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn parse_one(item: &VepResponseItem) -> Result<ParsedVariant, ParseFailure> {
    if item.transcript_consequences.is_empty() && item.colocated_variants.is_empty() {
        return Err(ParseFailure::NoAnnotationReturned);
    }

    let Some(most_severe_consequence) = item.most_severe_consequence.clone() else {
        return Err(ParseFailure::ParseError(
            "missing most_severe_consequence".to_string(),
        ));
    };

    let omim_id = join_non_empty(
        item.colocated_variants
            .iter()
            .flat_map(|c| c.omim_ids.iter())
            .map(|s| s.as_str()),
    );
    let clinical_significance = join_non_empty(
        item.colocated_variants
            .iter()
            .flat_map(|c| c.clinical_significance.iter())
            .map(|s| s.as_str()),
    );

    let record = AnnotationRecord {
        // Filled in by the caller, which knows the requested key this
        // response item was matched against (the wire `tag` and our
        // internal key happen to be the same string, but the parser
        // should not have to know that).
        variant_key: String::new(),
        gene_symbol: gene_symbol(&item.transcript_consequences, &most_severe_consequence),
        cadd_score: None,
        ml_pathogenicity_score: None,
        most_severe_consequence,
        allele_frequency: allele_frequency(&item.colocated_variants),
        max_population_allele_freq: max_allele_freq(&item.colocated_variants),
        omim_id,
        clinical_significance,
    };

    let transcripts = item
        .transcript_consequences
        .iter()
        .map(to_transcript_row)
        .collect_vec();

    Ok((record, transcripts))
}

/// Parses a whole batch's response against the keys that were requested.
/// Every requested key appears exactly once in the result, either as a
/// successfully parsed pair or a failure reason.
pub fn parse_batch(
    requested_keys: &[VariantKey],
    items: Vec<VepResponseItem>,
) -> HashMap<String, Result<ParsedVariant, ParseFailure>> {
    let mut by_tag: HashMap<String, VepResponseItem> =
        items.into_iter().map(|item| (item.tag.clone(), item)).collect();

    requested_keys
        .iter()
        .map(|key| {
            let result = match by_tag.remove(key.as_str()) {
                Some(item) => parse_one(&item).map(|(mut record, transcripts)| {
                    record.variant_key = key.as_str().to_string();
                    (record, transcripts)
                }),
                None => Err(ParseFailure::NoAnnotationReturned),
            };
            (key.as_str().to_string(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vep_client::VepFrequency;

    fn sample_item(tag: &str) -> VepResponseItem {
        VepResponseItem {
            tag: tag.to_string(),
            most_severe_consequence: Some("missense_variant".to_string()),
            transcript_consequences: vec![VepTranscriptConsequence {
                transcript_id: "ENST00000288602".to_string(),
                gene_symbol: Some("BRAF".to_string()),
                impact: Some("MODERATE".to_string()),
                consequence_terms: vec!["missense_variant".to_string()],
                polyphen_score: Some(0.98),
                revel_score: Some(0.91),
                spliceai_ds_max: Some(0.0),
                gerp_score: Some(5.8),
                loftee_class: None,
                mane_select: true,
                hgvsc: Some("c.1799T>A".to_string()),
                hgvsp: Some("p.Val600Glu".to_string()),
            }],
            colocated_variants: vec![VepColocatedVariant {
                frequencies: vec![VepFrequency {
                    population: "gnomad_exomes".to_string(),
                    frequency: Some(0.0001),
                }],
                omim_ids: vec!["164757".to_string()],
                clinical_significance: vec!["pathogenic".to_string()],
            }],
        }
    }

    #[test]
    fn parses_a_complete_item() {
        let keys = vec![VariantKey::new_for_test("7:140453136:A>T")];
        let result = parse_batch(&keys, vec![sample_item("7:140453136:A>T")]);
        let (record, transcripts) = result["7:140453136:A>T"].clone().unwrap();

        assert_eq!(record.variant_key, "7:140453136:A>T");
        assert_eq!(record.gene_symbol.as_deref(), Some("BRAF"));
        assert_eq!(record.most_severe_consequence, "missense_variant");
        assert_eq!(record.allele_frequency, Some(0.0001));
        assert_eq!(record.omim_id.as_deref(), Some("164757"));
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].protein_notation.as_deref(), Some("p.Val600Glu"));
    }

    #[test]
    fn missing_response_entry_is_no_annotation_returned() {
        let keys = vec![VariantKey::new_for_test("1:1:A>T")];
        let result = parse_batch(&keys, vec![]);
        assert_eq!(result["1:1:A>T"], Err(ParseFailure::NoAnnotationReturned));
    }

    #[test]
    fn empty_transcripts_and_colocated_is_no_annotation_returned() {
        let keys = vec![VariantKey::new_for_test("1:1:A>T")];
        let item = VepResponseItem {
            tag: "1:1:A>T".to_string(),
            most_severe_consequence: Some("intergenic_variant".to_string()),
            transcript_consequences: vec![],
            colocated_variants: vec![],
        };
        let result = parse_batch(&keys, vec![item]);
        assert_eq!(result["1:1:A>T"], Err(ParseFailure::NoAnnotationReturned));
    }

    #[test]
    fn extra_response_items_for_unrequested_keys_are_ignored() {
        let keys = vec![VariantKey::new_for_test("7:140453136:A>T")];
        let result = parse_batch(
            &keys,
            vec![sample_item("7:140453136:A>T"), sample_item("99:1:A>T")],
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn one_malformed_item_does_not_affect_the_others_key() {
        let keys = vec![
            VariantKey::new_for_test("1:1:A>T"),
            VariantKey::new_for_test("7:140453136:A>T"),
        ];
        let malformed = VepResponseItem {
            tag: "1:1:A>T".to_string(),
            most_severe_consequence: None,
            transcript_consequences: vec![VepTranscriptConsequence {
                transcript_id: "ENST1".to_string(),
                gene_symbol: None,
                impact: None,
                consequence_terms: vec![],
                polyphen_score: None,
                revel_score: None,
                spliceai_ds_max: None,
                gerp_score: None,
                loftee_class: None,
                mane_select: false,
                hgvsc: None,
                hgvsp: None,
            }],
            colocated_variants: vec![],
        };
        let result = parse_batch(&keys, vec![malformed, sample_item("7:140453136:A>T")]);

        assert!(matches!(result["1:1:A>T"], Err(ParseFailure::ParseError(_))));
        assert!(result["7:140453136:A>T"].is_ok());
    }
}
