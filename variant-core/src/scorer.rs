//! ML scorer (spec §4.6): a pure mapping from the fixed nine-feature
//! vector to a pathogenicity scalar in `[0, 1]`. The serialized model
//! behind a real deployment is a deployment artifact, not a code
//! dependency (spec §9): this module only fixes the feature contract and
//! ships one small fixed-weight implementation standing in for "an
//! equivalent tree ensemble", plus a `NullScorer` for when no model is
//! configured.

use variant_db::models::{AnnotationRecord, TranscriptRow};

/// The nine features named in spec §4.2 step 4, after categorical
/// encoding and null imputation. Every imputation constant is documented
/// on the field that uses it — none of them default to zero unless zero
/// is itself the intended neutral value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// 0 (benign-leaning: synonymous/intron) .. 4 (severe: stop-gained,
    /// frameshift). Unknown/unrecognized terms impute to 1 (a mild,
    /// non-alarming middle value) rather than 0, since an unrecognized
    /// term is more likely to be an under-documented real consequence
    /// than a strictly benign one.
    pub consequence_rank: f64,
    /// MODIFIER=0, LOW=1, MODERATE=2, HIGH=3. Missing imputes to 0.
    pub impact_rank: f64,
    /// gnomAD exomes allele frequency. Missing imputes to 0.0: a variant
    /// absent from gnomAD is conventionally treated as novel/ultra-rare,
    /// not "unknown", in variant-pathogenicity pipelines.
    pub allele_frequency: f64,
    /// Max population allele frequency. Same imputation as above.
    pub max_allele_frequency: f64,
    /// SpliceAI delta score, 0.0..1.0. Missing imputes to 0.0 (no
    /// predicted splice effect).
    pub splice_ai: f64,
    /// GERP++ conservation score. Missing imputes to 0.0 (neutral
    /// conservation, neither conserved nor fast-evolving).
    pub gerp: f64,
    /// LOFTEE class: HC (high-confidence LoF) = 2, LC (low-confidence) =
    /// 1, absent/other = 0.
    pub loftee_rank: f64,
    /// PolyPhen-2 score, 0.0..1.0. Missing imputes to 0.5, the prior
    /// midpoint for "no prediction available" rather than an optimistic
    /// 0.0.
    pub polyphen: f64,
    /// CADD phred score. Missing imputes to 20.0, roughly the population
    /// median CADD for a variant with at least one alt allele observed.
    pub cadd: f64,
}

fn consequence_rank(consequence: &str) -> f64 {
    match consequence {
        "stop_gained" | "frameshift_variant" | "splice_donor_variant" | "splice_acceptor_variant" => 4.0,
        "missense_variant" | "inframe_deletion" | "inframe_insertion" => 3.0,
        "splice_region_variant" | "start_lost" | "stop_lost" => 2.0,
        "synonymous_variant" | "intron_variant" | "5_prime_utr_variant" | "3_prime_utr_variant" => 0.0,
        _ => 1.0,
    }
}

fn impact_rank(impact: &str) -> f64 {
    match impact {
        "HIGH" => 3.0,
        "MODERATE" => 2.0,
        "LOW" => 1.0,
        _ => 0.0,
    }
}

fn loftee_rank(loftee: Option<&str>) -> f64 {
    match loftee {
        Some("HC") => 2.0,
        Some("LC") => 1.0,
        _ => 0.0,
    }
}

/// Picks the canonical transcript for feature extraction: the MANE
/// transcript if one exists, else the first transcript, mirroring the
/// same priority order the parser uses to pick the variant-level gene
/// symbol (spec §4.4).
fn canonical_transcript(transcripts: &[TranscriptRow]) -> Option<&TranscriptRow> {
    transcripts
        .iter()
        .find(|t| t.mane)
        .or_else(|| transcripts.first())
}

/// Extracts the nine-feature vector from a record and its transcripts,
/// per spec §4.2 step 4: "using features sourced from the record and its
/// canonical transcript."
pub fn extract_features(record: &AnnotationRecord, transcripts: &[TranscriptRow]) -> FeatureVector {
    let canonical = canonical_transcript(transcripts);

    FeatureVector {
        consequence_rank: consequence_rank(&record.most_severe_consequence),
        impact_rank: canonical.map_or(0.0, |t| impact_rank(&t.impact)),
        allele_frequency: record.allele_frequency.unwrap_or(0.0),
        max_allele_frequency: record.max_population_allele_freq.unwrap_or(0.0),
        splice_ai: canonical.and_then(|t| t.spliceai_delta_score).unwrap_or(0.0),
        gerp: canonical.and_then(|t| t.gerp_score).unwrap_or(0.0),
        loftee_rank: loftee_rank(canonical.and_then(|t| t.loftee_class.as_deref())),
        polyphen: canonical.and_then(|t| t.polyphen_score).unwrap_or(0.5),
        cadd: record.cadd_score.unwrap_or(20.0),
    }
}

pub trait PathogenicityScorer: Send + Sync {
    /// Returns `None` when scoring is unavailable (spec §4.6, §9: a
    /// missing model degrades to a null score, never a zero score and
    /// never a hard failure).
    fn score(&self, features: &FeatureVector) -> Option<f64>;
}

/// Used when no model path is configured. Spec §9: "Its absence is a
/// degraded mode, not a fatal error."
pub struct NullScorer;

impl PathogenicityScorer for NullScorer {
    fn score(&self, _features: &FeatureVector) -> Option<f64> {
        None
    }
}

/// A small fixed-weight linear combination of the nine features, squashed
/// through a logistic function into `[0, 1]`. Stands in for "an
/// equivalent tree ensemble" (spec §9) without pulling in a model
/// artifact; the weights are hand-picked to rank severe consequences and
/// strong LoF/splice/conservation signals above benign ones, not trained.
pub struct LinearBlendScorer {
    weights: [f64; 9],
    bias: f64,
}

impl Default for LinearBlendScorer {
    fn default() -> Self {
        Self {
            weights: [
                0.55, // consequence_rank
                0.35, // impact_rank
                -8.0, // allele_frequency (common variants are pushed benign)
                -4.0, // max_allele_frequency
                1.8,  // splice_ai
                0.12, // gerp
                0.9,  // loftee_rank
                1.6,  // polyphen
                0.07, // cadd
            ],
            bias: -2.2,
        }
    }
}

impl PathogenicityScorer for LinearBlendScorer {
    fn score(&self, features: &FeatureVector) -> Option<f64> {
        let raw = [
            features.consequence_rank,
            features.impact_rank,
            features.allele_frequency,
            features.max_allele_frequency,
            features.splice_ai,
            features.gerp,
            features.loftee_rank,
            features.polyphen,
            features.cadd,
        ];

        let logit: f64 = raw
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;

        Some(1.0 / (1.0 + (-logit).exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(impact: &str, mane: bool) -> TranscriptRow {
        TranscriptRow {
            transcript_id: "ENST00000000001".to_string(),
            polyphen_score: Some(0.99),
            protein_notation: None,
            revel_score: None,
            spliceai_delta_score: Some(0.9),
            mane,
            loftee_class: Some("HC".to_string()),
            impact: impact.to_string(),
            gerp_score: Some(5.0),
            cdna_notation: None,
            consequences: impact.to_string(),
        }
    }

    fn record(consequence: &str) -> AnnotationRecord {
        AnnotationRecord {
            variant_key: "1:1:A>T".to_string(),
            gene_symbol: None,
            cadd_score: Some(35.0),
            ml_pathogenicity_score: None,
            most_severe_consequence: consequence.to_string(),
            allele_frequency: Some(0.0001),
            max_population_allele_freq: Some(0.0002),
            omim_id: None,
            clinical_significance: None,
        }
    }

    #[test]
    fn null_scorer_always_returns_none() {
        let features = extract_features(&record("missense_variant"), &[]);
        assert_eq!(NullScorer.score(&features), None);
    }

    #[test]
    fn score_stays_within_unit_interval() {
        let scorer = LinearBlendScorer::default();
        let severe = extract_features(&record("stop_gained"), &[transcript("HIGH", true)]);
        let benign = extract_features(&record("synonymous_variant"), &[transcript("LOW", true)]);

        let severe_score = scorer.score(&severe).unwrap();
        let benign_score = scorer.score(&benign).unwrap();

        assert!((0.0..=1.0).contains(&severe_score));
        assert!((0.0..=1.0).contains(&benign_score));
        assert!(severe_score > benign_score);
    }

    #[test]
    fn missing_features_impute_documented_constants_not_zero() {
        let features = extract_features(&AnnotationRecord {
            cadd_score: None,
            allele_frequency: None,
            max_population_allele_freq: None,
            ..record("intergenic_variant")
        }, &[]);

        assert_eq!(features.cadd, 20.0);
        assert_eq!(features.polyphen, 0.5);
        assert_eq!(features.allele_frequency, 0.0);
    }

    #[test]
    fn prefers_mane_transcript_for_canonical_features() {
        let transcripts = vec![transcript("LOW", false), transcript("HIGH", true)];
        let features = extract_features(&record("missense_variant"), &transcripts);
        assert_eq!(features.impact_rank, 3.0);
    }
}
