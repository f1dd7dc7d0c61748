use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{transcript_annotations, variant_annotations};

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = variant_annotations)]
pub struct NewVariantAnnotation<'a> {
    pub variant_key: &'a str,
    pub gene_symbol: Option<&'a str>,
    pub cadd_score: Option<f64>,
    pub ml_pathogenicity_score: Option<f64>,
    pub most_severe_consequence: &'a str,
    pub allele_frequency: Option<f64>,
    pub max_population_allele_freq: Option<f64>,
    pub omim_id: Option<&'a str>,
    pub clinical_significance: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = variant_annotations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbVariantAnnotation {
    pub id: i64,
    pub variant_key: String,
    pub gene_symbol: Option<String>,
    pub cadd_score: Option<f64>,
    pub ml_pathogenicity_score: Option<f64>,
    pub most_severe_consequence: String,
    pub allele_frequency: Option<f64>,
    pub max_population_allele_freq: Option<f64>,
    pub omim_id: Option<String>,
    pub clinical_significance: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transcript_annotations)]
pub struct NewTranscriptAnnotation<'a> {
    pub variant_key: &'a str,
    pub transcript_id: &'a str,
    pub polyphen_score: Option<f64>,
    pub protein_notation: Option<&'a str>,
    pub revel_score: Option<f64>,
    pub spliceai_delta_score: Option<f64>,
    pub mane: bool,
    pub loftee_class: Option<&'a str>,
    pub impact: &'a str,
    pub gerp_score: Option<f64>,
    pub cdna_notation: Option<&'a str>,
    pub consequences: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = transcript_annotations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbTranscriptAnnotation {
    pub id: i64,
    pub variant_key: String,
    pub transcript_id: String,
    pub polyphen_score: Option<f64>,
    pub protein_notation: Option<String>,
    pub revel_score: Option<f64>,
    pub spliceai_delta_score: Option<f64>,
    pub mane: bool,
    pub loftee_class: Option<String>,
    pub impact: String,
    pub gerp_score: Option<f64>,
    pub cdna_notation: Option<String>,
    pub consequences: String,
    pub created_at: NaiveDateTime,
}

/// One row per distinct `most_severe_consequence`, used by
/// `db::statistics`.
#[derive(Debug, QueryableByName, Serialize)]
pub struct ConsequenceCount {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub most_severe_consequence: String,
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub count: i64,
}

/// The variant-level annotation as a fixed, flat value — the write-side
/// counterpart of `DbVariantAnnotation`, carried by callers (the parser,
/// the scorer) before anything has touched the database. One origin per
/// field is implied by the field name; there is no per-field provenance
/// metadata, per the "duck-typed generic annotation hierarchy" note: this
/// is presentation-layer complexity the store has no use for.
#[derive(Debug, Clone)]
pub struct AnnotationRecord {
    pub variant_key: String,
    pub gene_symbol: Option<String>,
    pub cadd_score: Option<f64>,
    pub ml_pathogenicity_score: Option<f64>,
    pub most_severe_consequence: String,
    pub allele_frequency: Option<f64>,
    pub max_population_allele_freq: Option<f64>,
    pub omim_id: Option<String>,
    pub clinical_significance: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranscriptRow {
    pub transcript_id: String,
    pub polyphen_score: Option<f64>,
    pub protein_notation: Option<String>,
    pub revel_score: Option<f64>,
    pub spliceai_delta_score: Option<f64>,
    pub mane: bool,
    pub loftee_class: Option<String>,
    pub impact: String,
    pub gerp_score: Option<f64>,
    pub cdna_notation: Option<String>,
    pub consequences: String,
}
