use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::{sql_query, PgConnection};
use itertools::Itertools;

use crate::models::{
    AnnotationRecord, ConsequenceCount, DbTranscriptAnnotation, DbVariantAnnotation,
    NewTranscriptAnnotation, NewVariantAnnotation, TranscriptRow,
};
use crate::QueryResult;

/// A variant-level row plus its transcript rows, as read back out of the
/// store.
#[derive(Debug, Clone)]
pub struct StoredAnnotation {
    pub variant: DbVariantAnnotation,
    pub transcripts: Vec<DbTranscriptAnnotation>,
}

/// Cache hit: returns `None` if no variant-level row exists for this key.
/// A `Some` implies annotation completed successfully at least once (§3
/// invariant).
pub fn get_annotation(conn: &mut PgConnection, variant_key: &str) -> QueryResult<Option<StoredAnnotation>> {
    use crate::schema::transcript_annotations::dsl as transcripts_dsl;
    use crate::schema::variant_annotations::dsl as variants_dsl;

    let variant = variants_dsl::variant_annotations
        .filter(variants_dsl::variant_key.eq(variant_key))
        .select(DbVariantAnnotation::as_select())
        .first(conn)
        .optional()?;

    let Some(variant) = variant else {
        return Ok(None);
    };

    let transcripts = transcripts_dsl::transcript_annotations
        .filter(transcripts_dsl::variant_key.eq(variant_key))
        .select(DbTranscriptAnnotation::as_select())
        .order_by(transcripts_dsl::transcript_id.asc())
        .load(conn)?;

    Ok(Some(StoredAnnotation {
        variant,
        transcripts,
    }))
}

/// One batch member's persistable shape: the variant-level record plus
/// its complete replacement set of transcript rows.
pub struct AnnotatedVariant {
    pub record: AnnotationRecord,
    pub transcripts: Vec<TranscriptRow>,
}

/// Transactionally: for each key, delete existing transcript rows, upsert
/// the variant-level row, insert the new transcript rows. Either the
/// whole batch commits or none of it does (§3: "all prior transcript rows
/// ... are replaced atomically", §4.2 step 5: "In a single transaction
/// per batch").
pub fn write_batch(conn: &mut PgConnection, batch: &[AnnotatedVariant]) -> QueryResult<()> {
    conn.transaction(|conn| write_batch_internal(conn, batch))
}

fn write_batch_internal(conn: &mut PgConnection, batch: &[AnnotatedVariant]) -> QueryResult<()> {
    use crate::schema::transcript_annotations::dsl as transcripts_dsl;
    use crate::schema::variant_annotations::dsl as variants_dsl;

    if batch.is_empty() {
        return Ok(());
    }

    let keys = batch
        .iter()
        .map(|item| item.record.variant_key.as_str())
        .collect_vec();

    // Delete-then-insert, not per-transcript upsert: a re-annotated
    // variant's transcript set is wholesale replaced (§3).
    diesel::delete(transcripts_dsl::transcript_annotations)
        .filter(transcripts_dsl::variant_key.eq_any(&keys))
        .execute(conn)?;

    let now = Utc::now().naive_utc();
    let new_variants = batch
        .iter()
        .map(|item| NewVariantAnnotation {
            variant_key: &item.record.variant_key,
            gene_symbol: item.record.gene_symbol.as_deref(),
            cadd_score: item.record.cadd_score,
            ml_pathogenicity_score: item.record.ml_pathogenicity_score,
            most_severe_consequence: &item.record.most_severe_consequence,
            allele_frequency: item.record.allele_frequency,
            max_population_allele_freq: item.record.max_population_allele_freq,
            omim_id: item.record.omim_id.as_deref(),
            clinical_significance: item.record.clinical_significance.as_deref(),
            updated_at: now,
        })
        .collect_vec();

    diesel::insert_into(variants_dsl::variant_annotations)
        .values(&new_variants)
        .on_conflict(variants_dsl::variant_key)
        .do_update()
        .set((
            variants_dsl::gene_symbol.eq(diesel::upsert::excluded(variants_dsl::gene_symbol)),
            variants_dsl::cadd_score.eq(diesel::upsert::excluded(variants_dsl::cadd_score)),
            variants_dsl::ml_pathogenicity_score
                .eq(diesel::upsert::excluded(variants_dsl::ml_pathogenicity_score)),
            variants_dsl::most_severe_consequence
                .eq(diesel::upsert::excluded(variants_dsl::most_severe_consequence)),
            variants_dsl::allele_frequency.eq(diesel::upsert::excluded(variants_dsl::allele_frequency)),
            variants_dsl::max_population_allele_freq
                .eq(diesel::upsert::excluded(variants_dsl::max_population_allele_freq)),
            variants_dsl::omim_id.eq(diesel::upsert::excluded(variants_dsl::omim_id)),
            variants_dsl::clinical_significance
                .eq(diesel::upsert::excluded(variants_dsl::clinical_significance)),
            variants_dsl::updated_at.eq(diesel::upsert::excluded(variants_dsl::updated_at)),
        ))
        .execute(conn)?;

    let new_transcripts = batch
        .iter()
        .flat_map(|item| {
            item.transcripts.iter().map(move |t| NewTranscriptAnnotation {
                variant_key: &item.record.variant_key,
                transcript_id: &t.transcript_id,
                polyphen_score: t.polyphen_score,
                protein_notation: t.protein_notation.as_deref(),
                revel_score: t.revel_score,
                spliceai_delta_score: t.spliceai_delta_score,
                mane: t.mane,
                loftee_class: t.loftee_class.as_deref(),
                impact: &t.impact,
                gerp_score: t.gerp_score,
                cdna_notation: t.cdna_notation.as_deref(),
                consequences: &t.consequences,
            })
        })
        .collect_vec();

    if !new_transcripts.is_empty() {
        diesel::insert_into(transcripts_dsl::transcript_annotations)
            .values(&new_transcripts)
            .execute(conn)?;
    }

    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatistics {
    pub total_records: i64,
    pub records_with_ml_score: i64,
    pub consequence_histogram: Vec<ConsequenceCount>,
    pub oldest_updated_at: Option<chrono::NaiveDateTime>,
    pub newest_updated_at: Option<chrono::NaiveDateTime>,
}

pub fn statistics(conn: &mut PgConnection) -> QueryResult<CacheStatistics> {
    use crate::schema::variant_annotations::dsl as variants_dsl;
    use diesel::dsl::{max, min};

    let total_records: i64 = variants_dsl::variant_annotations
        .select(count_star())
        .first(conn)?;

    let records_with_ml_score: i64 = variants_dsl::variant_annotations
        .filter(variants_dsl::ml_pathogenicity_score.is_not_null())
        .select(count_star())
        .first(conn)?;

    let (oldest_updated_at, newest_updated_at) = variants_dsl::variant_annotations
        .select((min(variants_dsl::updated_at), max(variants_dsl::updated_at)))
        .first(conn)?;

    let consequence_histogram = sql_query(
        "select most_severe_consequence, count(*) as count \
         from variant_annotations \
         group by most_severe_consequence \
         order by count desc",
    )
    .load::<ConsequenceCount>(conn)?;

    Ok(CacheStatistics {
        total_records,
        records_with_ml_score,
        consequence_histogram,
        oldest_updated_at,
        newest_updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotated_variant_carries_its_own_key_to_every_transcript() {
        let record = AnnotationRecord {
            variant_key: "7:140453136:A>T".to_string(),
            gene_symbol: Some("BRAF".to_string()),
            cadd_score: Some(32.0),
            ml_pathogenicity_score: Some(0.91),
            most_severe_consequence: "missense_variant".to_string(),
            allele_frequency: None,
            max_population_allele_freq: None,
            omim_id: None,
            clinical_significance: None,
        };
        let transcripts = vec![TranscriptRow {
            transcript_id: "ENST00000288602".to_string(),
            polyphen_score: Some(0.98),
            protein_notation: Some("p.Val600Glu".to_string()),
            revel_score: Some(0.9),
            spliceai_delta_score: Some(0.0),
            mane: true,
            loftee_class: None,
            impact: "MODERATE".to_string(),
            gerp_score: Some(5.8),
            cdna_notation: Some("c.1799T>A".to_string()),
            consequences: "missense_variant".to_string(),
        }];
        let item = AnnotatedVariant { record, transcripts };

        assert_eq!(item.record.variant_key, "7:140453136:A>T");
        assert_eq!(item.transcripts.len(), 1);
    }
}
