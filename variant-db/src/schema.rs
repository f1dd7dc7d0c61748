diesel::table! {
    variant_annotations (id) {
        id -> Int8,
        variant_key -> Text,
        gene_symbol -> Nullable<Text>,
        cadd_score -> Nullable<Double>,
        ml_pathogenicity_score -> Nullable<Double>,
        most_severe_consequence -> Text,
        allele_frequency -> Nullable<Double>,
        max_population_allele_freq -> Nullable<Double>,
        omim_id -> Nullable<Text>,
        clinical_significance -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    transcript_annotations (id) {
        id -> Int8,
        variant_key -> Text,
        transcript_id -> Text,
        polyphen_score -> Nullable<Double>,
        protein_notation -> Nullable<Text>,
        revel_score -> Nullable<Double>,
        spliceai_delta_score -> Nullable<Double>,
        mane -> Bool,
        loftee_class -> Nullable<Text>,
        impact -> Text,
        gerp_score -> Nullable<Double>,
        cdna_notation -> Nullable<Text>,
        consequences -> Text,
        created_at -> Timestamp,
    }
}

// variant_key is a unique text column, not the primary key of
// variant_annotations, so diesel's `joinable!` (which assumes a foreign
// key into a primary key) does not apply here. Queries that need both
// tables filter each independently by variant_key instead of joining.
diesel::allow_tables_to_appear_in_same_query!(variant_annotations, transcript_annotations,);
