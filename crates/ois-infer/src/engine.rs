//! Tiered header matching.
//!
//! For each header/field pair exactly one tier survives, in strict
//! priority order: exact synonym, then substring overlap, then edit
//! distance. The surviving text score is blended with type compatibility
//! and the per-field candidate lists are resolved into a one-to-one
//! assignment by descending score.

use std::cmp::Ordering;

use rapidfuzz::distance::levenshtein;

use ois_model::{CanonicalField, ColumnType};

use crate::config::InferConfig;
use crate::normalize::normalize_header;
use crate::profile::ColumnTypeProfile;
use crate::types::{AlternateCandidate, ColumnRef, FieldMapping, MatchMethod};

struct Candidate {
    field: CanonicalField,
    column_index: usize,
    score: f64,
    method: MatchMethod,
}

/// Match headers onto the canonical catalog.
///
/// `profiles` must be parallel to `columns`. Fields with no candidate at or
/// above the acceptance threshold are omitted; each column serves at most
/// one field, resolved by highest score.
#[must_use]
pub fn match_headers(
    columns: &[ColumnRef],
    profiles: &[ColumnTypeProfile],
    config: &InferConfig,
) -> Vec<FieldMapping> {
    let normalized: Vec<String> = columns
        .iter()
        .map(|c| normalize_header(&c.header))
        .collect();

    let mut candidates: Vec<Candidate> = Vec::new();
    for field in CanonicalField::ALL {
        for index in 0..columns.len() {
            let Some((text_score, method)) = text_match(&normalized[index], field, config) else {
                continue;
            };
            let type_score = type_compatibility(field, profiles[index].detected, config);
            let score = config.text_weight * text_score + config.type_weight * type_score;
            if score >= config.accept_threshold {
                candidates.push(Candidate {
                    field,
                    column_index: index,
                    score,
                    method,
                });
            }
        }
    }

    candidates.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(Ordering::Equal));

    // Ranked per-field lists feed the alternates before assignment trims
    // columns that lose to a better field.
    let mut mappings = Vec::new();
    let mut taken_columns = vec![false; columns.len()];
    let mut taken_fields: Vec<CanonicalField> = Vec::new();

    for candidate in &candidates {
        if taken_columns[candidate.column_index] || taken_fields.contains(&candidate.field) {
            continue;
        }
        taken_columns[candidate.column_index] = true;
        taken_fields.push(candidate.field);

        let alternates: Vec<AlternateCandidate> = candidates
            .iter()
            .filter(|c| c.field == candidate.field)
            .take(config.max_alternates)
            .map(|c| AlternateCandidate {
                column: columns[c.column_index].clone(),
                confidence: c.score,
                method: c.method,
            })
            .collect();

        mappings.push(FieldMapping {
            field: candidate.field,
            column: columns[candidate.column_index].clone(),
            confidence: candidate.score,
            method: candidate.method,
            alternates,
        });
    }

    mappings.sort_by_key(|m| CanonicalField::ALL.iter().position(|f| *f == m.field));
    mappings
}

/// Deterministic sort key: score first, then catalog order, then column.
fn rank(candidate: &Candidate) -> (f64, isize, isize) {
    let field_pos = CanonicalField::ALL
        .iter()
        .position(|f| *f == candidate.field)
        .unwrap_or(usize::MAX) as isize;
    (candidate.score, -field_pos, -(candidate.column_index as isize))
}

/// Best surviving text tier for one header/field pair.
fn text_match(
    normalized_header: &str,
    field: CanonicalField,
    config: &InferConfig,
) -> Option<(f64, MatchMethod)> {
    if normalized_header.is_empty() {
        return None;
    }
    let synonyms = config.synonyms.for_field(field);

    if synonyms.iter().any(|s| s == normalized_header) {
        return Some((1.0, MatchMethod::ExactSynonym));
    }

    let best_overlap = synonyms
        .iter()
        .filter_map(|s| substring_overlap(normalized_header, s))
        .fold(0.0_f64, f64::max);
    if best_overlap > config.accept_threshold {
        return Some((best_overlap, MatchMethod::PartialSynonym));
    }

    let best_fuzzy = synonyms
        .iter()
        .map(|s| levenshtein::normalized_similarity(normalized_header.chars(), s.chars()))
        .fold(0.0_f64, f64::max);
    if best_fuzzy > config.accept_threshold {
        return Some((best_fuzzy, MatchMethod::Fuzzy));
    }

    None
}

/// Overlap ratio when one string contains the other: shorter over longer
/// length. `None` when neither contains the other.
fn substring_overlap(a: &str, b: &str) -> Option<f64> {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if !longer.contains(shorter) || shorter.is_empty() {
        return None;
    }
    Some(shorter.chars().count() as f64 / longer.chars().count() as f64)
}

fn type_compatibility(field: CanonicalField, detected: ColumnType, config: &InferConfig) -> f64 {
    if field.allowed_types().contains(&detected) {
        1.0
    } else if detected == ColumnType::Mixed {
        config.mixed_type_score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::profile_column;

    fn column(index: usize, header: &str) -> ColumnRef {
        ColumnRef {
            sheet: 0,
            table: 0,
            column: index,
            header: header.to_string(),
        }
    }

    fn profiles_for(samples: &[&[&str]]) -> Vec<ColumnTypeProfile> {
        let config = InferConfig::default();
        samples
            .iter()
            .map(|cells| profile_column(cells.iter().copied(), &config))
            .collect()
    }

    #[test]
    fn exact_synonym_with_compatible_type_scores_one() {
        let columns = vec![column(0, "Qty")];
        let profiles = profiles_for(&[&["1", "2", "3"]]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());

        assert_eq!(mappings.len(), 1);
        let m = &mappings[0];
        assert_eq!(m.field, CanonicalField::Quantity);
        assert_eq!(m.method, MatchMethod::ExactSynonym);
        assert!((m.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn incompatible_type_drags_score_down() {
        // "Qty" header over a text column: text 1.0, type 0.0 -> 0.7.
        let columns = vec![column(0, "Qty")];
        let profiles = profiles_for(&[&["a", "b", "c"]]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());

        assert_eq!(mappings.len(), 1);
        assert!((mappings[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_fields_are_omitted() {
        let columns = vec![column(0, "Zebra")];
        let profiles = profiles_for(&[&["a", "b"]]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());
        assert!(mappings.is_empty());
    }

    #[test]
    fn one_column_serves_one_field() {
        // "Total" is a line_total synonym; make sure a single column is not
        // also claimed by unit_price through fuzz.
        let columns = vec![column(0, "Total"), column(1, "Unit Price")];
        let profiles = profiles_for(&[&["20.00"], &["10.00"]]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());

        let total = mappings
            .iter()
            .find(|m| m.field == CanonicalField::LineTotal)
            .unwrap();
        let price = mappings
            .iter()
            .find(|m| m.field == CanonicalField::UnitPrice)
            .unwrap();
        assert_eq!(total.column.column, 0);
        assert_eq!(price.column.column, 1);
    }

    #[test]
    fn alternates_are_ranked_and_bounded() {
        let columns = vec![
            column(0, "Price"),
            column(1, "Unit Price"),
            column(2, "Unit Cost"),
        ];
        let profiles = profiles_for(&[&["1.50"], &["2.50"], &["3.50"]]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());

        let price = mappings
            .iter()
            .find(|m| m.field == CanonicalField::UnitPrice)
            .unwrap();
        assert!(price.alternates.len() >= 2);
        assert!(price.alternates.len() <= 5);
        for pair in price.alternates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert_eq!(price.alternates[0].column, price.column);
    }

    #[test]
    fn all_confidences_in_unit_interval() {
        let columns = vec![
            column(0, "Item Code"),
            column(1, "Qty"),
            column(2, "Unit Price"),
            column(3, "Line Total"),
            column(4, "Customer"),
        ];
        let profiles = profiles_for(&[
            &["SKU-1"],
            &["2"],
            &["10.00"],
            &["20.00"],
            &["Acme Ltd"],
        ]);
        let mappings = match_headers(&columns, &profiles, &InferConfig::default());
        for m in &mappings {
            assert!(m.confidence >= 0.0 && m.confidence <= 1.0);
            for alt in &m.alternates {
                assert!(alt.confidence >= 0.0 && alt.confidence <= 1.0);
            }
        }
    }
}
