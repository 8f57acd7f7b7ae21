// crates/caseflow-pipeline/src/muscle_memory.rs
// ============================================================================
// Module: Muscle-Memory Retriever
// Description: Embedding-based lookup and deduplicated recording of past
//              high-quality case exemplars.
// ============================================================================

use caseflow_config::MuscleMemoryConfig;
use caseflow_core::{
    Case, CoreError, EmbeddingClient, ExemplarStore, ExemplarId, MuscleMemoryExemplar, Timestamp,
};

use std::num::NonZeroU64;

/// Placeholder id handed to a fresh exemplar before [`ExemplarStore::create`]
/// assigns the real one.
const PLACEHOLDER_EXEMPLAR_ID: ExemplarId = ExemplarId::new(NonZeroU64::MIN);

/// Retrieves and records [`MuscleMemoryExemplar`]s on behalf of the
/// classification pipeline.
pub struct MuscleMemoryRetriever<'a> {
    embedding: &'a dyn EmbeddingClient,
    exemplars: &'a dyn ExemplarStore,
    config: &'a MuscleMemoryConfig,
}

impl<'a> MuscleMemoryRetriever<'a> {
    /// Builds a retriever over the given embedding client, exemplar store,
    /// and tuning configuration.
    #[must_use]
    pub const fn new(
        embedding: &'a dyn EmbeddingClient,
        exemplars: &'a dyn ExemplarStore,
        config: &'a MuscleMemoryConfig,
    ) -> Self {
        Self {
            embedding,
            exemplars,
            config,
        }
    }

    /// Returns up to `config.top_k` exemplars relevant to `case`, within
    /// `config.max_distance` cosine distance and at least
    /// `config.min_quality`, optionally narrowed to `interaction_type`.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the embedding call or store query fails.
    pub fn retrieve(
        &self,
        case: &Case,
        interaction_type: Option<&str>,
    ) -> Result<Vec<MuscleMemoryExemplar>, CoreError> {
        let text = describe(case);
        let query = self.embedding.embed(&text)?;
        let candidates = self.exemplars.candidates(interaction_type)?;

        let mut scored: Vec<(f32, MuscleMemoryExemplar)> = candidates
            .into_iter()
            .filter(|exemplar| exemplar.quality_score >= self.config.min_quality)
            .filter_map(|exemplar| {
                let distance = cosine_distance(&query, &exemplar.embedding)?;
                (distance <= self.config.max_distance).then_some((distance, exemplar))
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored
            .into_iter()
            .take(self.config.top_k)
            .map(|(_, exemplar)| exemplar)
            .collect())
    }

    /// Persists `candidate` as a new exemplar, unless an existing exemplar of
    /// the same interaction type is within `config.duplicate_distance_threshold`
    /// cosine distance, in which case the incumbent's quality signals are
    /// refreshed in place and no new row is written.
    ///
    /// # Errors
    /// Returns [`CoreError`] if the store query or write fails.
    pub fn record(
        &self,
        mut candidate: MuscleMemoryExemplar,
    ) -> Result<MuscleMemoryExemplar, CoreError> {
        let siblings = self.exemplars.candidates(Some(&candidate.interaction_type))?;
        let incumbent = siblings.into_iter().find(|sibling| {
            cosine_distance(&sibling.embedding, &candidate.embedding)
                .is_some_and(|distance| distance <= self.config.duplicate_distance_threshold)
        });

        if let Some(mut incumbent) = incumbent {
            incumbent.quality_signals = candidate.quality_signals;
            incumbent.quality_score = incumbent.quality_signals.weighted_score();
            incumbent.updated_at = Timestamp::now();
            self.exemplars.update(incumbent.clone())?;
            return Ok(incumbent);
        }

        candidate.id = PLACEHOLDER_EXEMPLAR_ID;
        candidate.quality_score = candidate.quality_signals.weighted_score();
        self.exemplars.create(candidate)
    }
}

/// Renders the text the embedding model sees: short description, then long
/// description if present.
fn describe(case: &Case) -> String {
    case.long_description.as_deref().map_or_else(
        || case.short_description.clone(),
        |long| format!("{}\n\n{}", case.short_description, long),
    )
}

/// Cosine distance (`1 - cosine similarity`) between two equal-length
/// vectors, or `None` if either vector is empty, the lengths differ, or
/// either norm is zero.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    Some(1.0 - similarity)
}

#[cfg(test)]
mod tests {
    use caseflow_core::{CaseId, QualitySignals};

    use super::*;

    struct FakeEmbedding;
    impl EmbeddingClient for FakeEmbedding {
        fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(if text.contains("VPN") {
                vec![1.0, 0.0, 0.0]
            } else {
                vec![0.0, 1.0, 0.0]
            })
        }
    }

    struct FakeExemplars {
        rows: Vec<MuscleMemoryExemplar>,
    }
    impl ExemplarStore for FakeExemplars {
        fn create(&self, exemplar: MuscleMemoryExemplar) -> Result<MuscleMemoryExemplar, CoreError> {
            Ok(exemplar)
        }

        fn update(&self, _exemplar: MuscleMemoryExemplar) -> Result<(), CoreError> {
            Ok(())
        }

        fn candidates(&self, _interaction_type: Option<&str>) -> Result<Vec<MuscleMemoryExemplar>, CoreError> {
            Ok(self.rows.clone())
        }
    }

    fn exemplar(embedding: Vec<f32>, quality: f32) -> MuscleMemoryExemplar {
        MuscleMemoryExemplar {
            id: ExemplarId::from_raw(1).unwrap_or(PLACEHOLDER_EXEMPLAR_ID),
            case_number: "CS0000001".to_string(),
            interaction_type: "classification".to_string(),
            input_context_snapshot: serde_json::Value::Null,
            action_taken: "restarted VPN concentrator".to_string(),
            outcome: "resolved".to_string(),
            embedding,
            quality_score: quality,
            quality_signals: QualitySignals {
                supervisor_approved: Some(true),
                outcome_success: Some(true),
                human_feedback_positive: None,
            },
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    fn case() -> Case {
        Case {
            id: CaseId::new("c-1"),
            number: "SCS1001".to_string(),
            short_description: "VPN down, 20 users".to_string(),
            long_description: None,
            priority: 2,
            urgency: 2,
            company: "Acme".to_string(),
            assignment_group: None,
            account: None,
            current_category: None,
        }
    }

    #[test]
    fn retrieve_filters_by_distance_and_quality() {
        let exemplars = FakeExemplars {
            rows: vec![exemplar(vec![1.0, 0.0, 0.0], 0.9), exemplar(vec![0.0, 1.0, 0.0], 0.9)],
        };
        let embedding = FakeEmbedding;
        let config = MuscleMemoryConfig::default();
        let retriever = MuscleMemoryRetriever::new(&embedding, &exemplars, &config);
        let results = retriever.retrieve(&case(), None).expect("retrieves");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].embedding, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn low_quality_exemplars_are_excluded() {
        let exemplars = FakeExemplars {
            rows: vec![exemplar(vec![1.0, 0.0, 0.0], 0.1)],
        };
        let embedding = FakeEmbedding;
        let config = MuscleMemoryConfig::default();
        let retriever = MuscleMemoryRetriever::new(&embedding, &exemplars, &config);
        let results = retriever.retrieve(&case(), None).expect("retrieves");
        assert!(results.is_empty());
    }

    #[test]
    fn record_updates_incumbent_on_near_duplicate() {
        let exemplars = FakeExemplars {
            rows: vec![exemplar(vec![1.0, 0.0, 0.0], 0.5)],
        };
        let embedding = FakeEmbedding;
        let config = MuscleMemoryConfig::default();
        let retriever = MuscleMemoryRetriever::new(&embedding, &exemplars, &config);
        let candidate = exemplar(vec![1.0, 0.0, 0.0001], 0.0);
        let result = retriever.record(candidate).expect("records");
        assert!(result.quality_score > 0.5);
    }

    #[test]
    fn cosine_distance_is_zero_for_identical_vectors() {
        let distance = cosine_distance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).expect("some");
        assert!(distance.abs() < 1e-6);
    }
}
