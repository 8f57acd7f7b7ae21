// crates/caseflow-pipeline/src/context_loader.rs
// ============================================================================
// Module: Context Loader
// Description: Assembles a ContextPack from the case repository plus four
//              independent enrichment fetches run in parallel.
// ============================================================================

use std::sync::mpsc;
use std::time::Duration;

use caseflow_config::MuscleMemoryConfig;
use caseflow_core::{
    BusinessContextRepository, Case, CaseId, CaseRepository, ContextPack, CoreError,
    EmbeddingClient, ExemplarStore, KbArticle, KnowledgeBaseRepository, SimilarCase,
    SimilarCaseRepository,
};

use crate::muscle_memory::MuscleMemoryRetriever;

/// How long an individual enrichment fetch is allowed to run before its
/// section degrades to absent.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Wires every repository the Context Loader fans out to.
pub struct ContextLoader<'a> {
    case_repo: &'a dyn CaseRepository,
    business_context_repo: &'a dyn BusinessContextRepository,
    similar_case_repo: &'a dyn SimilarCaseRepository,
    kb_repo: &'a dyn KnowledgeBaseRepository,
    embedding: &'a dyn EmbeddingClient,
    exemplars: &'a dyn ExemplarStore,
    muscle_memory_config: &'a MuscleMemoryConfig,
    fetch_timeout: Duration,
}

impl<'a> ContextLoader<'a> {
    /// Builds a loader over every enrichment dependency, using the default
    /// 5-second per-fetch timeout.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "one field per enrichment dependency, no natural grouping")]
    pub const fn new(
        case_repo: &'a dyn CaseRepository,
        business_context_repo: &'a dyn BusinessContextRepository,
        similar_case_repo: &'a dyn SimilarCaseRepository,
        kb_repo: &'a dyn KnowledgeBaseRepository,
        embedding: &'a dyn EmbeddingClient,
        exemplars: &'a dyn ExemplarStore,
        muscle_memory_config: &'a MuscleMemoryConfig,
    ) -> Self {
        Self {
            case_repo,
            business_context_repo,
            similar_case_repo,
            kb_repo,
            embedding,
            exemplars,
            muscle_memory_config,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Overrides the per-fetch timeout (tests use this to force a degraded
    /// section deterministically).
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Loads the case, then fans out the four enrichment fetches in
    /// parallel, each bounded by `fetch_timeout`. A fetch that errors or
    /// exceeds its timeout degrades its section to `None`/empty rather than
    /// failing the whole pack.
    ///
    /// # Errors
    /// Returns [`CoreError`] only if the case itself cannot be loaded — a
    /// `ContextPack` has no meaning without its case snapshot.
    pub fn load(&self, case_id: &CaseId) -> Result<ContextPack, CoreError> {
        let case = self.case_repo.get_case(case_id)?;

        let (business_context, similar_cases, kb_articles, exemplars) = std::thread::scope(|scope| {
            let business_context = self.spawn_bounded(scope, || {
                self.business_context_repo
                    .lookup(business_lookup_key(&case))
                    .unwrap_or(None)
            });
            let similar_cases = self.spawn_bounded(scope, || {
                self.similar_case_repo
                    .find_similar(&case, ContextPack::MAX_ENRICHMENT_ROWS)
                    .unwrap_or_default()
            });
            let kb_articles = self.spawn_bounded(scope, || {
                self.kb_repo.search(&case, ContextPack::MAX_ENRICHMENT_ROWS).unwrap_or_default()
            });
            let exemplars = self.spawn_bounded(scope, || {
                let retriever =
                    MuscleMemoryRetriever::new(self.embedding, self.exemplars, self.muscle_memory_config);
                retriever.retrieve(&case, None).unwrap_or_default()
            });

            (
                business_context.recv(),
                similar_cases.recv(),
                kb_articles.recv(),
                exemplars.recv(),
            )
        });

        Ok(ContextPack {
            case,
            business_context: business_context.unwrap_or(None),
            similar_cases: similar_cases.unwrap_or_default(),
            kb_articles: kb_articles.unwrap_or_default(),
            exemplars: exemplars.unwrap_or_default(),
        })
    }

    /// Runs `work` on a scoped thread and returns a receiver that yields its
    /// result, or nothing if `work` does not finish within `fetch_timeout`.
    fn spawn_bounded<'scope, T: Send + 'scope>(
        &self,
        scope: &'scope std::thread::Scope<'scope, '_>,
        work: impl FnOnce() -> T + Send + 'scope,
    ) -> BoundedReceiver<T> {
        let (tx, rx) = mpsc::channel();
        scope.spawn(move || {
            let _ = tx.send(work());
        });
        BoundedReceiver {
            rx,
            timeout: self.fetch_timeout,
        }
    }
}

/// A channel receiver that degrades to `None` once `timeout` elapses,
/// without blocking past it. The scoped thread producing the value may keep
/// running after its deadline passes — `load`'s overall wall-clock time is
/// still bounded by whichever repository implementation enforces its own
/// per-request timeout, this only bounds how long the loader *waits on* a
/// slow fetch before moving on with a degraded section.
struct BoundedReceiver<T> {
    rx: mpsc::Receiver<T>,
    timeout: Duration,
}

impl<T> BoundedReceiver<T> {
    fn recv(self) -> Option<T> {
        self.rx.recv_timeout(self.timeout).ok()
    }
}

/// Returns the key the business-context repository should be queried with:
/// the account if present, otherwise the company.
fn business_lookup_key(case: &Case) -> &str {
    case.account.as_deref().unwrap_or(&case.company)
}

#[cfg(test)]
mod tests {
    use caseflow_config::MuscleMemoryConfig;
    use caseflow_core::BusinessContext;

    use super::*;

    struct FakeCases;
    impl CaseRepository for FakeCases {
        fn get_case(&self, _id: &CaseId) -> Result<Case, CoreError> {
            Ok(Case {
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
            })
        }

        fn append_work_note(&self, _id: &CaseId, _note: &str) -> Result<(), CoreError> {
            Ok(())
        }

        fn apply_classification(
            &self,
            _id: &CaseId,
            _category: &str,
            _subcategory: Option<&str>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FakeBusinessContext;
    impl BusinessContextRepository for FakeBusinessContext {
        fn lookup(&self, _key: &str) -> Result<Option<BusinessContext>, CoreError> {
            Ok(Some(BusinessContext {
                entity_name: "Acme".to_string(),
                tier: Some("enterprise".to_string()),
                compliance_sensitive: false,
                notes: None,
            }))
        }
    }

    struct FakeSimilarCases;
    impl SimilarCaseRepository for FakeSimilarCases {
        fn find_similar(&self, _case: &Case, _limit: usize) -> Result<Vec<SimilarCase>, CoreError> {
            Ok(vec![])
        }
    }

    struct FakeKb;
    impl KnowledgeBaseRepository for FakeKb {
        fn search(&self, _case: &Case, _limit: usize) -> Result<Vec<KbArticle>, CoreError> {
            Ok(vec![])
        }
    }

    struct FakeEmbedding;
    impl EmbeddingClient for FakeEmbedding {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(vec![0.0; caseflow_core::EMBEDDING_DIMENSIONS])
        }
    }

    struct FakeExemplars;
    impl ExemplarStore for FakeExemplars {
        fn create(
            &self,
            exemplar: caseflow_core::MuscleMemoryExemplar,
        ) -> Result<caseflow_core::MuscleMemoryExemplar, CoreError> {
            Ok(exemplar)
        }

        fn update(&self, _exemplar: caseflow_core::MuscleMemoryExemplar) -> Result<(), CoreError> {
            Ok(())
        }

        fn candidates(
            &self,
            _interaction_type: Option<&str>,
        ) -> Result<Vec<caseflow_core::MuscleMemoryExemplar>, CoreError> {
            Ok(vec![])
        }
    }

    struct FailingServiceNow;
    impl BusinessContextRepository for FailingServiceNow {
        fn lookup(&self, _key: &str) -> Result<Option<BusinessContext>, CoreError> {
            Err(CoreError::Transient {
                operation: "business_context_lookup",
                detail: "boom".to_string(),
            })
        }
    }

    #[test]
    fn load_populates_all_sections_on_success() {
        let cases = FakeCases;
        let business_context = FakeBusinessContext;
        let similar_cases = FakeSimilarCases;
        let kb = FakeKb;
        let embedding = FakeEmbedding;
        let exemplars = FakeExemplars;
        let config = MuscleMemoryConfig::default();
        let loader = ContextLoader::new(&cases, &business_context, &similar_cases, &kb, &embedding, &exemplars, &config);
        let pack = loader.load(&CaseId::new("c-1")).expect("loads");
        assert!(pack.business_context.is_some());
        assert!(pack.similar_cases.is_empty());
    }

    #[test]
    fn a_failing_enrichment_degrades_to_absent_not_error() {
        let cases = FakeCases;
        let business_context = FailingServiceNow;
        let similar_cases = FakeSimilarCases;
        let kb = FakeKb;
        let embedding = FakeEmbedding;
        let exemplars = FakeExemplars;
        let config = MuscleMemoryConfig::default();
        let loader = ContextLoader::new(&cases, &business_context, &similar_cases, &kb, &embedding, &exemplars, &config);
        let pack = loader.load(&CaseId::new("c-1")).expect("still loads");
        assert!(pack.business_context.is_none());
    }

    #[test]
    fn business_lookup_key_prefers_account_over_company() {
        let case = Case {
            id: CaseId::new("c-1"),
            number: "SCS1001".to_string(),
            short_description: String::new(),
            long_description: None,
            priority: 2,
            urgency: 2,
            company: "Acme".to_string(),
            assignment_group: None,
            account: Some("Acme West".to_string()),
            current_category: None,
        };
        assert_eq!(business_lookup_key(&case), "Acme West");
    }
}
