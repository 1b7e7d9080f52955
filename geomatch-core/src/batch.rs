//! Concurrent resolution of a batch of caller records.
//!
//! Every record gets its own blocking store lookup on the Tokio blocking pool.
//! Results are recombined by input index, so completion order never leaks into
//! the output. The batch is all-or-nothing: any failed lookup fails the batch,
//! but only after every started lookup has finished.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    AddressRecord, AddressStore, MergeError, Projection, PropertySet, Representation,
    Resolution, ResolveError, UnresolvedReason, build_query, merge_batch, resolve,
};

/// Records to resolve together with how they map onto the store.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Caller records, in output order.
    pub records: Vec<AddressRecord>,
    /// Canonical field to caller column mapping.
    pub representation: Representation,
    /// Fields added to every output record.
    pub projection: Projection,
}

/// Per-outcome counts for a resolved batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Records with exactly one candidate.
    pub matched: usize,
    /// Records with no candidate or no usable query term.
    pub no_match: usize,
    /// Records with several candidates.
    pub ambiguous: usize,
    /// Records whose substring pattern could not be compiled.
    pub invalid_pattern: usize,
}

impl BatchSummary {
    /// Count one resolution.
    pub fn record(&mut self, resolution: &Resolution) {
        match resolution.unresolved_reason() {
            None => self.matched += 1,
            Some(UnresolvedReason::NoMatch) => self.no_match += 1,
            Some(UnresolvedReason::Ambiguous) => self.ambiguous += 1,
            Some(UnresolvedReason::InvalidPattern) => self.invalid_pattern += 1,
        }
    }

    /// Number of records counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matched + self.no_match + self.ambiguous + self.invalid_pattern
    }

    /// Number of records left without resolved fields.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.total() - self.matched
    }
}

impl<'a> FromIterator<&'a Resolution> for BatchSummary {
    fn from_iter<I: IntoIterator<Item = &'a Resolution>>(iter: I) -> Self {
        let mut summary = Self::default();
        for resolution in iter {
            summary.record(resolution);
        }
        summary
    }
}

/// Merged records and their summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// One merged record per input record, in input order.
    pub records: Vec<AddressRecord>,
    /// Outcome counts.
    pub summary: BatchSummary,
}

/// Errors returned by [`BatchResolver`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// No mapped field is retrievable from the store.
    #[error("representation maps no retrievable property; available properties:\n{available}")]
    InvalidRepresentation {
        /// Bullet list of retrievable fields.
        available: String,
    },
    /// A lookup failed; the first failing input position is reported.
    #[error("lookup for record {index} failed: {source}")]
    Lookup {
        /// Zero-based input position.
        index: usize,
        /// Underlying resolver error.
        #[source]
        source: ResolveError,
    },
    /// The batch was cancelled before every lookup finished.
    #[error("batch resolution was cancelled")]
    Cancelled,
    /// A lookup task panicked or was aborted.
    #[error("lookup task failed: {0}")]
    Join(#[from] JoinError),
    /// A lookup task finished without reporting its result.
    #[error("lookup for record {index} produced no result")]
    Incomplete {
        /// Zero-based input position.
        index: usize,
    },
    /// Records and resolutions did not pair up.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Resolves batches against a shared store.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use geomatch_core::test_support::{MemoryStore, berlin_sample, record};
/// use geomatch_core::{BatchRequest, BatchResolver, PropertySet, Representation};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), geomatch_core::BatchError> {
/// let properties = PropertySet::berlin();
/// let resolver = BatchResolver::new(
///     Arc::new(MemoryStore::with_records(berlin_sample())),
///     properties.clone(),
/// );
/// let outcome = resolver
///     .resolve_batch(BatchRequest {
///         records: vec![record(json!({"Adresse": "Seestr. 12"}))],
///         representation: Representation::from_iter([("str_hnr", "Adresse")]),
///         projection: properties.projection(Some("plz")),
///     })
///     .await?;
/// assert_eq!(outcome.records[0].get("plz"), Some(&json!("13353")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchResolver<S>
where
    S: AddressStore + ?Sized + 'static,
{
    store: Arc<S>,
    properties: Arc<PropertySet>,
}

impl<S> Clone for BatchResolver<S>
where
    S: AddressStore + ?Sized + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            properties: Arc::clone(&self.properties),
        }
    }
}

impl<S> BatchResolver<S>
where
    S: AddressStore + ?Sized + 'static,
{
    /// Create a resolver over `store` restricted to `properties`.
    pub fn new(store: Arc<S>, properties: PropertySet) -> Self {
        Self {
            store,
            properties: Arc::new(properties),
        }
    }

    /// The property whitelist in use.
    #[must_use]
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    /// Resolve every record of `request`.
    ///
    /// # Errors
    /// See [`BatchError`].
    pub async fn resolve_batch(&self, request: BatchRequest) -> Result<BatchOutcome, BatchError> {
        self.resolve_batch_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Resolve every record of `request` unless `token` is cancelled first.
    ///
    /// Cancellation aborts lookups that have not started yet and returns
    /// [`BatchError::Cancelled`].
    ///
    /// # Errors
    /// See [`BatchError`].
    pub async fn resolve_batch_with_cancellation(
        &self,
        request: BatchRequest,
        token: CancellationToken,
    ) -> Result<BatchOutcome, BatchError> {
        let BatchRequest {
            records,
            representation,
            projection,
        } = request;

        let representation = representation.restricted_to(&*self.properties);
        if representation.is_empty() {
            return Err(BatchError::InvalidRepresentation {
                available: self.properties.describe(),
            });
        }

        let projection = Arc::new(projection.restricted_to(&*self.properties));
        let mut tasks = JoinSet::new();
        for (index, record) in records.iter().enumerate() {
            let query = build_query(record, &representation, &*self.properties);
            let store = Arc::clone(&self.store);
            let properties = Arc::clone(&self.properties);
            let projection = Arc::clone(&projection);
            tasks.spawn_blocking(move || {
                (
                    index,
                    resolve(&query, &properties, &projection, &*store),
                )
            });
        }

        let mut slots: Vec<Option<Result<Resolution, ResolveError>>> =
            records.iter().map(|_| None).collect();
        let mut join_failure = None;
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tasks.abort_all();
                    warn!("batch of {} record(s) cancelled", records.len());
                    return Err(BatchError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, result))) => {
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(result);
                        }
                    }
                    Some(Err(err)) => {
                        warn!("lookup task failed: {err}");
                        join_failure.get_or_insert(err);
                    }
                },
            }
        }
        if let Some(err) = join_failure {
            return Err(BatchError::Join(err));
        }

        let mut resolutions = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(resolution)) => resolutions.push(resolution),
                Some(Err(source)) => {
                    warn!("lookup for record {index} failed: {source}");
                    return Err(BatchError::Lookup { index, source });
                }
                None => return Err(BatchError::Incomplete { index }),
            }
        }

        let summary: BatchSummary = resolutions.iter().collect();
        debug!(
            "resolved batch of {}: {} matched, {} without match, {} ambiguous, \
             {} with invalid patterns",
            summary.total(),
            summary.matched,
            summary.no_match,
            summary.ambiguous,
            summary.invalid_pattern
        );
        let records = merge_batch(&records, &resolutions, &projection.empty_template())?;
        Ok(BatchOutcome { records, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        MemoryStore, PoisonedStore, UnavailableStore, berlin_sample, record,
    };
    use crate::StoreError;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex};
    use tokio::sync::Notify;

    #[fixture]
    fn resolver() -> BatchResolver<MemoryStore> {
        BatchResolver::new(
            Arc::new(MemoryStore::with_records(berlin_sample())),
            PropertySet::berlin(),
        )
    }

    fn request(records: Vec<AddressRecord>) -> BatchRequest {
        BatchRequest {
            records,
            representation: Representation::from_iter([("str_hnr", "Adresse"), ("plz", "PLZ")]),
            projection: Projection::new(["plz", "bezirk"]),
        }
    }

    fn rows() -> Vec<AddressRecord> {
        vec![
            record(json!({"Adresse": "Oranienstrasse 1", "PLZ": "10997"})),
            record(json!({"Adresse": "Oranienstrasse 1"})),
            record(json!({"Adresse": "Elsenstr. 110c", "PLZ": 12435})),
            record(json!({"Adresse": "Unter den Linden 1"})),
            record(json!({"Name": "no address"})),
        ]
    }

    #[rstest]
    #[tokio::test]
    async fn merges_results_in_input_order(resolver: BatchResolver<MemoryStore>) {
        let outcome = resolver
            .resolve_batch(request(rows()))
            .await
            .expect("batch resolves");

        assert_eq!(outcome.records.len(), 5);
        assert_eq!(
            outcome.records[0],
            record(json!({
                "Adresse": "Oranienstrasse 1",
                "PLZ": "10997",
                "plz": "10997",
                "bezirk": "Friedrichshain-Kreuzberg"
            }))
        );
        assert_eq!(outcome.records[1].get("plz"), Some(&json!("")));
        assert_eq!(outcome.records[2].get("bezirk"), Some(&json!("Treptow-Köpenick")));
        assert_eq!(outcome.records[4].get("Name"), Some(&json!("no address")));
        assert_eq!(
            outcome.summary,
            BatchSummary {
                matched: 2,
                no_match: 2,
                ambiguous: 1,
                invalid_pattern: 0,
            }
        );
    }

    #[rstest]
    fn summary_counts_every_reason() {
        let resolutions = [
            Resolution::Matched(record(json!({"plz": "10997"}))),
            Resolution::Unresolved(UnresolvedReason::NoMatch),
            Resolution::Unresolved(UnresolvedReason::Ambiguous),
            Resolution::Unresolved(UnresolvedReason::InvalidPattern),
            Resolution::Unresolved(UnresolvedReason::InvalidPattern),
        ];
        let summary: BatchSummary = resolutions.iter().collect();
        assert_eq!(summary.invalid_pattern, 2);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.unresolved(), 4);
        assert_eq!(summary.matched + summary.unresolved(), summary.total());
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_representation_without_retrievable_fields(
        resolver: BatchResolver<MemoryStore>,
    ) {
        let mut request = request(rows());
        request.representation = Representation::from_iter([("colour", "Farbe")]);
        let err = resolver
            .resolve_batch(request)
            .await
            .expect_err("representation is unusable");
        let BatchError::InvalidRepresentation { available } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(available.contains("  - str_hnr (fuzzy)"));
        assert!(available.contains("  - plz"));
        assert!(err.to_string().contains("available properties"));
    }

    #[rstest]
    #[tokio::test]
    async fn empty_batches_resolve_to_nothing(resolver: BatchResolver<MemoryStore>) {
        let outcome = resolver
            .resolve_batch(request(Vec::new()))
            .await
            .expect("empty batch resolves");
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.summary.total(), 0);
    }

    #[tokio::test]
    async fn reports_first_failing_position_after_all_lookups() {
        let store = Arc::new(PoisonedStore::new(
            MemoryStore::with_records(berlin_sample()),
            "10969",
        ));
        let resolver = BatchResolver::new(Arc::clone(&store), PropertySet::berlin());
        let records = vec![
            record(json!({"PLZ": "10997"})),
            record(json!({"PLZ": "10969"})),
            record(json!({"PLZ": "12435"})),
            record(json!({"PLZ": "10969"})),
        ];

        let err = resolver
            .resolve_batch(request(records))
            .await
            .expect_err("poisoned lookups fail");

        assert!(matches!(err, BatchError::Lookup { index: 1, .. }));
        assert_eq!(store.lookups(), 4);
    }

    #[tokio::test]
    async fn unavailable_store_fails_the_batch() {
        let resolver = BatchResolver::new(Arc::new(UnavailableStore), PropertySet::berlin());
        let err = resolver
            .resolve_batch(request(rows()))
            .await
            .expect_err("store is down");
        let BatchError::Lookup { index, source } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*index, 0);
        assert!(matches!(
            source,
            ResolveError::Store(StoreError::Unavailable { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn cancelled_token_aborts_the_batch(resolver: BatchResolver<MemoryStore>) {
        let token = CancellationToken::new();
        token.cancel();
        let err = resolver
            .resolve_batch_with_cancellation(request(rows()), token)
            .await
            .expect_err("batch is cancelled");
        assert!(matches!(err, BatchError::Cancelled));
    }

    /// Store whose lookups block until the test opens the gate.
    #[derive(Debug)]
    struct GatedStore {
        inner: MemoryStore,
        started: Notify,
        open: Mutex<bool>,
        opened: Condvar,
        completed: AtomicUsize,
    }

    impl GatedStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                started: Notify::new(),
                open: Mutex::new(false),
                opened: Condvar::new(),
                completed: AtomicUsize::new(0),
            }
        }

        fn release(&self) {
            *self.open.lock().expect("gate lock") = true;
            self.opened.notify_all();
        }

        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    impl AddressStore for GatedStore {
        fn find(
            &self,
            filter: &crate::Filter,
            projection: &Projection,
            limit: Option<usize>,
        ) -> Result<Vec<AddressRecord>, StoreError> {
            self.started.notify_one();
            let mut open = self.open.lock().expect("gate lock");
            while !*open {
                open = self.opened.wait(open).expect("gate lock");
            }
            drop(open);
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.inner.find(filter, projection, limit)
        }
    }

    #[tokio::test]
    async fn cancelling_mid_batch_returns_before_lookups_finish() {
        let store = Arc::new(GatedStore::new(MemoryStore::with_records(berlin_sample())));
        let resolver = BatchResolver::new(Arc::clone(&store), PropertySet::berlin());
        let token = CancellationToken::new();

        let cancel_once_started = async {
            store.started.notified().await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(
            resolver.resolve_batch_with_cancellation(request(rows()), token.clone()),
            cancel_once_started
        );

        let completed = store.completed();
        store.release();
        assert!(matches!(result, Err(BatchError::Cancelled)));
        assert_eq!(completed, 0);
    }

    #[tokio::test]
    async fn projection_never_exposes_unlisted_fields() {
        let store = MemoryStore::with_records([record(json!({
            "str_hnr": "Seestraße 12",
            "plz": "13353",
            "secret": "leak"
        }))]);
        let resolver = BatchResolver::new(Arc::new(store), PropertySet::berlin());
        let request = BatchRequest {
            projection: Projection::new(["plz", "secret"]),
            ..request(vec![record(json!({"Adresse": "Seestr. 12"}))])
        };

        let outcome = resolver
            .resolve_batch(request)
            .await
            .expect("batch resolves");

        assert_eq!(
            outcome.records,
            vec![record(json!({"Adresse": "Seestr. 12", "plz": "13353"}))]
        );
        assert_eq!(outcome.summary.matched, 1);
    }

    #[tokio::test]
    async fn accepts_shared_trait_objects() {
        let store: Arc<dyn AddressStore> = Arc::new(MemoryStore::with_records(berlin_sample()));
        let resolver = BatchResolver::new(store, PropertySet::berlin());
        let outcome = resolver
            .resolve_batch(request(vec![record(json!({"Adresse": "Seestrasse 12"}))]))
            .await
            .expect("batch resolves");
        assert_eq!(outcome.summary.matched, 1);
    }
}
