//! Concurrent traversal of a schema graph.
//!
//! One scheduler task owns all crawl state: the seen set, the in-flight
//! count and the task set. Root loads and classifications run as tasks of
//! that set and report back over channels, so the state itself is never
//! shared. Dependencies discovered by a plan are enqueued only after the
//! plan is accepted.

use std::collections::HashSet;
use std::sync::Arc;

use schemaforge_core::{Schema, TypeId};
use schemaforge_plan::{Plan, PlanError, StrategyChain, Typer};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::loader::{LoadError, Loader};
use crate::options::CrawlOptions;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },
    #[error("failed to plan {schema}: {source}")]
    Plan {
        schema: String,
        #[source]
        source: PlanError,
    },
    #[error("crawl cancelled")]
    Cancelled,
    #[error("crawl task failed: {0}")]
    Task(String),
}

impl CrawlError {
    fn plan(schema: &Schema, source: PlanError) -> Self {
        Self::Plan {
            schema: schema.id.clone(),
            source,
        }
    }
}

/// Cloneable cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Plans produced by a running crawl.
///
/// A fatal error is always the last item. Dropping the stream cancels the
/// crawl; after [`PlanStream::cancel`] the stream ends without an error.
pub struct PlanStream {
    receiver: mpsc::Receiver<Result<Plan, CrawlError>>,
    cancel: CancelToken,
    scheduler: Option<JoinHandle<()>>,
}

impl PlanStream {
    pub async fn next(&mut self) -> Option<Result<Plan, CrawlError>> {
        if let Some(item) = self.receiver.recv().await {
            return Some(item);
        }
        let scheduler = self.scheduler.take()?;
        match scheduler.await {
            Ok(()) => None,
            Err(err) => Some(Err(CrawlError::Task(format!("scheduler failed: {err}")))),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Drop for PlanStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Walks every schema reachable from a set of roots and plans each named
/// type exactly once.
pub struct Crawler {
    chain: Arc<StrategyChain>,
    loader: Arc<dyn Loader>,
    typer: Arc<Typer>,
    options: CrawlOptions,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("chain", &self.chain)
            .field("typer", &self.typer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    pub fn new(
        chain: Arc<StrategyChain>,
        loader: Arc<dyn Loader>,
        typer: Arc<Typer>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            chain,
            loader,
            typer,
            options,
        }
    }

    /// Start crawling from `roots`. Must be called inside a tokio runtime.
    pub fn crawl<I, S>(&self, roots: I) -> PlanStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roots: Vec<String> = roots.into_iter().map(Into::into).collect();
        let max_concurrency = self.options.max_concurrency.max(1);
        info!(
            roots = roots.len(),
            max_concurrency,
            include_definitions = self.options.include_definitions,
            "crawl started"
        );

        let cancel = CancelToken::new();
        let (output, receiver) = mpsc::channel(self.options.output_buffer.max(1));
        let (frontier_tx, frontier_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (roots_tx, roots_rx) = oneshot::channel();

        let mut scheduler = Scheduler {
            chain: Arc::clone(&self.chain),
            typer: Arc::clone(&self.typer),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            cancel: cancel.clone(),
            seen: HashSet::new(),
            in_flight: 0,
            forwarded: 0,
            tasks: JoinSet::new(),
            frontier: frontier_tx.clone(),
            results: results_tx,
            output,
        };
        scheduler.tasks.spawn(load_roots(
            Arc::clone(&self.loader),
            roots,
            self.options.include_definitions,
            frontier_tx,
            cancel.clone(),
            roots_tx,
        ));
        let handle = tokio::spawn(scheduler.run(frontier_rx, results_rx, roots_rx));

        PlanStream {
            receiver,
            cancel,
            scheduler: Some(handle),
        }
    }

    /// Crawl to completion. Either every plan or the first fatal error.
    pub async fn collect<I, S>(&self, roots: I) -> Result<Vec<Plan>, CrawlError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stream = self.crawl(roots);
        let mut plans = Vec::new();
        while let Some(item) = stream.next().await {
            plans.push(item?);
        }
        Ok(plans)
    }
}

type Classified = Result<Plan, CrawlError>;

struct Scheduler {
    chain: Arc<StrategyChain>,
    typer: Arc<Typer>,
    permits: Arc<Semaphore>,
    cancel: CancelToken,
    seen: HashSet<TypeId>,
    in_flight: usize,
    forwarded: usize,
    tasks: JoinSet<()>,
    frontier: mpsc::UnboundedSender<Arc<Schema>>,
    results: mpsc::UnboundedSender<Classified>,
    output: mpsc::Sender<Classified>,
}

impl Scheduler {
    async fn run(
        mut self,
        mut frontier: mpsc::UnboundedReceiver<Arc<Schema>>,
        mut results: mpsc::UnboundedReceiver<Classified>,
        mut roots: oneshot::Receiver<Result<(), CrawlError>>,
    ) {
        let cancel = self.cancel.clone();
        let mut roots_loaded = false;

        let outcome = loop {
            if roots_loaded && self.in_flight == 0 && frontier.is_empty() {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(CrawlError::Cancelled),
                Some(joined) = self.tasks.join_next() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            break Err(CrawlError::Task(format!("crawl task panicked: {err}")));
                        }
                    }
                }
                loaded = &mut roots, if !roots_loaded => match loaded {
                    Ok(Ok(())) => roots_loaded = true,
                    Ok(Err(err)) => break Err(err),
                    Err(_) => break Err(CrawlError::Task("root loading stopped".to_string())),
                },
                Some(result) = results.recv() => {
                    self.in_flight -= 1;
                    match result {
                        Ok(plan) => self.accept(plan),
                        Err(err) => break Err(err),
                    }
                }
                Some(schema) = frontier.recv() => {
                    if let Err(err) = self.submit(schema) {
                        break Err(err);
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                while self.tasks.join_next().await.is_some() {}
                info!(plans = self.forwarded, "crawl finished");
            }
            Err(CrawlError::Cancelled) => {
                self.shutdown().await;
                info!(plans = self.forwarded, "crawl cancelled");
            }
            Err(err) => {
                warn!(error = %err, "crawl failed");
                self.shutdown().await;
                let _ = self.output.send(Err(err)).await;
            }
        }
    }

    /// Stop every task and wait for all of them to exit.
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        while self.tasks.join_next().await.is_some() {}
    }

    fn submit(&mut self, schema: Arc<Schema>) -> Result<(), CrawlError> {
        let type_id = match self.typer.resolve(&schema, None) {
            Ok(Some(type_id)) if type_id.is_named() => type_id,
            Ok(_) => {
                trace!(schema = %schema.id, "no generated type, skipped");
                return Ok(());
            }
            Err(source) => return Err(CrawlError::plan(&schema, source)),
        };
        if !self.seen.insert(type_id.clone()) {
            trace!(type_id = %type_id, "already scheduled");
            return Ok(());
        }

        let target = self
            .typer
            .dereference(&schema)
            .map_err(|source| CrawlError::plan(&schema, source))?;
        let explicit = self
            .typer
            .is_explicit(&schema)
            .map_err(|source| CrawlError::plan(&schema, source))?;
        let options = self.chain.options();
        if explicit || options.is_excluded(&schema) || options.is_excluded(&target) {
            debug!(schema = %schema.id, type_id = %type_id, "schema excluded");
            return Ok(());
        }

        debug!(schema = %schema.id, type_id = %type_id, "schema scheduled");
        self.in_flight += 1;
        let chain = Arc::clone(&self.chain);
        let typer = Arc::clone(&self.typer);
        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();
        let results = self.results.clone();
        self.tasks.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };
            let result = chain
                .plan(&typer, &schema)
                .map_err(|source| CrawlError::plan(&schema, source));
            if !cancel.is_cancelled() {
                let _ = results.send(result);
            }
        });
        Ok(())
    }

    fn accept(&mut self, plan: Plan) {
        for node in &plan.discovered {
            let _ = self.frontier.send(Arc::clone(node));
        }

        self.forwarded += 1;
        let output = self.output.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = output.send(Ok(plan)) => {}
            }
        });
    }
}

/// Load every root concurrently and feed the results to the frontier.
async fn load_roots(
    loader: Arc<dyn Loader>,
    roots: Vec<String>,
    include_definitions: bool,
    frontier: mpsc::UnboundedSender<Arc<Schema>>,
    cancel: CancelToken,
    done: oneshot::Sender<Result<(), CrawlError>>,
) {
    let mut loads = JoinSet::new();
    for uri in roots {
        let loader = Arc::clone(&loader);
        loads.spawn(async move {
            let result = loader.load(&uri).await;
            (uri, result)
        });
    }

    let result = async {
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                joined = loads.join_next() => joined,
            };
            let Some(joined) = joined else {
                return Ok(());
            };

            let (uri, loaded) =
                joined.map_err(|err| CrawlError::Task(format!("root load failed: {err}")))?;
            let root = loaded.map_err(|source| CrawlError::Load {
                uri: uri.clone(),
                source,
            })?;
            debug!(uri = %uri, "root loaded");

            let _ = frontier.send(Arc::clone(&root));
            if include_definitions {
                for definition in root.definitions.values() {
                    let _ = frontier.send(Arc::clone(definition));
                }
            }
        }
    }
    .await;

    let _ = done.send(result);
}
