/// Options that control how a crawl behaves.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Upper bound on classifications running at once.
    pub max_concurrency: usize,
    /// Also enqueue the definitions of every root document.
    pub include_definitions: bool,
    /// Capacity of the plan stream handed to the consumer.
    pub output_buffer: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            include_definitions: false,
            output_buffer: 64,
        }
    }
}
