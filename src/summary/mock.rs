use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use etl_monitor_core::mock::MockGenerator;
use etl_monitor_core::models::{ChartQuery, TableQuery};

use super::{SummaryError, SummarySource};

/// Deterministic stand-in for the summary upstream.
#[derive(Debug, Clone, Default)]
pub struct MockSummarySource {
    generator: MockGenerator,
}

impl MockSummarySource {
    pub fn new(seed: u32) -> Self {
        Self {
            generator: MockGenerator::new(seed),
        }
    }
}

#[async_trait]
impl SummarySource for MockSummarySource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chart(&self, query: &ChartQuery) -> Result<Value, SummaryError> {
        let today = Utc::now().date_naive();
        Ok(serde_json::to_value(self.generator.chart(query, today))?)
    }

    async fn table(&self, query: &TableQuery) -> Result<Value, SummaryError> {
        Ok(serde_json::to_value(self.generator.table(query))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_monitor_core::mock::DEFAULT_SEED;

    fn first_page(source: &MockSummarySource) -> Value {
        tokio_test::block_on(source.table(&TableQuery::default())).unwrap()
    }

    #[test]
    fn default_source_uses_the_default_seed() {
        let default = first_page(&MockSummarySource::default());
        assert_eq!(default, first_page(&MockSummarySource::new(DEFAULT_SEED)));
        assert_ne!(default["data"], first_page(&MockSummarySource::new(7))["data"]);
    }
}
