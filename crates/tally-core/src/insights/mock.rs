//! Mock backend for testing
//!
//! Returns canned insights derived from the snapshot, or fails on demand.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{Insight, InsightBackend, InsightKind, InsightResponse, InsightSnapshot};

#[derive(Clone, Default)]
pub struct MockBackend {
    /// When false every request fails
    pub healthy: bool,
}

impl MockBackend {
    /// A healthy mock
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// A mock whose requests always fail
    pub fn failing() -> Self {
        Self { healthy: false }
    }
}

#[async_trait]
impl InsightBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, snapshot: &InsightSnapshot) -> Result<InsightResponse> {
        if !self.healthy {
            return Err(Error::Collaborator("mock backend is down".into()));
        }

        let summary = &snapshot.summary;
        let mut insights = vec![Insight {
            title: format!("{} at a glance", summary.period.label),
            content: format!(
                "Income {} and spending {} leave a net of {}.",
                summary.income, summary.expense, summary.net
            ),
            kind: InsightKind::Info,
        }];
        if let Some(top) = summary.by_category.first() {
            insights.push(Insight {
                title: format!("Top category: {}", top.category),
                content: format!("{} across {} transaction(s).", top.total, top.count),
                kind: InsightKind::Trend,
            });
        }
        Ok(InsightResponse::Structured(insights))
    }
}
