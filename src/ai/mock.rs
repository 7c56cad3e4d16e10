//! Deterministic backend for tests and offline development. Maps question
//! keywords to canned SQL so the rest of the pipeline can run without any
//! model or agent reachable.

use async_trait::async_trait;

use crate::ai::{ExplainRequest, Generation, GenerationRequest, ProviderError, SqlBackend};

pub struct MockBackend {
    name: String,
    fail: bool,
    fail_explain: bool,
    scripted: Option<Generation>,
}

impl MockBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            fail_explain: false,
            scripted: None,
        }
    }

    /// A backend whose every call fails, for exercising fallback paths.
    pub fn unreachable(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// A backend that answers every generation with the given SQL.
    pub fn scripted(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            scripted: Some(Generation {
                sql: sql.into(),
                explanation: "Scripted response.".to_string(),
            }),
            ..Self::new(name)
        }
    }

    /// A backend that generates SQL but cannot explain results.
    pub fn without_explanations(name: impl Into<String>) -> Self {
        Self {
            fail_explain: true,
            ..Self::new(name)
        }
    }

    fn canned(question: &str) -> Generation {
        let lowered = question.to_lowercase();
        let (sql, explanation) = if lowered.contains("customer") {
            (
                "SELECT * FROM customers",
                "Lists every customer on record.",
            )
        } else if lowered.contains("order") {
            (
                "SELECT * FROM orders ORDER BY order_date DESC",
                "Lists orders, newest first.",
            )
        } else if lowered.contains("product") {
            (
                "SELECT * FROM products ORDER BY price DESC",
                "Lists products from most to least expensive.",
            )
        } else {
            (
                "SELECT table_name FROM information_schema.tables",
                "Lists the tables available in the database.",
            )
        };

        Generation {
            sql: sql.to_string(),
            explanation: explanation.to_string(),
        }
    }
}

#[async_trait]
impl SqlBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_sql(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<Generation, ProviderError> {
        if self.fail {
            return Err(ProviderError::Connection(format!(
                "{} is unreachable",
                self.name
            )));
        }
        if let Some(scripted) = &self.scripted {
            return Ok(scripted.clone());
        }
        Ok(Self::canned(request.question))
    }

    async fn explain_results(
        &self,
        request: &ExplainRequest<'_>,
    ) -> Result<String, ProviderError> {
        if self.fail || self.fail_explain {
            return Err(ProviderError::Connection(format!(
                "{} is unreachable",
                self.name
            )));
        }
        Ok(format!(
            "The query returned {} rows matching your question.",
            request.rows.len()
        ))
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        if self.fail {
            return Err(ProviderError::Connection(format!(
                "{} is unreachable",
                self.name
            )));
        }
        Ok(())
    }
}
