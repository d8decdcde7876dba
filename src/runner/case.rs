use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::fixture::Fixture;

/// Future returned by a test function
pub type CaseFuture<'a> = BoxFuture<'a, Result<()>>;

/// Anything that can run as a test body or a before-each hook
#[async_trait]
pub trait TestBody: Send + Sync {
    async fn run(&self, fx: &mut Fixture) -> Result<()>;
}

#[async_trait]
impl<F> TestBody for F
where
    F: for<'a> Fn(&'a mut Fixture) -> CaseFuture<'a> + Send + Sync,
{
    async fn run(&self, fx: &mut Fixture) -> Result<()> {
        (self)(fx).await
    }
}

/// Returned from a test body to mark the test pending instead of failed
#[derive(Debug, thiserror::Error)]
#[error("skipped: {0}")]
pub struct Skipped(pub String);

pub fn skip(reason: impl Into<String>) -> anyhow::Error {
    Skipped(reason.into()).into()
}

#[derive(Clone)]
pub struct TestCase {
    pub title: String,
    pub body: Arc<dyn TestBody>,
}

#[derive(Clone, Default)]
pub struct SuiteDef {
    pub title: String,
    pub before_each: Option<Arc<dyn TestBody>>,
    pub cases: Vec<TestCase>,
    pub children: Vec<SuiteDef>,
}

impl SuiteDef {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn before_each(mut self, hook: impl TestBody + 'static) -> Self {
        self.before_each = Some(Arc::new(hook));
        self
    }

    pub fn case(mut self, title: &str, body: impl TestBody + 'static) -> Self {
        self.cases.push(TestCase {
            title: title.to_string(),
            body: Arc::new(body),
        });
        self
    }

    pub fn child(mut self, suite: SuiteDef) -> Self {
        self.children.push(suite);
        self
    }

    pub fn test_count(&self) -> usize {
        self.cases.len() + self.children.iter().map(SuiteDef::test_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Api,
    Integration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Api => f.write_str("api"),
            Category::Integration => f.write_str("integration"),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Medium => f.write_str("medium"),
            Priority::Low => f.write_str("low"),
        }
    }
}

/// A named group of suites written to one result file
#[derive(Clone)]
pub struct SpecDef {
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub suites: Vec<SuiteDef>,
}

impl SpecDef {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            description: String::new(),
            category: Category::Api,
            priority: Priority::Medium,
            tags: Vec::new(),
            suites: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn suite(mut self, suite: SuiteDef) -> Self {
        self.suites.push(suite);
        self
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(SuiteDef::test_count).sum()
    }

    /// True when every required tag is present
    pub fn has_tags(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|r| self.tags.iter().any(|t| t.eq_ignore_ascii_case(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_fx: &mut Fixture) -> CaseFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_counts_nested_cases() {
        let spec = SpecDef::new("x", "X").suite(
            SuiteDef::new("outer")
                .case("a", noop)
                .child(SuiteDef::new("inner").case("b", noop).case("c", noop)),
        );
        assert_eq!(spec.test_count(), 3);
    }

    #[test]
    fn test_tag_matching() {
        let spec = SpecDef::new("x", "X").tags(&["smoke", "Produtos"]);
        assert!(spec.has_tags(&[]));
        assert!(spec.has_tags(&["produtos".to_string()]));
        assert!(!spec.has_tags(&["smoke".to_string(), "carrinhos".to_string()]));
    }

    #[test]
    fn test_skipped_is_detectable() {
        let err = skip("no product");
        assert!(err.downcast_ref::<Skipped>().is_some());
        assert_eq!(err.to_string(), "skipped: no product");
    }
}
