//! Reusable checks shared by several specs

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::api::Auth;
use crate::data;
use crate::runner::{expect, Fixture, TestBody};

/// A mutating route must answer 401 when the token is missing or invalid
pub struct RequiresAuth {
    method: Method,
    endpoint: String,
    auth: Auth,
}

impl RequiresAuth {
    pub fn without_token(method: Method, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            auth: Auth::None,
        }
    }

    pub fn with_invalid_token(method: Method, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            auth: Auth::Raw("Bearer invalid-token".to_string()),
        }
    }
}

#[async_trait]
impl TestBody for RequiresAuth {
    async fn run(&self, fx: &mut Fixture) -> Result<()> {
        let body = if self.method == Method::POST || self.method == Method::PUT {
            Some(serde_json::to_value(data::product())?)
        } else {
            None
        };

        let res = fx
            .api
            .send(
                self.method.clone(),
                &self.endpoint,
                &[],
                body.as_ref(),
                self.auth.clone(),
            )
            .await?;
        expect::status(&res, 401)
    }
}

/// `GET <endpoint>` returns `{ quantidade, <key>: [...] }` with a matching count
pub struct ListingConsistency {
    endpoint: String,
    key: String,
}

impl ListingConsistency {
    pub fn new(endpoint: &str, key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl TestBody for ListingConsistency {
    async fn run(&self, fx: &mut Fixture) -> Result<()> {
        let res = fx.api.list(&self.endpoint, &[]).await?;
        expect::status(&res, 200)?;
        expect::has_field(&res, "quantidade")?;

        let items = listed_items(&res.body, &self.key)?;
        let count = res
            .field("quantidade")
            .and_then(Value::as_u64)
            .context("quantidade is not a number")?;
        ensure!(
            count == items.len() as u64,
            "quantidade is {} but {} {} were listed",
            count,
            items.len(),
            self.key
        );
        Ok(())
    }
}

/// Query-string filter whose results must all satisfy `predicate`
pub struct Search {
    endpoint: String,
    key: String,
    query: Vec<(&'static str, String)>,
    predicate: fn(&Value) -> bool,
}

impl Search {
    pub fn new(
        endpoint: &str,
        key: &str,
        query: &[(&'static str, &str)],
        predicate: fn(&Value) -> bool,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            key: key.to_string(),
            query: query.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            predicate,
        }
    }
}

#[async_trait]
impl TestBody for Search {
    async fn run(&self, fx: &mut Fixture) -> Result<()> {
        let res = fx.api.list(&self.endpoint, &self.query).await?;
        expect::status(&res, 200)?;

        for item in listed_items(&res.body, &self.key)? {
            ensure!(
                (self.predicate)(item),
                "{} does not match filter {:?}",
                item,
                self.query
            );
        }
        Ok(())
    }
}

/// A single request must complete within the budget (`performanceBudgetMs` when unset)
pub struct ResponseTime {
    method: Method,
    endpoint: String,
    budget: Option<Duration>,
}

impl ResponseTime {
    pub fn new(method: Method, endpoint: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.to_string(),
            budget: None,
        }
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

#[async_trait]
impl TestBody for ResponseTime {
    async fn run(&self, fx: &mut Fixture) -> Result<()> {
        let budget = self
            .budget
            .unwrap_or_else(|| Duration::from_millis(fx.config().performance_budget_ms));
        let res = fx
            .api
            .send(self.method.clone(), &self.endpoint, &[], None, Auth::Stored)
            .await?;
        expect::within(&res, budget)
    }
}

fn listed_items<'a>(body: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    body.get(key)
        .and_then(Value::as_array)
        .with_context(|| format!("Expected an array under '{}' in {}", key, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listed_items() {
        let body = json!({"quantidade": 1, "produtos": [{"nome": "Mouse"}]});
        assert_eq!(listed_items(&body, "produtos").unwrap().len(), 1);
        assert!(listed_items(&body, "usuarios").is_err());
        assert!(listed_items(&json!({"produtos": "x"}), "produtos").is_err());
    }

    #[test]
    fn test_search_keeps_query() {
        fn any(_: &Value) -> bool {
            true
        }
        let search = Search::new("produtos", "produtos", &[("preco", "150")], any);
        assert_eq!(search.query, vec![("preco", "150".to_string())]);
    }
}
