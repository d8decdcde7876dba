//! Assertions over API responses

use anyhow::{ensure, Result};
use serde_json::Value;
use std::time::Duration;

use crate::api::ApiResponse;

pub fn status(res: &ApiResponse, expected: u16) -> Result<()> {
    ensure!(
        res.status == expected,
        "{} {}: expected status {}, got {} with body {}",
        res.method,
        res.url,
        expected,
        res.status,
        res.body
    );
    Ok(())
}

pub fn status_in(res: &ApiResponse, expected: &[u16]) -> Result<()> {
    ensure!(
        expected.contains(&res.status),
        "{} {}: expected status in {:?}, got {} with body {}",
        res.method,
        res.url,
        expected,
        res.status,
        res.body
    );
    Ok(())
}

pub fn message(res: &ApiResponse, expected: &str) -> Result<()> {
    ensure!(
        res.message() == expected,
        "{} {}: expected message {:?}, got {:?}",
        res.method,
        res.url,
        expected,
        res.message()
    );
    Ok(())
}

pub fn message_contains(res: &ApiResponse, fragment: &str) -> Result<()> {
    ensure!(
        res.message().contains(fragment),
        "{} {}: expected message containing {:?}, got {:?}",
        res.method,
        res.url,
        fragment,
        res.message()
    );
    Ok(())
}

pub fn field_eq(res: &ApiResponse, field: &str, expected: &Value) -> Result<()> {
    let actual = res.field(field).unwrap_or(&Value::Null);
    ensure!(
        actual == expected,
        "{} {}: expected {} = {}, got {}",
        res.method,
        res.url,
        field,
        expected,
        actual
    );
    Ok(())
}

pub fn has_field(res: &ApiResponse, field: &str) -> Result<()> {
    ensure!(
        res.field(field).is_some(),
        "{} {}: missing field {} in {}",
        res.method,
        res.url,
        field,
        res.body
    );
    Ok(())
}

pub fn within(res: &ApiResponse, budget: Duration) -> Result<()> {
    ensure!(
        u128::from(res.duration_ms) <= budget.as_millis(),
        "{} {}: took {}ms, budget is {}ms",
        res.method,
        res.url,
        res.duration_ms,
        budget.as_millis()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse {
            method: "POST".to_string(),
            url: "http://localhost/produtos".to_string(),
            status,
            body,
            duration_ms: 120,
        }
    }

    #[test]
    fn test_status_assertions() {
        let res = response(403, json!({"message": "Rota exclusiva para administradores"}));
        assert!(status(&res, 403).is_ok());
        assert!(status_in(&res, &[401, 403]).is_ok());

        let err = status(&res, 201).unwrap_err().to_string();
        assert!(err.contains("expected status 201, got 403"));
    }

    #[test]
    fn test_body_assertions() {
        let res = response(201, json!({"_id": "abc", "message": "Cadastro realizado com sucesso"}));
        assert!(message(&res, "Cadastro realizado com sucesso").is_ok());
        assert!(message_contains(&res, "realizado").is_ok());
        assert!(field_eq(&res, "_id", &json!("abc")).is_ok());
        assert!(field_eq(&res, "nome", &json!("x")).is_err());
        assert!(has_field(&res, "_id").is_ok());
        assert!(within(&res, Duration::from_millis(100)).is_err());
        assert!(within(&res, Duration::from_millis(120)).is_ok());
    }
}
