use anyhow::{ensure, Result};
use reqwest::Method;
use serde_json::Value;

use super::checks::{ListingConsistency, RequiresAuth, ResponseTime, Search};
use crate::api::types::{
    CreatedResource, NewProduct, Product, MSG_CREATED, MSG_DELETED, MSG_PRODUCT_NOT_FOUND,
    MSG_UPDATED,
};
use crate::credentials::Role;
use crate::data;
use crate::runner::{expect, CaseFuture, Fixture, Priority, SpecDef, SuiteDef};

const PRODUCT_ID: &str = "product_id";
const PRODUCT: &str = "product";

/// Placeholder id for routes that must refuse before looking the product up
const UNKNOWN_ID: &str = "BeeJh5lz3k6kSIzA";

pub fn spec() -> SpecDef {
    let by_id = format!("produtos/{}", UNKNOWN_ID);

    SpecDef::new("produtos", "Produtos API")
        .description("Product CRUD chain, access control, listing, search and response time")
        .priority(Priority::Medium)
        .tags(&["api", "produtos", "regression"])
        .suite(
            SuiteDef::new("Produtos")
                .before_each(login_admin)
                .case("[POST] creates a product", create_product)
                .case("[GET] reads the created product", read_product)
                .case("[PUT] updates the product", update_product)
                .case("[GET] returns the updated fields", read_product)
                .case("[POST] rejects a duplicate product name", duplicate_name)
                .case("[DELETE] deletes the product", delete_product)
                .case("[GET] no longer finds the deleted product", read_deleted_product)
                .child(
                    SuiteDef::new("Controle de acesso")
                        .case(
                            "[POST] /produtos requires a token",
                            RequiresAuth::without_token(Method::POST, "produtos"),
                        )
                        .case(
                            "[POST] /produtos rejects an invalid token",
                            RequiresAuth::with_invalid_token(Method::POST, "produtos"),
                        )
                        .case(
                            "[PUT] /produtos/{id} requires a token",
                            RequiresAuth::without_token(Method::PUT, &by_id),
                        )
                        .case(
                            "[DELETE] /produtos/{id} requires a token",
                            RequiresAuth::without_token(Method::DELETE, &by_id),
                        )
                        .case(
                            "[POST] /produtos is reserved for administrators",
                            standard_user_forbidden,
                        ),
                )
                .child(
                    SuiteDef::new("Listagem e busca")
                        .case(
                            "[GET] lists products with a matching count",
                            ListingConsistency::new("produtos", "produtos"),
                        )
                        .case(
                            "[GET] filters by name",
                            Search::new(
                                "produtos",
                                "produtos",
                                &[("nome", "Logitech MX Vertical")],
                                named_logitech,
                            ),
                        )
                        .case(
                            "[GET] filters by price",
                            Search::new("produtos", "produtos", &[("preco", "150")], priced_150),
                        )
                        .case("[GET] finds a new product by name", search_created),
                )
                .child(
                    SuiteDef::new("Desempenho").case(
                        "[GET] /produtos responds within budget",
                        ResponseTime::new(Method::GET, "produtos"),
                    ),
                ),
        )
}

fn named_logitech(product: &Value) -> bool {
    product
        .get("nome")
        .and_then(Value::as_str)
        .map_or(false, |n| n.contains("Logitech"))
}

fn priced_150(product: &Value) -> bool {
    product.get("preco").and_then(Value::as_u64) == Some(150)
}

fn login_admin(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        fx.login(Role::Admin).await?;
        Ok(())
    })
}

/// Create a product as the current user and register it for cleanup
pub(crate) async fn create_tracked(fx: &mut Fixture, product: &NewProduct) -> Result<String> {
    let res = fx.api.create("produtos", product).await?;
    expect::status(&res, 201)?;
    expect::message(&res, MSG_CREATED)?;
    let created: CreatedResource = res.json()?;
    fx.track(&format!("produtos/{}", created.id), Role::Admin);
    Ok(created.id)
}

fn create_product(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let product = data::product();
        let id = create_tracked(fx, &product).await?;
        fx.set_var(PRODUCT_ID, &id);
        fx.set_var(PRODUCT, &serde_json::to_string(&product)?);
        Ok(())
    })
}

fn read_product(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(PRODUCT_ID)?;
        let expected: NewProduct = serde_json::from_str(&fx.require_var(PRODUCT)?)?;

        let res = fx.api.read(&format!("produtos/{}", id)).await?;
        expect::status(&res, 200)?;
        let product: Product = res.json()?;
        ensure!(product.id == id, "read {} but asked for {}", product.id, id);
        ensure!(
            product.matches(&expected),
            "stored product {:?} differs from {:?}",
            product,
            expected
        );
        Ok(())
    })
}

fn update_product(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(PRODUCT_ID)?;
        let updated = data::product();

        let res = fx.api.update(&format!("produtos/{}", id), &updated).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_UPDATED)?;
        fx.set_var(PRODUCT, &serde_json::to_string(&updated)?);
        Ok(())
    })
}

fn duplicate_name(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let existing: NewProduct = serde_json::from_str(&fx.require_var(PRODUCT)?)?;
        let mut copy = data::product();
        copy.nome = existing.nome;

        let res = fx.api.create("produtos", &copy).await?;
        expect::status(&res, 400)?;
        expect::message_contains(&res, "produto com esse nome")
    })
}

fn delete_product(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let endpoint = format!("produtos/{}", fx.require_var(PRODUCT_ID)?);
        let res = fx.api.delete(&endpoint).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_DELETED)?;
        fx.untrack(&endpoint);
        Ok(())
    })
}

fn read_deleted_product(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(PRODUCT_ID)?;
        let res = fx.api.read(&format!("produtos/{}", id)).await?;
        expect::status(&res, 400)?;
        expect::message(&res, MSG_PRODUCT_NOT_FOUND)
    })
}

fn standard_user_forbidden(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        fx.login(Role::User).await?;
        let res = fx.api.create("produtos", &data::product()).await?;
        expect::status(&res, 403)?;
        expect::message_contains(&res, "administradores")
    })
}

fn search_created(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let product = data::product();
        let id = create_tracked(fx, &product).await?;

        let res = fx
            .api
            .list("produtos", &[("nome", product.nome.clone())])
            .await?;
        expect::status(&res, 200)?;
        let found = res
            .field("produtos")
            .and_then(Value::as_array)
            .map_or(false, |items| {
                items
                    .iter()
                    .any(|p| p.get("_id").and_then(Value::as_str) == Some(id.as_str()))
            });
        ensure!(found, "product {} not returned when searching by its name", id);
        Ok(())
    })
}
