use anyhow::ensure;
use reqwest::Method;

use super::checks::ResponseTime;
use super::produtos::create_tracked;
use crate::api::types::{Product, MSG_DELETED, MSG_PRODUCT_NOT_FOUND};
use crate::credentials::Role;
use crate::data;
use crate::runner::{expect, CaseFuture, Category, Fixture, Priority, SpecDef, SuiteDef};

pub fn spec() -> SpecDef {
    SpecDef::new("smoke", "Smoke")
        .description("Reachability and the end-to-end product lifecycle")
        .category(Category::Integration)
        .priority(Priority::High)
        .tags(&["smoke", "e2e"])
        .suite(
            SuiteDef::new("Disponibilidade")
                .case(
                    "[GET] /produtos responds within budget",
                    ResponseTime::new(Method::GET, "produtos"),
                )
                .case(
                    "[GET] /usuarios responds within budget",
                    ResponseTime::new(Method::GET, "usuarios"),
                ),
        )
        .suite(
            SuiteDef::new("Ciclo de vida do produto")
                .case("provisions credentials and logs in", session_login)
                .case("creates, reads and deletes a product", product_lifecycle),
        )
}

fn session_login(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let session = fx.session().await?;
        ensure!(session.privileged.is_privileged, "admin credential is not privileged");
        ensure!(!session.standard.is_privileged, "standard credential is privileged");

        let token = fx.login(Role::User).await?;
        ensure!(token.starts_with("Bearer "), "unexpected token {:?}", token);
        Ok(())
    })
}

fn product_lifecycle(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let product = data::product();

        // Only administrators may create products
        fx.login(Role::User).await?;
        let res = fx.api.create("produtos", &product).await?;
        expect::status(&res, 403)?;

        fx.login(Role::Admin).await?;
        let id = create_tracked(fx, &product).await?;
        let endpoint = format!("produtos/{}", id);

        let res = fx.api.read(&endpoint).await?;
        expect::status(&res, 200)?;
        let stored: Product = res.json()?;
        ensure!(
            stored.matches(&product),
            "stored product {:?} differs from {:?}",
            stored,
            product
        );

        let res = fx.api.delete(&endpoint).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_DELETED)?;
        fx.untrack(&endpoint);

        let res = fx.api.read(&endpoint).await?;
        expect::status(&res, 400)?;
        expect::message(&res, MSG_PRODUCT_NOT_FOUND)
    })
}
