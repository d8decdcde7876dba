use anyhow::{Context, Result};
use serde_json::Value;

use super::produtos::create_tracked;
use crate::api::types::{CartItem, NewCart, MSG_CREATED, MSG_PURCHASE_CANCELLED};
use crate::credentials::Role;
use crate::data;
use crate::runner::{expect, CaseFuture, Fixture, Priority, SpecDef, SuiteDef};

const CANCEL_PURCHASE: &str = "carrinhos/cancelar-compra";

pub fn spec() -> SpecDef {
    SpecDef::new("carrinhos", "Carrinhos API")
        .description("Cart lifecycle: add products, list carts, cancel the purchase")
        .priority(Priority::Low)
        .tags(&["api", "carrinhos", "regression"])
        .suite(
            SuiteDef::new("Ciclo de vida do carrinho")
                .before_each(fresh_cart)
                .case("[POST] adds products to the cart", add_to_cart)
                .case("[GET] lists carts", list_carts)
                .case("[DELETE] cancels the purchase", cancel_purchase),
        )
}

/// Log in as admin and drop any cart left by an earlier test; a user may hold only one
fn fresh_cart(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        fx.login(Role::Admin).await?;
        let res = fx.api.delete(CANCEL_PURCHASE).await?;
        log::debug!("Cart reset returned {}", res.status);
        Ok(())
    })
}

/// Create a product and a cart holding `quantity` of it; returns the cart id
async fn cart_with_new_product(fx: &mut Fixture, quantity: u32) -> Result<String> {
    let product_id = create_tracked(fx, &data::product()).await?;

    let cart = NewCart {
        produtos: vec![CartItem {
            id_produto: product_id,
            quantidade: quantity,
        }],
    };
    let res = fx.api.create("carrinhos", &cart).await?;
    expect::status(&res, 201)?;
    expect::message(&res, MSG_CREATED)?;
    // Registered after the product so the cart is cancelled before the product is deleted
    fx.track(CANCEL_PURCHASE, Role::Admin);

    res.str_field("_id")
        .map(str::to_string)
        .context("cart created without an _id")
}

fn add_to_cart(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        cart_with_new_product(fx, 2).await?;
        Ok(())
    })
}

fn list_carts(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let cart_id = cart_with_new_product(fx, 1).await?;

        let res = fx.api.list("carrinhos", &[]).await?;
        expect::status(&res, 200)?;
        let carts = res
            .field("carrinhos")
            .and_then(Value::as_array)
            .context("carrinhos is not an array")?;
        anyhow::ensure!(
            carts
                .iter()
                .any(|c| c.get("_id").and_then(Value::as_str) == Some(cart_id.as_str())),
            "cart {} missing from listing",
            cart_id
        );
        Ok(())
    })
}

fn cancel_purchase(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        cart_with_new_product(fx, 1).await?;

        let res = fx.api.delete(CANCEL_PURCHASE).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_PURCHASE_CANCELLED)?;
        fx.untrack(CANCEL_PURCHASE);
        Ok(())
    })
}
