use anyhow::{ensure, Result};
use serde_json::{json, Value};

use super::checks::{ListingConsistency, Search};
use crate::api::types::{
    is_duplicate_email_message, CreatedResource, NewUser, MSG_CREATED, MSG_DELETED,
    MSG_UPDATED, MSG_USER_NOT_FOUND,
};
use crate::credentials::Role;
use crate::data;
use crate::runner::{expect, CaseFuture, Fixture, Priority, SpecDef, SuiteDef};

const USER_ID: &str = "user_id";
const USER: &str = "user";

pub fn spec() -> SpecDef {
    SpecDef::new("usuarios", "Usuarios API")
        .description("User CRUD, duplicate e-mail handling and listing")
        .priority(Priority::Medium)
        .tags(&["api", "usuarios", "regression"])
        .suite(
            SuiteDef::new("Usuarios")
                .case("[POST] creates a user", create_user)
                .case("[GET] reads the created user", read_user)
                .case("[PUT] updates the user", update_user)
                .case("[GET] returns the updated fields", read_user)
                .case("[DELETE] deletes the user", delete_user)
                .case("[GET] no longer finds the deleted user", read_deleted_user)
                .case("[POST] rejects an e-mail already in use", duplicate_email)
                .child(
                    SuiteDef::new("Listagem")
                        .case(
                            "[GET] lists users with a matching count",
                            ListingConsistency::new("usuarios", "usuarios"),
                        )
                        .case(
                            "[GET] filters administrators",
                            Search::new(
                                "usuarios",
                                "usuarios",
                                &[("administrador", "true")],
                                is_admin,
                            ),
                        ),
                ),
        )
}

fn is_admin(user: &Value) -> bool {
    user.get("administrador").and_then(Value::as_str) == Some("true")
}

fn stored_user(fx: &Fixture) -> Result<NewUser> {
    Ok(serde_json::from_str(&fx.require_var(USER)?)?)
}

fn create_user(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let user = data::user(false);
        let res = fx.api.create("usuarios", &user).await?;
        expect::status(&res, 201)?;
        expect::message(&res, MSG_CREATED)?;
        let created: CreatedResource = res.json()?;

        fx.track(&format!("usuarios/{}", created.id), Role::Admin);
        fx.set_var(USER_ID, &created.id);
        fx.set_var(USER, &serde_json::to_string(&user)?);
        Ok(())
    })
}

fn read_user(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(USER_ID)?;
        let user = stored_user(fx)?;

        let res = fx.api.read(&format!("usuarios/{}", id)).await?;
        expect::status(&res, 200)?;
        expect::field_eq(&res, "nome", &json!(user.nome))?;
        expect::field_eq(&res, "email", &json!(user.email))?;
        expect::field_eq(&res, "administrador", &json!(user.administrador))?;
        expect::field_eq(&res, "_id", &json!(id))
    })
}

fn update_user(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(USER_ID)?;
        let updated = data::user(false);

        let res = fx.api.update(&format!("usuarios/{}", id), &updated).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_UPDATED)?;
        fx.set_var(USER, &serde_json::to_string(&updated)?);
        Ok(())
    })
}

fn delete_user(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let endpoint = format!("usuarios/{}", fx.require_var(USER_ID)?);
        let res = fx.api.delete(&endpoint).await?;
        expect::status(&res, 200)?;
        expect::message(&res, MSG_DELETED)?;
        fx.untrack(&endpoint);
        Ok(())
    })
}

fn read_deleted_user(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let id = fx.require_var(USER_ID)?;
        let res = fx.api.read(&format!("usuarios/{}", id)).await?;
        expect::status(&res, 400)?;
        expect::message(&res, MSG_USER_NOT_FOUND)
    })
}

fn duplicate_email(fx: &mut Fixture) -> CaseFuture<'_> {
    Box::pin(async move {
        let user = data::user(false);
        let first = fx.api.create("usuarios", &user).await?;
        expect::status(&first, 201)?;
        let created: CreatedResource = first.json()?;
        fx.track(&format!("usuarios/{}", created.id), Role::Admin);

        let mut again = data::user(false);
        again.email = user.email.clone();
        let res = fx.api.create("usuarios", &again).await?;
        expect::status(&res, 400)?;
        ensure!(
            is_duplicate_email_message(res.message()),
            "expected a duplicate e-mail message, got {:?}",
            res.message()
        );
        Ok(())
    })
}
