use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fragment of the message returned when an e-mail is already registered
pub const DUPLICATE_EMAIL_MARKER: &str = "E-mail já está sendo usado";

/// Matches both "E-mail já está sendo usado" and "Este email já está sendo usado"
pub fn is_duplicate_email_message(message: &str) -> bool {
    let normalized = message.to_lowercase().replace("e-mail", "email");
    normalized.contains(&DUPLICATE_EMAIL_MARKER.to_lowercase().replace("e-mail", "email"))
}

pub const MSG_CREATED: &str = "Cadastro realizado com sucesso";
pub const MSG_UPDATED: &str = "Registro alterado com sucesso";
pub const MSG_DELETED: &str = "Registro excluído com sucesso";
pub const MSG_LOGIN_OK: &str = "Login realizado com sucesso";
pub const MSG_LOGIN_INVALID: &str = "Email e/ou senha inválidos";
pub const MSG_PRODUCT_NOT_FOUND: &str = "Produto não encontrado";
pub const MSG_USER_NOT_FOUND: &str = "Usuário não encontrado";
pub const MSG_PURCHASE_CANCELLED: &str =
    "Registro excluído com sucesso. Estoque dos produtos reabastecido";

/// Body of `POST /usuarios`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub nome: String,
    pub email: String,
    pub password: String,
    /// The service expects the strings "true" / "false"
    pub administrador: String,
}

impl NewUser {
    pub fn is_admin(&self) -> bool {
        self.administrador == "true"
    }
}

/// Body of `POST /login`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `201` body of every create endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedResource {
    #[serde(rename = "_id")]
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProduct {
    pub nome: String,
    pub preco: u32,
    pub descricao: String,
    pub quantidade: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub nome: String,
    pub preco: u32,
    pub descricao: String,
    pub quantidade: u32,
}

impl Product {
    pub fn matches(&self, expected: &NewProduct) -> bool {
        self.nome == expected.nome
            && self.preco == expected.preco
            && self.descricao == expected.descricao
            && self.quantidade == expected.quantidade
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id_produto: String,
    pub quantidade: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCart {
    pub produtos: Vec<CartItem>,
}

/// Classified outcome of `POST /usuarios`
#[derive(Debug, Clone, PartialEq)]
pub enum CreateUserOutcome {
    Created(CreatedResource),
    DuplicateEmail { message: String },
    Rejected { status: u16, body: String },
}

impl CreateUserOutcome {
    pub fn from_response(status: u16, body: &Value) -> Self {
        if status == 201 {
            if let Ok(created) = serde_json::from_value::<CreatedResource>(body.clone()) {
                return CreateUserOutcome::Created(created);
            }
        }

        if status == 400 {
            let duplicate = body
                .get("message")
                .and_then(|m| m.as_str())
                .filter(|m| is_duplicate_email_message(m));
            if let Some(message) = duplicate {
                return CreateUserOutcome::DuplicateEmail {
                    message: message.to_string(),
                };
            }
        }

        CreateUserOutcome::Rejected {
            status,
            body: body.to_string(),
        }
    }
}

/// Classified outcome of `POST /login`
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authorized { authorization: String },
    Denied { status: u16, body: String },
}

impl LoginOutcome {
    pub fn from_response(status: u16, body: &Value) -> Self {
        let token = body
            .get("authorization")
            .and_then(|a| a.as_str())
            .filter(|a| !a.is_empty());

        match (status, token) {
            (200, Some(token)) => LoginOutcome::Authorized {
                authorization: token.to_string(),
            },
            _ => LoginOutcome::Denied {
                status,
                body: body.to_string(),
            },
        }
    }
}
