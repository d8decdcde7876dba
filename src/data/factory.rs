use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::Password;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::api::types::{NewProduct, NewUser};

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Suffix that keeps names and e-mails unique across runs: `<unix-millis><2 random><2 seq>`
pub fn unique_suffix() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random: u8 = rand::thread_rng().gen_range(0..100);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 100;
    format!("{}{:02}{:02}", millis, random, seq)
}

pub fn user(admin: bool) -> NewUser {
    let suffix = unique_suffix();
    let name: String = Name().fake();
    let secret: String = Password(8..12).fake();

    NewUser {
        nome: format!("{} {}", name, &suffix[suffix.len() - 6..]),
        email: format!("qa.{}@example.com", suffix),
        password: format!("{}1!", secret),
        administrador: admin.to_string(),
    }
}

pub fn product() -> NewProduct {
    let suffix = unique_suffix();
    let brand: String = CompanyName().fake();
    let item: String = Word().fake();
    let mut rng = rand::thread_rng();

    NewProduct {
        nome: format!("{} {} {}", brand, item, suffix),
        preco: rng.gen_range(100..1000),
        descricao: Sentence(3..8).fake(),
        quantidade: rng.gen_range(1..100),
    }
}
