//! Specs run against the service

pub mod carrinhos;
pub mod checks;
pub mod login;
pub mod produtos;
pub mod smoke;
pub mod usuarios;

use crate::runner::SpecDef;

/// Every spec known to the runner
pub fn catalog() -> Vec<SpecDef> {
    vec![
        smoke::spec(),
        login::spec(),
        usuarios::spec(),
        produtos::spec(),
        carrinhos::spec(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let specs = catalog();
        let names: HashSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), specs.len());
        assert!(specs.iter().all(|s| s.test_count() > 0));
    }
}
