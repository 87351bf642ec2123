//! Compatibility gate consulted at submission time.

use std::collections::HashSet;

/// Answers whether a product may be rendered on an avatar type.
///
/// Implemented by the catalog service in production. Closures of the form
/// `Fn(&str, &str) -> bool` implement it too, which keeps tests terse.
pub trait CompatibilityGate: Send + Sync {
    /// Whether `product_id` fits `avatar_type`.
    fn is_compatible(&self, product_id: &str, avatar_type: &str) -> bool;
}

impl<F> CompatibilityGate for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_compatible(&self, product_id: &str, avatar_type: &str) -> bool {
        self(product_id, avatar_type)
    }
}

/// Accepts every pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

impl CompatibilityGate for AllowAllGate {
    fn is_compatible(&self, _product_id: &str, _avatar_type: &str) -> bool {
        true
    }
}

/// Rejects explicitly listed products, or product/avatar-type pairs.
#[derive(Debug, Clone, Default)]
pub struct DenyListGate {
    products: HashSet<String>,
    pairs: HashSet<(String, String)>,
}

impl DenyListGate {
    /// Empty deny list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a product for every avatar type.
    #[must_use]
    pub fn deny_product(mut self, product_id: impl Into<String>) -> Self {
        self.products.insert(product_id.into());
        self
    }

    /// Reject a product for one avatar type.
    #[must_use]
    pub fn deny_pair(mut self, product_id: impl Into<String>, avatar_type: impl Into<String>) -> Self {
        self.pairs.insert((product_id.into(), avatar_type.into()));
        self
    }
}

impl CompatibilityGate for DenyListGate {
    fn is_compatible(&self, product_id: &str, avatar_type: &str) -> bool {
        if self.products.contains(product_id) {
            return false;
        }
        !self
            .pairs
            .contains(&(product_id.to_owned(), avatar_type.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_list() {
        let gate = DenyListGate::new()
            .deny_product("boots-xl")
            .deny_pair("dress-petite", "tall");
        assert!(!gate.is_compatible("boots-xl", "slim"));
        assert!(!gate.is_compatible("dress-petite", "tall"));
        assert!(gate.is_compatible("dress-petite", "slim"));
        assert!(gate.is_compatible("shirt", "tall"));
    }

    #[test]
    fn test_closure_gate() {
        let gate = |product: &str, _avatar: &str| !product.starts_with("x-");
        assert!(gate.is_compatible("shirt", "slim"));
        assert!(!CompatibilityGate::is_compatible(&gate, "x-coat", "slim"));
    }
}
