//! Deterministic cache keys.
//!
//! A key is the MD5 digest of a canonical rendering of the call site scope,
//! its positional arguments in order, and its named arguments sorted by
//! name. The rendering is plain `Display` output, so the digest is stable
//! across processes and across argument reordering of named parameters.
//! Request-scoped objects (clients, sessions) must never be rendered into a
//! key; callers pass identifying data only.

use {
    md5::{Digest, Md5},
    std::fmt::{self, Display},
};

#[derive(Clone, Debug)]
pub struct Key {
    scope: &'static str,
    args: Vec<String>,
    kwargs: Vec<(&'static str, String)>,
}

impl Key {
    /// `scope` identifies the memoized operation, conventionally
    /// `"<crate>::<function>"`.
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    pub fn arg(mut self, value: &impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn kwarg(mut self, name: &'static str, value: &impl Display) -> Self {
        self.kwargs.push((name, value.to_string()));
        self
    }

    /// Named argument that participates only when present.
    pub fn kwarg_opt(self, name: &'static str, value: Option<&impl Display>) -> Self {
        match value {
            Some(value) => self.kwarg(name, value),
            None => self,
        }
    }

    fn canonical(&self) -> String {
        let mut kwargs = self.kwargs.clone();
        kwargs.sort_by_key(|(name, _)| *name);
        let kwargs = kwargs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({}){{{kwargs}}}", self.scope, self.args.join(","))
    }

    /// Hex MD5 of the canonical rendering.
    pub fn digest(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kwarg_order_does_not_matter() {
        let ab = Key::new("engine::price")
            .arg(&1u64)
            .kwarg("buy", &"0xaa")
            .kwarg("sell", &"0xbb");
        let ba = Key::new("engine::price")
            .arg(&1u64)
            .kwarg("sell", &"0xbb")
            .kwarg("buy", &"0xaa");
        assert_eq!(ab.digest(), ba.digest());
    }

    #[test]
    fn positional_order_matters() {
        let ab = Key::new("engine::price").arg(&"a").arg(&"b");
        let ba = Key::new("engine::price").arg(&"b").arg(&"a");
        assert_ne!(ab.digest(), ba.digest());
    }

    #[test]
    fn absent_optionals_change_the_key() {
        let with = Key::new("engine::price").kwarg_opt("taker", Some(&"0xcc"));
        let without = Key::new("engine::price").kwarg_opt("taker", None::<&String>);
        assert_ne!(with.digest(), without.digest());
    }

    #[test]
    fn digest_is_stable() {
        let key = Key::new("gas::base").arg(&1u64).kwarg("taker", &"0xabc");
        assert_eq!(key.canonical(), "gas::base(1){taker=0xabc}");
        assert_eq!(key.digest(), key.digest());
        assert_eq!(key.digest().len(), 32);
    }
}
