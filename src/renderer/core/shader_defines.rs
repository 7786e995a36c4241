//! Shader Variant Keys
//!
//! Programs are compiled once per distinct combination of boolean/enum flags.
//! [`ShaderDefines`] is the canonical, order-independent description of such a
//! combination, and its [`compilation_hash`](ShaderDefines::compilation_hash)
//! is what shader services key their variant caches on.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut defines = ShaderDefines::new();
//! defines.set_flag("hasShadowMap", true);
//!
//! // Fast hash for program cache lookup
//! let hash = defines.compilation_hash();
//! ```

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;

/// Value of a single shader define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefineValue {
    Bool(bool),
    Int(i32),
}

/// A sorted set of shader defines.
///
/// Internally an ordered `SmallVec<(key, value)>`, so identical define sets
/// produce identical hashes regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    defines: SmallVec<[(Cow<'static, str>, DefineValue); 4]>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a define (maintains sorted order).
    ///
    /// If key exists, updates its value; otherwise inserts new entry.
    pub fn set(&mut self, key: impl Into<Cow<'static, str>>, value: DefineValue) {
        let key = key.into();
        match self.defines.binary_search_by(|(k, _)| k.as_ref().cmp(key.as_ref())) {
            Ok(idx) => self.defines[idx].1 = value,
            Err(idx) => self.defines.insert(idx, (key, value)),
        }
    }

    #[inline]
    pub fn set_flag(&mut self, key: impl Into<Cow<'static, str>>, enabled: bool) {
        self.set(key, DefineValue::Bool(enabled));
    }

    /// Builder form of [`set_flag`](Self::set_flag).
    #[must_use]
    pub fn with_flag(mut self, key: impl Into<Cow<'static, str>>, enabled: bool) -> Self {
        self.set_flag(key, enabled);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<DefineValue> {
        self.defines
            .binary_search_by(|(k, _)| k.as_ref().cmp(key))
            .ok()
            .map(|idx| self.defines[idx].1)
    }

    /// Returns `true` only for a define explicitly set to `Bool(true)`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(DefineValue::Bool(true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DefineValue)> {
        self.defines.iter().map(|(k, v)| (k.as_ref(), *v))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Hash identifying this variant for program cache lookup.
    #[must_use]
    pub fn compilation_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for (key, value) in &self.defines {
            key.as_ref().hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}
