// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;

/// A typed key into [`ResilienceProperties`].
///
/// The key carries the type of its value, so reads never need a downcast at the call site.
///
/// ```
/// use airbag::{ResilienceContext, ResiliencePropertyKey};
///
/// const REQUEST_ID: ResiliencePropertyKey<u64> = ResiliencePropertyKey::new("request-id");
///
/// let mut context = ResilienceContext::new();
/// context.properties_mut().set(&REQUEST_ID, 42);
///
/// assert_eq!(context.properties().get(&REQUEST_ID), Some(&42));
/// ```
pub struct ResiliencePropertyKey<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> ResiliencePropertyKey<T> {
    /// Creates a new key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, _value: PhantomData }
    }

    /// Returns the key name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Debug for ResiliencePropertyKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResiliencePropertyKey").field(&self.name).finish()
    }
}

impl<T> Clone for ResiliencePropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ResiliencePropertyKey<T> {}

/// A string keyed bag of values owned by a single execution.
///
/// Values are stored type-erased; a read through a key of the wrong type returns `None`.
#[derive(Default)]
pub struct ResilienceProperties {
    values: HashMap<Cow<'static, str>, Box<dyn Any + Send + Sync>>,
}

impl Debug for ResilienceProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

impl ResilienceProperties {
    /// Sets the value for `key`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &ResiliencePropertyKey<T>, value: T) {
        self.values.insert(Cow::Borrowed(key.name), Box::new(value));
    }

    /// Returns the value for `key` if it is present and has the key's type.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &ResiliencePropertyKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|v| v.downcast_ref())
    }

    /// Returns a mutable reference to the value for `key`.
    #[must_use]
    pub fn get_mut<T: 'static>(&mut self, key: &ResiliencePropertyKey<T>) -> Option<&mut T> {
        self.values.get_mut(key.name).and_then(|v| v.downcast_mut())
    }

    /// Removes and returns the value for `key`.
    pub fn remove<T: 'static>(&mut self, key: &ResiliencePropertyKey<T>) -> Option<T> {
        let value = self.values.remove(key.name)?;
        value.downcast().ok().map(|v| *v)
    }

    /// Returns `true` if a value of any type is stored under `key`'s name.
    #[must_use]
    pub fn contains<T>(&self, key: &ResiliencePropertyKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Removes all values but keeps the allocated capacity.
    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}
