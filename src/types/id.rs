// ABOUTME: Phantom-typed cloud identifiers for compile-time type safety.
// ABOUTME: Keeps VM, disk, and stemcell CIDs returned by the CPI from being mixed up.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
pub enum VmMarker {}
pub enum DiskMarker {}
pub enum StemcellMarker {}

/// An identifier assigned by the cloud (a "CID").
///
/// The phantom parameter means a `DiskCid` can't be handed to a call that
/// expects a `VmCid`, even though both are opaque strings on the wire.
#[must_use = "CIDs reference cloud resources and should not be ignored"]
pub struct Cid<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Cid<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// T is only a marker, so none of these impls may require bounds on it.

impl<T> std::fmt::Debug for Cid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Cid").field(&self.value).finish()
    }
}

impl<T> Clone for Cid<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Cid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Cid<T> {}

impl<T> Hash for Cid<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Cid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Cid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Cid<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

pub type VmCid = Cid<VmMarker>;
pub type DiskCid = Cid<DiskMarker>;
pub type StemcellCid = Cid<StemcellMarker>;
