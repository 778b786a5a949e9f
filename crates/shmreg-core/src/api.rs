//! Versioned views over one manager
//!
//! Both generations borrow the same [`SharedMemoryManager`]; they only
//! translate kind filters and result shapes.

use crate::manager::SharedMemoryManager;
use crate::status::RegionStatus;
use crate::storage::MemoryKind;
use crate::Result;
use std::collections::BTreeMap;

/// First-generation surface: operates across both kinds
#[derive(Clone, Copy)]
pub struct V1<'a> {
    manager: &'a SharedMemoryManager,
}

impl<'a> V1<'a> {
    pub(crate) fn new(manager: &'a SharedMemoryManager) -> Self {
        Self { manager }
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.manager.unregister(name, None)
    }

    pub fn unregister_all(&self) -> Result<()> {
        self.manager.unregister_all(None)
    }

    /// Every region (or just `name`) regardless of kind
    pub fn status(&self, name: Option<&str>) -> Result<Vec<RegionStatus>> {
        self.manager.status(name, None)
    }
}

/// Second-generation surface: every call names the kind it targets
#[derive(Clone, Copy)]
pub struct V2<'a> {
    manager: &'a SharedMemoryManager,
}

impl<'a> V2<'a> {
    pub(crate) fn new(manager: &'a SharedMemoryManager) -> Self {
        Self { manager }
    }

    /// Unregister `name` if it is registered as `kind`
    pub fn unregister(&self, name: &str, kind: MemoryKind) -> Result<()> {
        self.manager.unregister(name, Some(kind))
    }

    pub fn unregister_all(&self, kind: MemoryKind) -> Result<()> {
        self.manager.unregister_all(Some(kind))
    }

    pub fn status(&self, name: Option<&str>, kind: MemoryKind) -> Result<Vec<RegionStatus>> {
        self.manager.status(name, Some(kind))
    }

    /// Like [`V2::status`], keyed by region name
    pub fn status_map(
        &self,
        name: Option<&str>,
        kind: MemoryKind,
    ) -> Result<BTreeMap<String, RegionStatus>> {
        Ok(self
            .status(name, kind)?
            .into_iter()
            .map(|status| (status.name.clone(), status))
            .collect())
    }
}
