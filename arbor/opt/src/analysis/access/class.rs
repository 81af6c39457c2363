use super::extract::{list_str, Access};
use arbor_ir::{ArborResult, Error};

/// A set of accesses believed to denote the same memory location.
///
/// Classes belong to one [super::AccessManager] and are identified by the
/// manager and a sequential id.
#[derive(Debug)]
pub struct AccessClass {
    manager: u32,
    id: usize,
    accesses: Vec<Access>,
}

impl AccessClass {
    pub(super) fn new(manager: u32, id: usize) -> Self {
        Self {
            manager,
            id,
            accesses: vec![],
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    pub fn contains(&self, access: &Access) -> bool {
        self.accesses.contains(access)
    }

    pub fn len(&self) -> usize {
        self.accesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    /// # Panics
    /// Panics if `access` is already a member.
    pub fn store_access(&mut self, access: Access) {
        self.try_store_access(access)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_store_access(&mut self, access: Access) -> ArborResult<()> {
        if self.contains(&access) {
            return Err(Error::misc(format!(
                "{access} is already a member of class {}",
                self.id
            )));
        }
        self.accesses.push(access);
        Ok(())
    }
}

impl PartialEq for AccessClass {
    fn eq(&self, other: &Self) -> bool {
        self.manager == other.manager && self.id == other.id
    }
}

impl Eq for AccessClass {}

impl std::fmt::Display for AccessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "class {}: {{{}}}", self.id, list_str(&self.accesses))
    }
}
