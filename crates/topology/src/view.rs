//! Point-in-time views of cluster membership

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Address, Member, TopologyError};

/// The set of known members at a point in time
///
/// No two members share an address. Views are immutable; a membership change
/// replaces the whole view.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterView {
    members: Vec<Member>,
}

impl ClusterView {
    /// Create a view, rejecting duplicate addresses
    pub fn new(members: Vec<Member>) -> Result<Self, TopologyError> {
        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            if !seen.insert(*member.address()) {
                return Err(TopologyError::DuplicateMember(*member.address()));
            }
        }

        Ok(Self { members })
    }

    /// View containing only the local node
    pub fn single(local: Address) -> Self {
        Self {
            members: vec![Member::local(local)],
        }
    }

    /// All members, in insertion order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Whether the view has no members at all
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a member with this address exists
    pub fn contains(&self, address: &Address) -> bool {
        self.members.iter().any(|m| m.address() == address)
    }

    /// The record for this process, if present
    pub fn local_member(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.is_local())
    }

    /// Members other than this process
    pub fn remote_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| !m.is_local())
    }
}

impl fmt::Display for ClusterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Members [{}] {{", self.members.len())?;
        for member in &self.members {
            writeln!(f, "\t{member}")?;
        }
        write!(f, "}}")
    }
}

/// Shared handle to the current cluster view
///
/// Owned by the cluster-management side; readers take a snapshot and work on
/// that, so one decision never sees two different views.
#[derive(Clone, Debug, Default)]
pub struct SharedClusterView {
    inner: Arc<RwLock<Arc<ClusterView>>>,
}

impl SharedClusterView {
    /// Create a handle holding `view`
    pub fn new(view: ClusterView) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(view))),
        }
    }

    /// Current view
    pub fn snapshot(&self) -> Arc<ClusterView> {
        self.inner.read().clone()
    }

    /// Replace the current view wholesale
    pub fn replace(&self, view: ClusterView) {
        *self.inner.write() = Arc::new(view);
    }

    /// Build a view from `members` and install it
    pub fn update(&self, members: Vec<Member>) -> Result<(), TopologyError> {
        self.replace(ClusterView::new(members)?);
        Ok(())
    }
}
