//! Org-dimension facts - read-only input to the scope resolver.

use uuid::Uuid;

/// The org-dimension ids a user is assigned to, grouped by dimension.
/// Owned by the org collaborator; this core only reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgAssignments {
    pub division_ids: Vec<Uuid>,
    pub department_ids: Vec<Uuid>,
    pub location_ids: Vec<Uuid>,
}

impl OrgAssignments {
    pub fn is_empty(&self) -> bool {
        self.division_ids.is_empty()
            && self.department_ids.is_empty()
            && self.location_ids.is_empty()
    }
}
