//! Role to permission table

use crate::domain::Role;
use serde::{Deserialize, Serialize};

/// Operation a role may be allowed to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ReadOrganization,
    WriteOrganization,
    DeleteOrganization,
    ReadPatient,
    WritePatient,
    DeletePatient,
    ReadStudy,
    WriteStudy,
    DeleteStudy,
    ReadSurvey,
    WriteSurvey,
    DeleteSurvey,
    ReadVisit,
    WriteVisit,
    DeleteVisit,
    RecordExamination,
    ReadUser,
    WriteUser,
    DeleteUser,
    ReadAudit,
    ExportAudit,
    RunRetention,
    ReadReports,
}

use Permission::*;

const SUPER_ADMIN: &[Permission] = &[
    ReadOrganization,
    WriteOrganization,
    DeleteOrganization,
    ReadPatient,
    WritePatient,
    DeletePatient,
    ReadStudy,
    WriteStudy,
    DeleteStudy,
    ReadSurvey,
    WriteSurvey,
    DeleteSurvey,
    ReadVisit,
    WriteVisit,
    DeleteVisit,
    RecordExamination,
    ReadUser,
    WriteUser,
    DeleteUser,
    ReadAudit,
    ExportAudit,
    RunRetention,
    ReadReports,
];

const ORG_ADMIN: &[Permission] = &[
    ReadOrganization,
    WriteOrganization,
    ReadPatient,
    WritePatient,
    DeletePatient,
    ReadStudy,
    ReadSurvey,
    WriteSurvey,
    ReadVisit,
    WriteVisit,
    RecordExamination,
    ReadUser,
    WriteUser,
    DeleteUser,
    ReadAudit,
    ExportAudit,
    ReadReports,
];

const INVESTIGATOR: &[Permission] = &[
    ReadOrganization,
    ReadPatient,
    WritePatient,
    ReadStudy,
    ReadSurvey,
    WriteSurvey,
    ReadVisit,
    WriteVisit,
    RecordExamination,
    ReadUser,
    ReadReports,
];

const COORDINATOR: &[Permission] = &[
    ReadOrganization,
    ReadPatient,
    WritePatient,
    ReadStudy,
    ReadSurvey,
    WriteSurvey,
    ReadVisit,
    WriteVisit,
    RecordExamination,
    ReadReports,
];

const CLINICIAN: &[Permission] = &[
    ReadOrganization,
    ReadPatient,
    ReadStudy,
    ReadSurvey,
    ReadVisit,
    WriteVisit,
    RecordExamination,
];

const MONITOR: &[Permission] = &[
    ReadOrganization,
    ReadPatient,
    ReadStudy,
    ReadSurvey,
    ReadVisit,
    ReadAudit,
    ReadReports,
];

const VIEWER: &[Permission] = &[
    ReadOrganization,
    ReadPatient,
    ReadStudy,
    ReadSurvey,
    ReadVisit,
];

impl Role {
    /// Permissions granted to the role
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN,
            Role::OrgAdmin => ORG_ADMIN,
            Role::Investigator => INVESTIGATOR,
            Role::Coordinator => COORDINATOR,
            Role::Clinician => CLINICIAN,
            Role::Monitor => MONITOR,
            Role::Viewer => VIEWER,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_has_everything() {
        for role in Role::ALL {
            for permission in role.permissions() {
                assert!(Role::SuperAdmin.has_permission(*permission));
            }
        }
    }

    #[test]
    fn test_retention_is_super_admin_only() {
        for role in Role::ALL {
            assert_eq!(
                role.has_permission(RunRetention),
                role == Role::SuperAdmin,
                "{role}"
            );
        }
    }

    #[test]
    fn test_every_role_can_read_patients() {
        assert!(Role::ALL.iter().all(|r| r.has_permission(ReadPatient)));
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert!(!Role::Viewer.has_permission(WriteVisit));
        assert!(!Role::Viewer.has_permission(ReadAudit));
        assert!(Role::Monitor.has_permission(ReadAudit));
        assert!(!Role::Monitor.has_permission(WritePatient));
    }
}
