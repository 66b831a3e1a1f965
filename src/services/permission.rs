// src/services/permission.rs

use uuid::Uuid;

use crate::models::employee::{Employee, EmployeeRole};

// Flags de autorização derivadas do cadastro do funcionário.
// Todo query de domínio é escopado pelo hospital_id daqui.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet {
    pub is_super_admin: bool,
    pub is_admin: bool,
    pub is_manager: bool,
    pub hospital_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}

// Função pura do papel e do escopo do funcionário: sem efeitos, sem
// falhas. Funcionário ausente = nenhum privilégio, nenhum escopo.
pub fn derive_permissions(employee: Option<&Employee>) -> PermissionSet {
    let Some(employee) = employee else {
        return PermissionSet {
            is_super_admin: false,
            is_admin: false,
            is_manager: false,
            hospital_id: None,
            department_id: None,
        };
    };

    let is_super_admin = employee.role == EmployeeRole::SuperAdmin;
    let is_admin = matches!(
        employee.role,
        EmployeeRole::Admin | EmployeeRole::SuperAdmin
    );
    let is_manager = matches!(
        employee.role,
        EmployeeRole::Manager | EmployeeRole::Admin | EmployeeRole::SuperAdmin
    );

    PermissionSet {
        is_super_admin,
        is_admin,
        is_manager,
        hospital_id: Some(employee.hospital_id),
        department_id: employee.department_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::EmployeeStatus;
    use chrono::Utc;

    fn employee_with_role(role: EmployeeRole) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            name: "Teste".into(),
            email: "teste@hospital.org".into(),
            password_hash: "$2b$teste".into(),
            role,
            status: EmployeeStatus::Active,
            hospital_id: Uuid::new_v4(),
            department_id: Some(Uuid::new_v4()),
            position: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_employee_has_no_privileges_and_no_scope() {
        let set = derive_permissions(None);
        assert!(!set.is_super_admin && !set.is_admin && !set.is_manager);
        assert_eq!(set.hospital_id, None);
        assert_eq!(set.department_id, None);
    }

    #[test]
    fn plain_employee_only_carries_scope() {
        let employee = employee_with_role(EmployeeRole::Employee);
        let set = derive_permissions(Some(&employee));
        assert!(!set.is_manager && !set.is_admin && !set.is_super_admin);
        assert_eq!(set.hospital_id, Some(employee.hospital_id));
        assert_eq!(set.department_id, employee.department_id);
    }

    #[test]
    fn manager_is_manager_but_not_admin() {
        let set = derive_permissions(Some(&employee_with_role(EmployeeRole::Manager)));
        assert!(set.is_manager && !set.is_admin && !set.is_super_admin);
    }

    #[test]
    fn admin_implies_manager() {
        let set = derive_permissions(Some(&employee_with_role(EmployeeRole::Admin)));
        assert!(set.is_admin && set.is_manager && !set.is_super_admin);
    }

    #[test]
    fn super_admin_implies_everything() {
        let set = derive_permissions(Some(&employee_with_role(EmployeeRole::SuperAdmin)));
        assert!(set.is_super_admin && set.is_admin && set.is_manager);
    }
}
