use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
};
use futures::future::{Ready, ready};

/// The authenticated caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Missing token")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.role.is_attendance_admin() {
            Ok(())
        } else {
            Err(ErrorForbidden("HR/Admin only"))
        }
    }

    /// Employees may only touch their own attendance; HR and admins anyone's.
    pub fn require_self_or_hr(&self, employee_id: u64) -> actix_web::Result<()> {
        if self.role.is_attendance_admin() || self.employee_id == Some(employee_id) {
            Ok(())
        } else {
            Err(ErrorForbidden("You can only access your own attendance"))
        }
    }

    /// The employee a self-service request is about: the explicit one if given,
    /// else the caller's own profile.
    pub fn target_employee(&self, requested: Option<u64>) -> actix_web::Result<u64> {
        let employee_id = requested
            .or(self.employee_id)
            .ok_or_else(|| ErrorForbidden("No employee profile"))?;
        self.require_self_or_hr(employee_id)?;
        Ok(employee_id)
    }
}
