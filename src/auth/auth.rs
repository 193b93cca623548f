use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::staff::{Role, StaffRef};

/// The authenticated actor behind a request: a staff reference plus the
/// actor's role. Extracted from the bearer token on every protected call.
pub struct AuthStaff {
    pub staff: StaffRef,
    pub name: String,
    pub role: Role,
}

impl FromRequest for AuthStaff {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthStaff {
            staff: StaffRef::new(claims.category, claims.staff_id),
            name: claims.sub,
            role,
        }))
    }
}

impl AuthStaff {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    /// Admins may act on anyone; everyone else only on themselves.
    pub fn require_self_or_admin(&self, target: StaffRef) -> actix_web::Result<()> {
        if self.role == Role::Admin || self.staff == target {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden(
                "Admins or the staff member only",
            ))
        }
    }
}
