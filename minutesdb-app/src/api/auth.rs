//! Caller identity. Authentication itself happens at the edge; requests
//! arrive here carrying only an identity and a role tag in headers.

use rocket::Request;
use rocket::request::{FromRequest, Outcome};

pub const USER_HEADER: &str = "X-Api-User";
pub const ROLE_HEADER: &str = "X-Api-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ReadOnly,
    Admin,
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user_id = request
            .headers()
            .get_one(USER_HEADER)
            .unwrap_or("anonymous")
            .to_string();

        let role = match request.headers().get_one(ROLE_HEADER) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::ReadOnly,
        };

        Outcome::Success(Caller { user_id, role })
    }
}
