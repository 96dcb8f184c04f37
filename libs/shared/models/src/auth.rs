use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub role: Option<String>,
    pub iat: Option<u64>,
    pub exp: Option<u64>,
}

/// Which credential header a request authenticated through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Doctor,
    Admin,
}

impl Role {
    /// Header name carrying this role's signed credential.
    pub fn header_name(&self) -> &'static str {
        match self {
            Role::User => "token",
            Role::Doctor => "dtoken",
            Role::Admin => "atoken",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

/// Resolved identity injected into request extensions by the auth
/// middleware. `id` is the token subject (user/doctor/admin document id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    pub role: Role,
    pub issued_at: Option<DateTime<Utc>>,
}
