use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{AuthIdentity, JwtClaims, Role};

type HmacSha256 = Hmac<Sha256>;

/// Credential lifetime matches the platform-wide login session length.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Sign a credential for `subject`. The payload carries only the subject id
/// and the role label; everything else is looked up per request.
pub fn issue_token(subject: &str, role: Role, jwt_secret: &str) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let exp = now + Duration::days(TOKEN_TTL_DAYS);

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "sub": subject,
        "role": role.as_str(),
        "iat": now.timestamp(),
        "exp": exp.timestamp()
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Validate a credential and resolve the identity it names. The expected
/// role must match the claim; a doctor token presented on an admin route is
/// rejected here rather than deeper in a handler.
pub fn validate_token(
    token: &str,
    jwt_secret: &str,
    expected_role: Role,
) -> Result<AuthIdentity, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    if claims.role.as_deref() != Some(expected_role.as_str()) {
        debug!(
            "Token role mismatch: expected {}, got {:?}",
            expected_role.as_str(),
            claims.role
        );
        return Err("Token not valid for this role".to_string());
    }

    let issued_at = claims
        .iat
        .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single());

    let identity = AuthIdentity {
        id: claims.sub,
        role: expected_role,
        issued_at,
    };

    debug!("Token validated successfully for {}", identity.id);
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn issued_token_round_trips() {
        let token = issue_token("user-1", Role::User, SECRET).unwrap();
        let identity = validate_token(&token, SECRET, Role::User).unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn wrong_role_is_rejected() {
        let token = issue_token("doc-1", Role::Doctor, SECRET).unwrap();
        assert!(validate_token(&token, SECRET, Role::Admin).is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = issue_token("user-1", Role::User, SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[2] = URL_SAFE_NO_PAD.encode("forged");
        assert!(validate_token(&parts.join("."), SECRET, Role::User).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(validate_token("not-a-token", SECRET, Role::User).is_err());
    }
}
