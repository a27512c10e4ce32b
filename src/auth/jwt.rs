use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::types::{Claims, Role, TokenKind};
use crate::error::AuthError;

pub const ACCESS_TTL_SECS: usize = 15 * 60;
pub const REFRESH_TTL_SECS: usize = 7 * 24 * 60 * 60;
pub const ISSUER: &str = "katering";
pub const AUDIENCE: &str = "katering-web";

#[derive(Clone)]
pub struct JwtKeys {
    pub enc: EncodingKey,
    pub dec: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret),
            dec: DecodingKey::from_secret(secret),
        }
    }
}

pub fn now_unix() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

/// Stateless mint/parse for the bearer tokens. Signature and claim structure
/// are checked on every parse; expiry is a separate explicit check so the
/// kind of an expired token can still be inspected.
#[derive(Clone)]
pub struct TokenCodec {
    keys: JwtKeys,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            keys: JwtKeys::from_secret(secret),
        }
    }

    pub fn mint_access_token(
        &self,
        email: &str,
        user_id: &Uuid,
        role: Role,
    ) -> Result<String, AuthError> {
        self.mint(email, user_id, Some(role), TokenKind::Access, ACCESS_TTL_SECS)
    }

    pub fn mint_refresh_token(&self, email: &str, user_id: &Uuid) -> Result<String, AuthError> {
        self.mint(email, user_id, None, TokenKind::Refresh, REFRESH_TTL_SECS)
    }

    fn mint(
        &self,
        email: &str,
        user_id: &Uuid,
        role: Option<Role>,
        kind: TokenKind,
        ttl_secs: usize,
    ) -> Result<String, AuthError> {
        let iat = now_unix();
        let claims = Claims {
            sub: email.to_string(),
            user_id: user_id.to_string(),
            role,
            kind,
            iat,
            exp: iat + ttl_secs,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };

        let mut header = Header::new(Algorithm::HS512);
        header.typ = Some("JWT".into());

        encode(&header, &claims, &self.keys.enc).map_err(|err| {
            tracing::error!("token encoding failed: {err}");
            AuthError::MalformedToken
        })
    }

    pub fn parse_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);

        decode::<Claims>(token, &self.keys.dec, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::MalformedToken)
    }

    /// Fail-closed: anything that does not parse counts as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        match self.parse_claims(token) {
            Ok(claims) => claims.exp <= now_unix(),
            Err(_) => true,
        }
    }

    /// Fail-closed: anything that does not parse is not of the asked kind.
    pub fn is_kind(&self, token: &str, kind: TokenKind) -> bool {
        self.parse_claims(token)
            .map(|claims| claims.kind == kind)
            .unwrap_or(false)
    }

    pub fn validate(&self, token: &str, expected_subject: &str) -> bool {
        match self.parse_claims(token) {
            Ok(claims) => claims.sub == expected_subject && claims.exp > now_unix(),
            Err(_) => false,
        }
    }

    pub fn seconds_until_expiry(&self, token: &str) -> i64 {
        match self.parse_claims(token) {
            Ok(claims) => (claims.exp as i64 - now_unix() as i64).max(0),
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{ACCESS_TTL_SECS, AUDIENCE, ISSUER, TokenCodec};
    use crate::auth::types::{Role, TokenKind};

    fn codec() -> TokenCodec {
        TokenCodec::new(b"unit-test-secret-unit-test-secret")
    }

    #[test]
    fn access_token_roundtrips_subject_user_and_role() {
        let codec = codec();
        let user_id = Uuid::new_v4();
        let token = codec
            .mint_access_token("ivan@example.com", &user_id, Role::User)
            .expect("token should encode");

        let claims = codec.parse_claims(&token).expect("token should parse");
        assert_eq!(claims.sub, "ivan@example.com");
        assert_eq!(claims.user_id, user_id.to_string());
        assert_eq!(claims.role, Some(Role::User));
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, AUDIENCE);
    }

    #[test]
    fn refresh_token_carries_no_role_claim() {
        let codec = codec();
        let token = codec
            .mint_refresh_token("ivan@example.com", &Uuid::new_v4())
            .expect("token should encode");

        let claims = codec.parse_claims(&token).expect("token should parse");
        assert_eq!(claims.role, None);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn kind_checks_are_fail_closed() {
        let codec = codec();
        let token = codec
            .mint_refresh_token("ivan@example.com", &Uuid::new_v4())
            .expect("token should encode");

        assert!(codec.is_kind(&token, TokenKind::Refresh));
        assert!(!codec.is_kind(&token, TokenKind::Access));
        assert!(!codec.is_kind("not-a-jwt", TokenKind::Refresh));
        assert!(!codec.is_kind("not-a-jwt", TokenKind::Access));
    }

    #[test]
    fn token_signed_with_different_secret_does_not_parse() {
        let token = TokenCodec::new(b"secret-a-secret-a-secret-a-secret")
            .mint_access_token("ivan@example.com", &Uuid::new_v4(), Role::User)
            .expect("token should encode");

        assert!(codec().parse_claims(&token).is_err());
        assert!(codec().is_expired(&token));
        assert_eq!(codec().seconds_until_expiry(&token), 0);
    }

    #[test]
    fn fresh_token_is_not_expired_and_zero_ttl_token_is() {
        let codec = codec();
        let user_id = Uuid::new_v4();

        let fresh = codec
            .mint_access_token("ivan@example.com", &user_id, Role::User)
            .expect("token should encode");
        assert!(!codec.is_expired(&fresh));

        let stale = codec
            .mint("ivan@example.com", &user_id, None, TokenKind::Refresh, 0)
            .expect("token should encode");
        assert!(codec.is_expired(&stale));
        assert_eq!(codec.seconds_until_expiry(&stale), 0);
    }

    #[test]
    fn validate_requires_matching_subject_and_liveness() {
        let codec = codec();
        let token = codec
            .mint_access_token("ivan@example.com", &Uuid::new_v4(), Role::User)
            .expect("token should encode");

        assert!(codec.validate(&token, "ivan@example.com"));
        assert!(!codec.validate(&token, "other@example.com"));
        assert!(!codec.validate("garbage", "ivan@example.com"));
    }

    #[test]
    fn seconds_until_expiry_reflects_access_ttl() {
        let codec = codec();
        let token = codec
            .mint_access_token("ivan@example.com", &Uuid::new_v4(), Role::User)
            .expect("token should encode");

        let remaining = codec.seconds_until_expiry(&token);
        assert!(remaining > 0 && remaining <= ACCESS_TTL_SECS as i64);
    }
}
