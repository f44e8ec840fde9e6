//! Signed, compact textual envelope of a [`UserIdentity`], carried in a
//! configured request header by the identity-injection filter.
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::cache::UserIdentity;
use crate::Result;

/// Claim set is exactly `identifier, username, email, locale, picture` —
/// no registered JWT claims (`exp`, `iat`, ...) are added, matching the
/// original's fixed five-field envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub identifier: String,
    pub username: String,
    pub email: String,
    pub locale: String,
    pub picture: String,
}

impl From<&UserIdentity> for IdentityClaims {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            identifier: identity.identifier.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            locale: identity.locale.clone(),
            picture: identity.picture.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdentitySerializer {
    secret: String,
}

impl IdentitySerializer {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn serialize(&self, identity: &UserIdentity) -> Result<String> {
        let claims = IdentityClaims::from(identity);
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    #[cfg(test)]
    fn deserialize(&self, token: &str) -> Result<IdentityClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        Ok(decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?
        .claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let s = IdentitySerializer::new("sign-secret".into());
        let identity = UserIdentity {
            identifier: "sub-1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            picture: "https://example.com/p.png".into(),
            locale: "en".into(),
        };
        let token = s.serialize(&identity).unwrap();
        let claims = s.deserialize(&token).unwrap();
        assert_eq!(claims.identifier, "sub-1");
        assert_eq!(claims.username, "alice");
    }
}
