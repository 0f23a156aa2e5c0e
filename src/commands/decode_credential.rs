use serde_json::Value;

use crate::credential::{self, CredentialError};

/// Claims of `token` as a json object. The signature is not verified.
pub fn decode_credential(token: &str) -> Result<Value, CredentialError> {
    let decoded = credential::decode(token)?;
    Ok(Value::Object(decoded.into_claims()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::credential::tests::{TEST_OID, signed_token};

    #[test]
    fn prints_every_claim() {
        let claims = json!({ "oid": TEST_OID, "tid": "tenant", "roles": ["Admin"] });

        let decoded = decode_credential(&signed_token(&claims)).unwrap();

        assert_eq!(decoded, claims);
    }

    #[test]
    fn malformed_token() {
        assert_matches!(
            decode_credential("only-one-segment"),
            Err(CredentialError::MalformedCredential(_))
        );
    }
}
