use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::storage::{Record, Store};

/// Credential registration, login and bearer-session handling, backed by the
/// protected partition's `users` and `sessions` collections.
///
/// Both password hashes and access tokens come from the same one-way keyed
/// hash: `hashedPassword = hash(password)`, `accessToken = hash(session _id)`.
#[derive(Debug, Clone)]
pub struct Auth {
    /// Name of the unique identity field on user records (e.g. `email`).
    identity: String,
    /// Fixed server-side secret keying the hash.
    secret: String,
}

impl Auth {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Hex digest of SHA-256 over the server secret followed by the input.
    pub fn hash(&self, input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(input.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }

    /// Create a user and a fresh session. The identity value must be unique
    /// across the `users` collection; the plaintext password is never stored.
    pub fn register(&self, protected: &Store, body: &Value) -> Result<Record, ApiError> {
        let (identity_value, password) = self.credentials(body)?;

        let existing = protected
            .query("users", &match_on(&self.identity, &identity_value))
            .unwrap_or_default();
        if !existing.is_empty() {
            return Err(ApiError::conflict(format!(
                "A user with the same {} already exists",
                self.identity
            )));
        }

        let mut new_user = body.as_object().cloned().unwrap_or_default();
        new_user.remove("password");
        new_user.insert("hashedPassword".to_string(), Value::from(self.hash(&password)));

        let mut result = protected
            .add("users", &new_user)
            .map_err(|_| ApiError::request("Request error"))?;
        result.remove("hashedPassword");

        let user_id = result
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::internal("user record missing _id"))?
            .to_string();
        let session = self.save_session(protected, &user_id)?;
        result.insert(
            "accessToken".to_string(),
            session.get("accessToken").cloned().unwrap_or(Value::Null),
        );
        Ok(result)
    }

    /// Authenticate by identity + password; issues a new session on success.
    pub fn login(&self, protected: &Store, body: &Value) -> Result<Record, ApiError> {
        let identity_value = body
            .get(&self.identity)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

        let matches = protected
            .query("users", &match_on(&self.identity, identity_value))
            .unwrap_or_default();
        let user = match matches.as_slice() {
            [single] => single,
            _ => return Err(ApiError::credential("Login or password don't match")),
        };

        let stored_hash = user.get("hashedPassword").and_then(Value::as_str);
        if stored_hash != Some(self.hash(password).as_str()) {
            return Err(ApiError::credential("Login or password don't match"));
        }

        let mut result = user.clone();
        result.remove("hashedPassword");
        let user_id = result
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::internal("user record missing _id"))?
            .to_string();
        let session = self.save_session(protected, &user_id)?;
        result.insert(
            "accessToken".to_string(),
            session.get("accessToken").cloned().unwrap_or(Value::Null),
        );
        Ok(result)
    }

    /// Delete the first session found for the current user. Requires an
    /// authenticated context.
    pub fn logout(&self, protected: &Store, user: Option<&Record>) -> Result<(), ApiError> {
        let user = user.ok_or_else(|| ApiError::credential("User session does not exist"))?;
        let user_id = user.get("_id").cloned().unwrap_or(Value::Null);
        let sessions = protected
            .query("sessions", &match_value("userId", user_id))
            .unwrap_or_default();
        if let Some(session_id) = sessions
            .first()
            .and_then(|s| s.get("_id"))
            .and_then(Value::as_str)
        {
            let _ = protected.delete("sessions", session_id);
        }
        Ok(())
    }

    /// Resolve a bearer token to its user. Any miss (unknown token, or a
    /// session pointing at a deleted user) is fatal for the request.
    pub fn authenticate(&self, protected: &Store, token: &str) -> Result<Record, ApiError> {
        let sessions = protected
            .query("sessions", &match_on("accessToken", token))
            .unwrap_or_default();
        let session = sessions
            .first()
            .ok_or_else(|| ApiError::credential("Invalid access token"))?;
        let user_id = session
            .get("userId")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::credential("Invalid access token"))?;
        let user = protected
            .get("users", user_id)
            .map_err(|_| ApiError::credential("Invalid access token"))?;
        tracing::debug!(
            "authorized as {}",
            user.get(&self.identity).and_then(|v| v.as_str()).unwrap_or("?")
        );
        Ok(user)
    }

    fn save_session(&self, protected: &Store, user_id: &str) -> Result<Record, ApiError> {
        let mut session_data = Record::new();
        session_data.insert("userId".to_string(), Value::from(user_id));
        let session = protected
            .add("sessions", &session_data)
            .map_err(|_| ApiError::request("Request error"))?;
        let session_id = session
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::internal("session record missing _id"))?;

        session_data.insert(
            "accessToken".to_string(),
            Value::from(self.hash(session_id)),
        );
        protected
            .set("sessions", session_id, &session_data)
            .map_err(|_| ApiError::request("Request error"))
    }

    fn credentials(&self, body: &Value) -> Result<(String, String), ApiError> {
        let identity_value = body.get(&self.identity).and_then(Value::as_str).unwrap_or("");
        let password = body.get("password").and_then(Value::as_str).unwrap_or("");
        if identity_value.is_empty() || password.is_empty() {
            return Err(ApiError::request("Missing fields"));
        }
        Ok((identity_value.to_string(), password.to_string()))
    }
}

fn match_on(field: &str, value: &str) -> Record {
    match_value(field, Value::from(value))
}

fn match_value(field: &str, value: Value) -> Record {
    let mut query = Map::new();
    query.insert(field.to_string(), value);
    query
}
