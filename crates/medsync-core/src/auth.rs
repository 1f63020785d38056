//! Session resolution for the prescribing workflow.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 digests. Sessions travel as
//! signed bearer tokens:
//!
//! ```text
//! hex(claims_json) "." hex(hmac_sha256(secret, claims_json))
//! ```
//!
//! where the claims carry the user id, role and expiry (Unix seconds).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::MedsyncConfig;
use crate::domain::{MedsyncError, Result, Role, Session};

type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;

/// Salted PBKDF2 digest of a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    rounds: u32,
    salt: String,
    digest: String,
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

impl PasswordHash {
    /// Hash `password` with a fresh random 16-byte salt.
    pub fn create(password: &str, rounds: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = derive_key(password, &salt, rounds);
        Self {
            rounds,
            salt: hex::encode(salt),
            digest: hex::encode(digest),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.digest)) else {
            return false;
        };
        let actual = derive_key(password, &salt, self.rounds);
        actual.ct_eq(expected.as_slice()).into()
    }
}

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub role: Role,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Shape checks only; credentials are verified by [`Authenticator`].
    /// Both fields are checked as they will be used, i.e. trimmed.
    pub fn validate(&self) -> Result<()> {
        if !looks_like_email(self.email.trim()) {
            return Err(MedsyncError::invalid("email is not a valid address"));
        }
        if self.password.trim().chars().count() < MIN_PASSWORD_LEN {
            return Err(MedsyncError::invalid(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            clock,
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MedsyncError::Config(format!("token secret: {}", e)))
    }

    /// Issue a token for `user_id` that expires after the configured TTL.
    pub fn sign(&self, user_id: &str, role: Role) -> Result<(String, Session)> {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: expires_at.timestamp(),
        };
        let body = serde_json::to_vec(&claims)?;
        let mut mac = self.mac()?;
        mac.update(&body);
        let signature = mac.finalize().into_bytes();

        let token = format!("{}.{}", hex::encode(&body), hex::encode(signature));
        let session = Session {
            user_id: claims.sub,
            role,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        };
        Ok((token, session))
    }

    pub fn verify(&self, token: &str) -> Result<Session> {
        let unauthorized = |reason: &str| MedsyncError::Unauthorized(reason.to_string());

        let (body_hex, sig_hex) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| unauthorized("malformed token"))?;
        let body = hex::decode(body_hex).map_err(|_| unauthorized("malformed token"))?;
        let signature = hex::decode(sig_hex).map_err(|_| unauthorized("malformed token"))?;

        let mut mac = self.mac()?;
        mac.update(&body);
        mac.verify_slice(&signature)
            .map_err(|_| unauthorized("invalid signature"))?;

        let claims: Claims =
            serde_json::from_slice(&body).map_err(|_| unauthorized("malformed claims"))?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| unauthorized("malformed claims"))?;
        if self.clock.now() >= expires_at {
            return Err(unauthorized("token expired"));
        }

        Ok(Session {
            user_id: claims.sub,
            role: claims.role,
            expires_at,
        })
    }
}

/// User directory plus token signer.
#[derive(Debug)]
pub struct Authenticator {
    users: Vec<User>,
    signer: SessionSigner,
    allow_dev_sessions: bool,
    pbkdf2_rounds: u32,
    /// Verified against when the email is unknown, so a miss costs the same
    /// PBKDF2 work as a wrong password.
    decoy: PasswordHash,
}

impl Authenticator {
    pub fn new(config: &MedsyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Vec::new(),
            signer: SessionSigner::new(config.token_secret.clone(), config.token_ttl, clock),
            allow_dev_sessions: config.allow_dev_sessions,
            pbkdf2_rounds: config.pbkdf2_rounds,
            decoy: PasswordHash::create(&Uuid::new_v4().to_string(), config.pbkdf2_rounds),
        }
    }

    /// Directory with one demo doctor and one demo pharmacist.
    pub fn with_demo_users(config: &MedsyncConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut auth = Self::new(config, clock);
        auth.add_user("doc@gmail.com", "Dr. Alice Carter", Role::Doctor, "doctor123")?;
        auth.add_user("pharm@gmail.com", "Pharm Bob Lee", Role::Pharmacist, "pharm123")?;
        Ok(auth)
    }

    pub fn add_user(&mut self, email: &str, name: &str, role: Role, password: &str) -> Result<User> {
        LoginRequest::new(email, password).validate()?;
        let email = normalize_email(email);
        if self.find_by_email(&email).is_some() {
            return Err(MedsyncError::invalid(format!("user already exists: {}", email)));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            role,
            email,
            name: name.trim().to_string(),
            password_hash: PasswordHash::create(password.trim(), self.pbkdf2_rounds),
        };
        self.users.push(user.clone());
        debug!(user_id = %user.id, role = %role, "user added");
        Ok(user)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email);
        self.users.iter().find(|u| u.email == email)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Check credentials and issue a session token.
    pub fn authenticate(&self, req: &LoginRequest) -> Result<(String, Session)> {
        req.validate()?;
        let email = normalize_email(&req.email);
        let password = req.password.trim();
        let user = match self.find_by_email(&email) {
            Some(user) => Some(user).filter(|u| u.password_hash.verify(password)),
            None => {
                self.decoy.verify(password);
                None
            }
        };
        match user {
            Some(user) => {
                info!(event = "auth.login", user_id = %user.id, role = %user.role);
                self.signer.sign(&user.id, user.role)
            }
            None => {
                warn!(event = "auth.rejected", email = %email);
                Err(MedsyncError::Unauthorized("invalid credentials".to_string()))
            }
        }
    }

    /// Password-less session for local development.
    pub fn issue_dev_session(&self, role: Role) -> Result<(String, Session)> {
        if !self.allow_dev_sessions {
            return Err(MedsyncError::Forbidden(
                "development sessions are disabled".to_string(),
            ));
        }
        let user_id = format!("dev-{}", role);
        warn!(event = "auth.dev_session", role = %role);
        self.signer.sign(&user_id, role)
    }

    pub fn resolve(&self, token: &str) -> Result<Session> {
        self.signer.verify(token)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    const FAST_ROUNDS: u32 = 1_000;

    fn clock() -> Arc<ManualClock> {
        ManualClock::shared(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    fn config() -> MedsyncConfig {
        MedsyncConfig::default()
            .with_token_secret("unit-test-secret")
            .with_pbkdf2_rounds(FAST_ROUNDS)
    }

    #[test]
    fn password_hash_rejects_other_passwords() {
        let hash = PasswordHash::create("doctor123", FAST_ROUNDS);
        assert!(hash.verify("doctor123"));
        assert!(!hash.verify("doctor124"));
    }

    #[test]
    fn password_hash_salts_differ() {
        let a = PasswordHash::create("same", FAST_ROUNDS);
        let b = PasswordHash::create("same", FAST_ROUNDS);
        assert_ne!(a, b);
    }

    #[test]
    fn token_round_trip() {
        let signer = SessionSigner::new("k", std::time::Duration::from_secs(60), clock());
        let (token, session) = signer.sign("user-1", Role::Pharmacist).unwrap();
        let resolved = signer.verify(&token).unwrap();
        assert_eq!(resolved, session);
        assert_eq!(resolved.role, Role::Pharmacist);
    }

    #[test]
    fn token_expires() {
        let clock = clock();
        let signer = SessionSigner::new("k", std::time::Duration::from_secs(60), clock.clone());
        let (token, _) = signer.sign("user-1", Role::Doctor).unwrap();
        clock.advance(chrono::Duration::seconds(60));
        let err = signer.verify(&token).unwrap_err();
        assert!(matches!(err, MedsyncError::Unauthorized(_)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = SessionSigner::new("k", std::time::Duration::from_secs(60), clock());
        let (token, _) = signer.sign("user-1", Role::Doctor).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = hex::encode(br#"{"sub":"user-1","role":"pharmacist","exp":9999999999}"#);
        let forged = format!("{}.{}", forged_claims, sig);
        assert!(matches!(signer.verify(&forged), Err(MedsyncError::Unauthorized(_))));
        assert!(matches!(signer.verify("garbage"), Err(MedsyncError::Unauthorized(_))));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let a = SessionSigner::new("a", std::time::Duration::from_secs(60), clock());
        let b = SessionSigner::new("b", std::time::Duration::from_secs(60), clock());
        let (token, _) = a.sign("user-1", Role::Doctor).unwrap();
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn login_normalises_email_and_password() {
        let auth = Authenticator::with_demo_users(&config(), clock()).unwrap();
        let (token, session) = auth
            .authenticate(&LoginRequest::new("  DOC@gmail.com ", " doctor123 "))
            .unwrap();
        assert_eq!(session.role, Role::Doctor);
        assert_eq!(auth.resolve(&token).unwrap().user_id, session.user_id);
    }

    #[test]
    fn login_with_wrong_password_is_unauthorized() {
        let auth = Authenticator::with_demo_users(&config(), clock()).unwrap();
        let err = auth
            .authenticate(&LoginRequest::new("pharm@gmail.com", "doctor123"))
            .unwrap_err();
        assert!(matches!(err, MedsyncError::Unauthorized(_)));
    }

    #[test]
    fn login_shape_is_validated() {
        let auth = Authenticator::with_demo_users(&config(), clock()).unwrap();
        assert!(matches!(
            auth.authenticate(&LoginRequest::new("not-an-email", "doctor123")),
            Err(MedsyncError::InvalidArgument(_))
        ));
        assert!(matches!(
            auth.authenticate(&LoginRequest::new("doc@gmail.com", "12345")),
            Err(MedsyncError::InvalidArgument(_))
        ));
    }

    #[test]
    fn dev_sessions_require_opt_in() {
        let auth = Authenticator::new(&config(), clock());
        assert!(matches!(
            auth.issue_dev_session(Role::Doctor),
            Err(MedsyncError::Forbidden(_))
        ));

        let auth = Authenticator::new(&config().with_dev_sessions(true), clock());
        let (token, _) = auth.issue_dev_session(Role::Pharmacist).unwrap();
        assert_eq!(auth.resolve(&token).unwrap().role, Role::Pharmacist);
    }

    #[test]
    fn salt_is_sixteen_random_bytes() {
        let hash = PasswordHash::create("doctor123", FAST_ROUNDS);
        let salt = hex::decode(&hash.salt).unwrap();
        assert_eq!(salt.len(), SALT_LEN);
        let other = hex::decode(PasswordHash::create("doctor123", FAST_ROUNDS).salt).unwrap();
        assert_ne!(salt, other);
    }

    #[test]
    fn unknown_email_is_rejected_like_wrong_password() {
        let auth = Authenticator::with_demo_users(&config(), clock()).unwrap();
        assert_eq!(auth.decoy.rounds, FAST_ROUNDS);

        let unknown = auth
            .authenticate(&LoginRequest::new("nobody@gmail.com", "doctor123"))
            .unwrap_err();
        let wrong = auth
            .authenticate(&LoginRequest::new("doc@gmail.com", "doctor124"))
            .unwrap_err();
        assert!(matches!(unknown, MedsyncError::Unauthorized(_)));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn padded_short_password_is_rejected() {
        let mut auth = Authenticator::new(&config(), clock());
        let err = auth
            .add_user("nurse@gmail.com", "Nurse", Role::Doctor, "  abc  ")
            .unwrap_err();
        assert!(matches!(err, MedsyncError::InvalidArgument(_)));
        assert!(auth.users().is_empty());

        let err = LoginRequest::new("doc@gmail.com", "   abc   ").validate().unwrap_err();
        assert!(matches!(err, MedsyncError::InvalidArgument(_)));
    }

    #[test]
    fn duplicate_user_is_rejected() {
        let mut auth = Authenticator::with_demo_users(&config(), clock()).unwrap();
        let err = auth
            .add_user("Doc@Gmail.com", "Someone", Role::Doctor, "secret1")
            .unwrap_err();
        assert!(matches!(err, MedsyncError::InvalidArgument(_)));
        assert_eq!(auth.users().len(), 2);
    }
}
