use std::collections::HashSet;
use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::auth::{Account, AuthTokenResponse, CredentialsRequest},
    services::store::{DocumentStore, Fields},
};

pub const ACCOUNTS_COLLECTION: &str = "accounts";

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 邮箱
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub session_id: String, // 会话ID
}

/// 已认证的管理员，由中间件放入请求扩展
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub email: String,
    pub session_id: String,
}

/// 登录状态变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "email", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn(String),
    SignedOut(String),
    SignedUp(String),
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    jwt_secret: String,
    jwt_expiry_hours: i64,
    enable_registrations: bool,
    revoked_sessions: Arc<RwLock<HashSet<String>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_hours: config.jwt_expiry_hours,
            enable_registrations: config.enable_registrations,
            revoked_sessions: Arc::new(RwLock::new(HashSet::new())),
            events,
        }
    }

    /// 登录状态变化的订阅
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// 启动时按配置创建管理员账户（已存在则跳过）
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<bool> {
        let email = normalize_email(email);
        if self.find_account(&email).await?.is_some() {
            debug!("Admin account already present: {}", email);
            return Ok(false);
        }
        self.create_account(&email, password).await?;
        info!("Provisioned admin account from configuration: {}", email);
        Ok(true)
    }

    pub async fn sign_in(&self, request: CredentialsRequest) -> Result<AuthTokenResponse> {
        let email = normalize_email(&request.email);
        let account = match self.find_account(&email).await? {
            Some(account) => account,
            None => {
                warn!("Sign-in attempt for unknown account: {}", email);
                return Err(AppError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        if !verify_password(&request.password, &account.password_hash) {
            warn!("Sign-in attempt with wrong password: {}", email);
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue_token(&account.email)?;
        info!("Admin signed in: {}", account.email);
        let _ = self.events.send(AuthEvent::SignedIn(account.email.clone()));
        Ok(token)
    }

    pub async fn sign_up(&self, request: CredentialsRequest) -> Result<AuthTokenResponse> {
        if !self.enable_registrations {
            return Err(AppError::Authentication("Registrations are disabled".to_string()));
        }
        request.validate()?;

        let email = normalize_email(&request.email);
        if self.find_account(&email).await?.is_some() {
            return Err(AppError::conflict("An account with this email already exists"));
        }

        self.create_account(&email, &request.password).await?;
        info!("Admin account registered: {}", email);
        let _ = self.events.send(AuthEvent::SignedUp(email.clone()));
        self.issue_token(&email)
    }

    /// 吊销令牌对应的会话
    pub fn sign_out(&self, token: &str) -> Result<()> {
        let claims = self.verify_jwt(token)?;
        self.revoked_sessions.write().insert(claims.session_id);
        info!("Admin signed out: {}", claims.sub);
        let _ = self.events.send(AuthEvent::SignedOut(claims.sub));
        Ok(())
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(e) => {
                debug!("JWT verification failed: {}", e);
                return Err(AppError::Authentication("Invalid token".to_string()));
            }
        };

        if self.revoked_sessions.read().contains(&claims.session_id) {
            return Err(AppError::Authentication("Session has been signed out".to_string()));
        }
        Ok(claims)
    }

    /// 校验请求头中的令牌，返回当前管理员
    pub fn authenticate(&self, token: &str) -> Result<AdminUser> {
        let claims = self.verify_jwt(token)?;
        Ok(AdminUser {
            email: claims.sub,
            session_id: claims.session_id,
        })
    }

    fn issue_token(&self, email: &str) -> Result<AuthTokenResponse> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.jwt_expiry_hours);
        let claims = Claims {
            sub: email.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            session_id: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(AuthTokenResponse {
            token,
            email: email.to_string(),
            expires_at,
        })
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        match self.store.get(ACCOUNTS_COLLECTION, email).await? {
            Some(record) => Ok(Some(serde_json::from_value(record.data)?)),
            None => Ok(None),
        }
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<()> {
        let account = Account {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        let fields: Fields = match serde_json::to_value(&account)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(AppError::internal("Account did not serialize to an object")),
        };
        self.store.set(ACCOUNTS_COLLECTION, email, fields).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;

    fn credentials(email: &str, password: &str) -> CredentialsRequest {
        CredentialsRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_never_creates_accounts() {
        let store = MemoryStore::new();
        let auth = AuthService::new(Arc::new(store.clone()), &Config::default());

        let err = auth
            .sign_in(credentials("admin@gmail.com", "admin123"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: Invalid email or password.");
        assert!(store.is_empty(ACCOUNTS_COLLECTION));
    }

    #[tokio::test]
    async fn test_bootstrap_then_sign_in_and_out() {
        let auth = AuthService::new(Arc::new(MemoryStore::new()), &Config::default());
        let mut events = auth.subscribe();

        assert!(auth.bootstrap_admin("Owner@Shop.test", "s3cret!").await.unwrap());
        assert!(!auth.bootstrap_admin("owner@shop.test", "other").await.unwrap());

        assert!(auth.sign_in(credentials("owner@shop.test", "wrong")).await.is_err());
        let token = auth
            .sign_in(credentials("owner@shop.test", "s3cret!"))
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::SignedIn("owner@shop.test".to_string())
        );

        assert_eq!(auth.authenticate(&token.token).unwrap().email, "owner@shop.test");
        auth.sign_out(&token.token).unwrap();
        assert!(auth.authenticate(&token.token).is_err());
    }

    #[tokio::test]
    async fn test_sign_up_respects_registration_flag() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let closed = AuthService::new(store.clone(), &Config::default());
        assert!(closed.sign_up(credentials("a@b.test", "secret1")).await.is_err());

        let config = Config {
            enable_registrations: true,
            ..Config::default()
        };
        let open = AuthService::new(store, &config);
        assert!(open.sign_up(credentials("not-an-email", "secret1")).await.is_err());
        open.sign_up(credentials("a@b.test", "secret1")).await.unwrap();
        let err = open.sign_up(credentials("a@b.test", "secret1")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
