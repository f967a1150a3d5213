use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{Result, ShieldError};

pub const VIEW_DATA: &str = "view_data";
pub const EDIT_DATA: &str = "edit_data";
pub const CONFIRM_DATA: &str = "confirm_data";
pub const MANAGE_PERMISSIONS: &str = "manage_permissions";
pub const EXPORT_DATA: &str = "export_data";
pub const VIEW_AUDIT: &str = "view_audit";

/// Roles known to DataShield
///
/// The set is closed: anything else is rejected when parsed from a directory
/// record or a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    DataProducer,
    Reviewer,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::DataProducer, Role::Reviewer, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::DataProducer => "data_producer",
            Self::Reviewer => "reviewer",
            Self::Viewer => "viewer",
        }
    }

    /// Permission set granted to a freshly registered user of this role
    pub fn default_permissions(&self) -> BTreeSet<String> {
        let names: &[&str] = match self {
            Self::Admin => &[
                VIEW_DATA,
                EDIT_DATA,
                CONFIRM_DATA,
                MANAGE_PERMISSIONS,
                EXPORT_DATA,
                VIEW_AUDIT,
            ],
            Self::DataProducer => &[VIEW_DATA, EDIT_DATA, EXPORT_DATA],
            Self::Reviewer => &[VIEW_DATA, CONFIRM_DATA, EXPORT_DATA],
            Self::Viewer => &[VIEW_DATA],
        };
        names.iter().map(|p| p.to_string()).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ShieldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "data_producer" => Ok(Self::DataProducer),
            "reviewer" => Ok(Self::Reviewer),
            "viewer" => Ok(Self::Viewer),
            _ => Err(ShieldError::UnknownRole(s.to_string())),
        }
    }
}

/// An authenticated user as seen by the table store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        User {
            id: id.into(),
            name: name.into(),
            role,
            permissions: role.default_permissions(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Directory record for a registered account
///
/// Contains the argon2 hash, never the password itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRecord {
    /// Stable user identifier stamped on history and audit entries
    pub id: String,

    /// Login name (unique within the directory)
    pub username: String,

    /// Display name
    pub name: String,

    pub role: Role,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Explicit permission set; the role default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<String>>,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
            permissions: self
                .permissions
                .clone()
                .unwrap_or_else(|| self.role.default_permissions()),
        }
    }
}

// Wire form of a record. The role stays a string until it has been checked.
#[derive(Deserialize)]
struct RawUserRecord {
    id: String,
    username: String,
    name: String,
    role: String,
    password_hash: String,
    #[serde(default)]
    permissions: Option<BTreeSet<String>>,
}

/// Mock identity provider mapping usernames to accounts
#[derive(Debug, Default, Clone)]
pub struct Directory {
    users: HashMap<String, UserRecord>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with one demo account per role
    ///
    /// | username | password    | role          |
    /// |----------|-------------|---------------|
    /// | admin    | admin123    | admin         |
    /// | producer | producer123 | data_producer |
    /// | reviewer | reviewer123 | reviewer      |
    /// | viewer   | viewer123   | viewer        |
    pub fn demo() -> Result<Self> {
        let mut directory = Self::new();
        directory.register_user("admin", "System Administrator", Role::Admin, "admin123")?;
        directory.register_user("producer", "Data Producer", Role::DataProducer, "producer123")?;
        directory.register_user("reviewer", "QA Reviewer", Role::Reviewer, "reviewer123")?;
        directory.register_user("viewer", "Read-only Viewer", Role::Viewer, "viewer123")?;
        Ok(directory)
    }

    /// Load accounts from a JSON array of user records
    ///
    /// # Errors
    /// * `UnknownRole` if any record names a role outside the closed set
    /// * `UserAlreadyExists` on duplicate usernames
    /// * `Serialization` if the document is malformed
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawUserRecord> = serde_json::from_str(json)?;
        let mut directory = Self::new();

        for record in raw {
            let role: Role = record.role.parse()?;
            if directory.users.contains_key(&record.username) {
                return Err(ShieldError::UserAlreadyExists(record.username));
            }
            directory.users.insert(
                record.username.clone(),
                UserRecord {
                    id: record.id,
                    username: record.username,
                    name: record.name,
                    role,
                    password_hash: record.password_hash,
                    permissions: record.permissions,
                },
            );
        }

        Ok(directory)
    }

    /// Serialize all records, sorted by username
    pub fn to_json(&self) -> Result<String> {
        let mut records: Vec<&UserRecord> = self.users.values().collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Register a new account
    ///
    /// The password is hashed before storage.
    ///
    /// # Errors
    /// * `InvalidCredentials` if any field is empty
    /// * `UserAlreadyExists` if the username is taken
    pub fn register_user(
        &mut self,
        username: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> Result<User> {
        if username.is_empty() || password.is_empty() || name.is_empty() {
            return Err(ShieldError::InvalidCredentials);
        }
        if self.users.contains_key(username) {
            return Err(ShieldError::UserAlreadyExists(username.to_string()));
        }

        let record = UserRecord {
            id: format!("user-{}", Uuid::new_v4()),
            username: username.to_string(),
            name: name.to_string(),
            role,
            password_hash: hash_password(password)?,
            permissions: None,
        };
        let user = record.to_user();
        self.users.insert(username.to_string(), record);

        log::info!("Registered user {} with role {}", username, role);
        Ok(user)
    }

    /// Map credentials to a user
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let record = match self.users.get(username) {
            Some(record) => record,
            None => {
                log::debug!("Login rejected: unknown user {}", username);
                return Err(ShieldError::InvalidCredentials);
            }
        };

        if verify_password(password, &record.password_hash)? {
            Ok(record.to_user())
        } else {
            log::warn!("Login rejected: wrong password for {}", username);
            Err(ShieldError::InvalidCredentials)
        }
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Hash a password using Argon2id with a random salt
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(ShieldError::Serialization(format!("Password hashing failed: {}", e))),
    }
}

/// Check a plaintext password against a stored Argon2 hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err(ShieldError::Serialization("Invalid password hash format".into())),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Authenticated user session
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Active login sessions keyed by session id
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    duration: Duration,
}

impl SessionManager {
    pub fn new(duration: Duration) -> Self {
        SessionManager {
            sessions: HashMap::new(),
            duration,
        }
    }

    /// Create a session for an authenticated user and return its id
    pub fn create_session(&mut self, user: User) -> String {
        let session_id = Uuid::new_v4().to_string();
        let expires_at = SystemTime::now() + self.duration;

        self.sessions.insert(session_id.clone(), Session { user, expires_at });
        session_id
    }

    /// The session's user, if the session exists and has not expired
    pub fn validate_session(&self, session_id: &str) -> Option<&User> {
        match self.sessions.get(session_id) {
            Some(session) if session.expires_at > SystemTime::now() => Some(&session.user),
            _ => None,
        }
    }

    pub fn require_session(&self, session_id: &str) -> Result<&User> {
        self.validate_session(session_id)
            .ok_or(ShieldError::SessionExpired)
    }

    /// Remove a session. Returns whether it existed.
    pub fn end_session(&mut self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        let now = SystemTime::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        before - self.sessions.len()
    }
}
