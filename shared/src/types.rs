use crate::error::{Result, UserError};
use crate::ids::UserId;
use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

// ========== USER ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(UserError::Validation(format!("unknown status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first: String,
    pub last: String,
    pub email: String,
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "role", default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request body for creating a new user. Required fields are optional here so
// that a missing field surfaces as a validation message, not a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub first: Option<String>,
    pub last: Option<String>,
    pub email: Option<String>,
    pub status: Option<UserStatus>,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "role")]
    pub roles: Option<Vec<String>>,
}

impl CreateUserRequest {
    /// Validate the candidate and build the document to insert
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> Result<User> {
        let missing: Vec<&str> = [
            ("first", &self.first),
            ("last", &self.last),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(UserError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let email = self.email.unwrap_or_default();
        validate_email(&email)?;

        Ok(User {
            id,
            first: self.first.unwrap_or_default(),
            last: self.last.unwrap_or_default(),
            email,
            status: self.status.unwrap_or_default(),
            age: self.age,
            city: self.city,
            country: self.country,
            roles: self.roles.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }
}

// Request body for updating a user. Only fields present are written.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first: Option<String>,
    pub last: Option<String>,
    pub email: Option<String>,
    pub status: Option<UserStatus>,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "role")]
    pub roles: Option<Vec<String>>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("first", &self.first), ("last", &self.last)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(UserError::Validation(format!("{} must not be empty", name)));
            }
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    /// Merge the provided fields into `user` and stamp `updated_at`
    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(first) = &self.first {
            user.first = first.clone();
        }
        if let Some(last) = &self.last {
            user.last = last.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(age) = self.age {
            user.age = Some(age);
        }
        if let Some(city) = &self.city {
            user.city = Some(city.clone());
        }
        if let Some(country) = &self.country {
            user.country = Some(country.clone());
        }
        if let Some(roles) = &self.roles {
            user.roles = roles.clone();
        }
        user.updated_at = now.max(user.updated_at);
    }
}

// ========== LIST ==========
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub data: Vec<User>,
    pub page: u64,
    pub limit: u64,
    pub total_count: u64,
}

/// Current time at the precision the store keeps (milliseconds)
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn validate_email(email: &str) -> Result<()> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    });
    if pattern.is_match(email) {
        Ok(())
    } else {
        Err(UserError::Validation("invalid email format".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CreateUserRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn create_assigns_defaults_and_equal_timestamps() {
        let now = now();
        let id = UserId::generate();
        let user = request(serde_json::json!({
            "first": "A", "last": "B", "email": "a@b.com", "age": 5
        }))
        .into_user(id, now)
        .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.age, Some(5));
        assert_eq!(user.created_at, user.updated_at);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn create_reports_every_missing_field() {
        let err = request(serde_json::json!({ "first": "A", "last": "  " }))
            .into_user(UserId::generate(), now())
            .unwrap_err();
        match err {
            UserError::Validation(msg) => assert_eq!(msg, "missing required fields: last, email"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn create_rejects_bad_email() {
        let err = request(serde_json::json!({
            "first": "A", "last": "B", "email": "not an email"
        }))
        .into_user(UserId::generate(), now())
        .unwrap_err();
        assert!(matches!(err, UserError::Validation(msg) if msg == "invalid email format"));
    }

    #[test]
    fn client_supplied_id_and_timestamps_are_ignored() {
        let id = UserId::generate();
        let user = request(serde_json::json!({
            "id": "5ce930b307a444000179a4e0",
            "createdAt": "2000-01-01T00:00:00Z",
            "first": "A", "last": "B", "email": "a@b.com"
        }))
        .into_user(id, now())
        .unwrap();
        assert_eq!(user.id, id);
        assert!(user.created_at.timestamp() > 946_684_800);
    }

    #[test]
    fn update_merges_only_present_fields() {
        let created = now() - chrono::Duration::seconds(5);
        let mut user = request(serde_json::json!({
            "first": "A", "last": "B", "email": "a@b.com", "city": "Lisbon"
        }))
        .into_user(UserId::generate(), created)
        .unwrap();

        let patch: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "last": "C", "status": "inactive", "role": ["admin"]
        }))
        .unwrap();
        patch.validate().unwrap();
        let later = now();
        patch.apply(&mut user, later);

        assert_eq!(user.first, "A");
        assert_eq!(user.last, "C");
        assert_eq!(user.city.as_deref(), Some("Lisbon"));
        assert_eq!(user.status, UserStatus::Inactive);
        assert_eq!(user.roles, vec!["admin".to_string()]);
        assert_eq!(user.created_at, created);
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn update_never_moves_updated_at_backwards() {
        let mut user = request(serde_json::json!({
            "first": "A", "last": "B", "email": "a@b.com"
        }))
        .into_user(UserId::generate(), now())
        .unwrap();
        let before = user.updated_at;
        UpdateUserRequest::default().apply(&mut user, before - chrono::Duration::seconds(30));
        assert_eq!(user.updated_at, before);
    }

    #[test]
    fn update_rejects_empty_names() {
        let patch = UpdateUserRequest {
            first: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(UserError::Validation(_))));
    }

    #[test]
    fn user_serializes_with_camel_case_keys() {
        let user = request(serde_json::json!({
            "first": "A", "last": "B", "email": "a@b.com", "role": ["ops"]
        }))
        .into_user(UserId::generate(), now())
        .unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["status"], "active");
        assert_eq!(json["role"], serde_json::json!(["ops"]));
        assert!(json.get("age").is_none());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [UserStatus::Active, UserStatus::Inactive, UserStatus::Suspended] {
            assert_eq!(status.as_str().parse::<UserStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<UserStatus>().is_err());
    }
}
