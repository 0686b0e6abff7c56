//! Profile written for each user at registration

use serde::{Deserialize, Serialize};

/// Stored at `{users_root}/{user}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,

    /// `None` when the age given at registration was not a number
    pub age: Option<i32>,
}

impl UserProfile {
    pub fn new(name: impl Into<String>, age: Option<i32>) -> Self {
        Self {
            name: name.into(),
            age,
        }
    }

    /// Build a profile from raw form input. The name is stored as typed;
    /// the age is kept only when the whole text is an integer.
    pub fn from_input(name: &str, age: &str) -> Self {
        Self {
            name: name.to_string(),
            age: age.parse().ok(),
        }
    }

    /// The value written to the backend. A missing age is written as null
    /// and therefore not stored at all.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "age": self.age,
        })
    }
}
