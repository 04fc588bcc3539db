use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A state a college or university is located in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The canonical university a college's raw "university" string maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementUniversity {
    pub id: Uuid,
    pub name: String,
    pub state_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A college in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct College {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub state_id: Option<Uuid>,
    pub also_known_as: Option<String>,
    pub established_year: Option<i32>,
    pub website: Option<String>,
    pub contact_numbers: Option<String>,
    pub replacement_university_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Arguments for creating a college
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollegeArgs {
    pub name: String,
    pub city: Option<String>,
    pub state_id: Option<Uuid>,
    pub also_known_as: Option<String>,
    pub established_year: Option<i32>,
    pub website: Option<String>,
    pub contact_numbers: Option<String>,
    pub replacement_university_id: Option<Uuid>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

impl ReplacementUniversity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_state(&self) -> bool {
        self.state_id.is_some()
    }
}

impl College {
    /// Create a new, not yet persisted college
    pub fn new(args: CollegeArgs) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: args.name,
            city: args.city,
            state_id: args.state_id,
            also_known_as: args.also_known_as,
            established_year: args.established_year,
            website: args.website,
            contact_numbers: args.contact_numbers,
            replacement_university_id: args.replacement_university_id,
            created_at: Utc::now(),
        }
    }
}
