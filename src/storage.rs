use crate::error::{ImporterError, Result};
use crate::models::{College, CollegeArgs, ReplacementUniversity, State};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageCounts {
    pub colleges: usize,
    pub states: usize,
    pub universities: usize,
}

/// Storage trait for persisting colleges, states and replacement universities.
///
/// Names are the unique key of every table. `find_or_create_*` must be a single
/// atomic lookup-or-insert; `create_college` must fail on a duplicate name or on
/// a dangling reference.
#[async_trait]
pub trait Storage: Send + Sync {
    // College operations
    async fn find_college_by_name(&self, name: &str) -> Result<Option<College>>;
    async fn create_college(&self, args: CollegeArgs) -> Result<College>;
    async fn list_colleges(&self) -> Result<Vec<College>>;

    // State operations
    async fn find_or_create_state(&self, name: &str) -> Result<State>;
    async fn find_state_by_name(&self, name: &str) -> Result<Option<State>>;

    // Replacement university operations
    async fn find_or_create_university(&self, name: &str) -> Result<ReplacementUniversity>;
    async fn find_university_by_name(&self, name: &str) -> Result<Option<ReplacementUniversity>>;
    /// Sets the university's state only if it has none yet. Returns the row as stored.
    async fn set_university_state(
        &self,
        university_id: Uuid,
        state_id: Uuid,
    ) -> Result<ReplacementUniversity>;

    async fn counts(&self) -> Result<StorageCounts>;
}

#[derive(Default)]
struct Tables {
    colleges: HashMap<Uuid, College>,
    states: HashMap<Uuid, State>,
    universities: HashMap<Uuid, ReplacementUniversity>,
    // Insertion order, so listings follow import order
    college_order: Vec<Uuid>,
}

/// In-memory storage implementation for dry runs and testing
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage").finish_non_exhaustive()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| ImporterError::Storage("in-memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_college_by_name(&self, name: &str) -> Result<Option<College>> {
        let tables = self.lock()?;
        Ok(tables.colleges.values().find(|c| c.name == name).cloned())
    }

    async fn create_college(&self, args: CollegeArgs) -> Result<College> {
        let mut tables = self.lock()?;

        if tables.colleges.values().any(|c| c.name == args.name) {
            return Err(ImporterError::Constraint(format!(
                "college name '{}' already exists",
                args.name
            )));
        }
        if let Some(state_id) = args.state_id {
            if !tables.states.contains_key(&state_id) {
                return Err(ImporterError::Constraint(format!(
                    "college '{}' references unknown state {}",
                    args.name, state_id
                )));
            }
        }
        if let Some(university_id) = args.replacement_university_id {
            if !tables.universities.contains_key(&university_id) {
                return Err(ImporterError::Constraint(format!(
                    "college '{}' references unknown university {}",
                    args.name, university_id
                )));
            }
        }

        let college = College::new(args);
        tables.college_order.push(college.id);
        tables.colleges.insert(college.id, college.clone());

        debug!("Created college: {} with id {}", college.name, college.id);
        Ok(college)
    }

    async fn list_colleges(&self) -> Result<Vec<College>> {
        let tables = self.lock()?;
        Ok(tables
            .college_order
            .iter()
            .filter_map(|id| tables.colleges.get(id).cloned())
            .collect())
    }

    async fn find_or_create_state(&self, name: &str) -> Result<State> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables.states.values().find(|s| s.name == name) {
            return Ok(existing.clone());
        }

        let state = State::new(name);
        tables.states.insert(state.id, state.clone());

        debug!("Created state: {} with id {}", state.name, state.id);
        Ok(state)
    }

    async fn find_state_by_name(&self, name: &str) -> Result<Option<State>> {
        let tables = self.lock()?;
        Ok(tables.states.values().find(|s| s.name == name).cloned())
    }

    async fn find_or_create_university(&self, name: &str) -> Result<ReplacementUniversity> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables.universities.values().find(|u| u.name == name) {
            return Ok(existing.clone());
        }

        let university = ReplacementUniversity::new(name);
        tables.universities.insert(university.id, university.clone());

        debug!("Created university: {} with id {}", university.name, university.id);
        Ok(university)
    }

    async fn find_university_by_name(&self, name: &str) -> Result<Option<ReplacementUniversity>> {
        let tables = self.lock()?;
        Ok(tables.universities.values().find(|u| u.name == name).cloned())
    }

    async fn set_university_state(
        &self,
        university_id: Uuid,
        state_id: Uuid,
    ) -> Result<ReplacementUniversity> {
        let mut tables = self.lock()?;
        if !tables.states.contains_key(&state_id) {
            return Err(ImporterError::Constraint(format!(
                "university {} cannot reference unknown state {}",
                university_id, state_id
            )));
        }

        let university = tables.universities.get_mut(&university_id).ok_or_else(|| {
            ImporterError::Storage(format!("university {} does not exist", university_id))
        })?;
        if university.state_id.is_none() {
            university.state_id = Some(state_id);
            debug!("Set state of university {} to {}", university.name, state_id);
        }
        Ok(university.clone())
    }

    async fn counts(&self) -> Result<StorageCounts> {
        let tables = self.lock()?;
        Ok(StorageCounts {
            colleges: tables.colleges.len(),
            states: tables.states.len(),
            universities: tables.universities.len(),
        })
    }
}
