use crate::error::Result;
use crate::models::{College, CollegeArgs, ReplacementUniversity, State};
use crate::source::{parse_records, RawRecord, SourceFetcher, SourceLocation};
use crate::storage::Storage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

static CAMPUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)campus").expect("valid regex"));

/// What happened to a single listing entry
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created(College),
    SkippedBlankName,
    SkippedExisting,
}

/// Result of a complete import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub skipped_blank: usize,
    pub skipped_existing: usize,
}

impl ImportSummary {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Created(_) => self.created += 1,
            RecordOutcome::SkippedBlankName => self.skipped_blank += 1,
            RecordOutcome::SkippedExisting => self.skipped_existing += 1,
        }
    }
}

/// Imports colleges from the crawler listing, creating the states and
/// replacement universities they refer to on the way.
pub struct CollegeImporter {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl std::fmt::Debug for CollegeImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollegeImporter")
            .field("storage", &"<Arc<dyn Storage>>")
            .field("fetcher", &"<Arc<dyn SourceFetcher>>")
            .finish()
    }
}

impl CollegeImporter {
    pub fn new(storage: Arc<dyn Storage>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { storage, fetcher }
    }

    /// Fetch, parse and import the listing at `location`.
    ///
    /// Fetch and parse failures abort before anything is written. A storage
    /// failure aborts the run where it happens; colleges created before it stay.
    #[instrument(skip_all, fields(source = %location))]
    pub async fn process(&self, location: &SourceLocation) -> Result<ImportSummary> {
        let body = self.fetcher.fetch(location).await?;
        let records = parse_records(&body)?;
        self.import_records(&records).await
    }

    /// Import already decoded records, in order
    pub async fn import_records(&self, records: &[RawRecord]) -> Result<ImportSummary> {
        info!("Importing {} colleges...", records.len());

        let mut summary = ImportSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            let outcome = self.import_record(record).await?;
            summary.record(&outcome);
        }

        info!("Successfully created {} colleges.", summary.created);
        debug!(
            skipped_blank = summary.skipped_blank,
            skipped_existing = summary.skipped_existing,
            "Import finished"
        );
        Ok(summary)
    }

    #[instrument(skip_all)]
    pub async fn import_record(&self, record: &RawRecord) -> Result<RecordOutcome> {
        let Some(name) = record.present("name") else {
            warn!(
                "Encountered entry with blank name. Skipping. Details follow:\n{}",
                record.dump()
            );
            return Ok(RecordOutcome::SkippedBlankName);
        };

        if self.storage.find_college_by_name(&name).await?.is_some() {
            return Ok(RecordOutcome::SkippedExisting);
        }

        let college = self.create_college(record, name).await?;
        Ok(RecordOutcome::Created(college))
    }

    async fn create_college(&self, record: &RawRecord, name: String) -> Result<College> {
        let city = record.present("city").or_else(|| extract_city(&name));
        let state = self.resolve_state(record.present("state")).await?;
        let university = self
            .resolve_university(record.present("university"), state.as_ref())
            .await?;

        let college = self
            .storage
            .create_college(CollegeArgs {
                name,
                city,
                state_id: state.map(|s| s.id),
                also_known_as: record.present("alias"),
                established_year: record.established_year(),
                website: record.present("website"),
                contact_numbers: record.present("contact"),
                replacement_university_id: university.map(|u| u.id),
            })
            .await?;

        debug!("Created college: {} ({})", college.name, college.id);
        Ok(college)
    }

    async fn resolve_state(&self, state_name: Option<String>) -> Result<Option<State>> {
        match state_name {
            Some(name) => Ok(Some(self.storage.find_or_create_state(&name).await?)),
            None => Ok(None),
        }
    }

    /// No university name means no university: nothing is created or linked.
    async fn resolve_university(
        &self,
        university_name: Option<String>,
        state: Option<&State>,
    ) -> Result<Option<ReplacementUniversity>> {
        let Some(name) = university_name else {
            return Ok(None);
        };

        let university = self.storage.find_or_create_university(&name).await?;
        match state {
            Some(state) if !university.has_state() => {
                let updated = self
                    .storage
                    .set_university_state(university.id, state.id)
                    .await?;
                debug!("University {} now belongs to {}", updated.name, state.name);
                Ok(Some(updated))
            }
            _ => Ok(Some(university)),
        }
    }
}

/// Derive a city from a college name: the text after the last comma with any
/// "campus" removed and whitespace squeezed. A name without a comma yields
/// the whole name.
pub fn extract_city(name: &str) -> Option<String> {
    let segment = name.split(',').rev().find(|s| !s.is_empty())?;
    let stripped = CAMPUS.replace_all(segment, "");
    let city = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if city.is_empty() {
        None
    } else {
        Some(city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImporterError;
    use crate::storage::InMemoryStorage;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct StaticFetcher {
        body: Option<String>,
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self, location: &SourceLocation) -> Result<String> {
            self.body.clone().ok_or_else(|| ImporterError::Fetch {
                location: location.to_string(),
                status: 404,
            })
        }
    }

    /// Delegates to in-memory storage but refuses to create one named college
    struct RefusingStorage {
        inner: InMemoryStorage,
        refuse: &'static str,
    }

    #[async_trait]
    impl Storage for RefusingStorage {
        async fn find_college_by_name(&self, name: &str) -> Result<Option<College>> {
            self.inner.find_college_by_name(name).await
        }
        async fn create_college(&self, args: CollegeArgs) -> Result<College> {
            if args.name == self.refuse {
                return Err(ImporterError::Constraint(format!("{} refused", args.name)));
            }
            self.inner.create_college(args).await
        }
        async fn list_colleges(&self) -> Result<Vec<College>> {
            self.inner.list_colleges().await
        }
        async fn find_or_create_state(&self, name: &str) -> Result<State> {
            self.inner.find_or_create_state(name).await
        }
        async fn find_state_by_name(&self, name: &str) -> Result<Option<State>> {
            self.inner.find_state_by_name(name).await
        }
        async fn find_or_create_university(&self, name: &str) -> Result<ReplacementUniversity> {
            self.inner.find_or_create_university(name).await
        }
        async fn find_university_by_name(
            &self,
            name: &str,
        ) -> Result<Option<ReplacementUniversity>> {
            self.inner.find_university_by_name(name).await
        }
        async fn set_university_state(
            &self,
            university_id: Uuid,
            state_id: Uuid,
        ) -> Result<ReplacementUniversity> {
            self.inner.set_university_state(university_id, state_id).await
        }
        async fn counts(&self) -> Result<crate::storage::StorageCounts> {
            self.inner.counts().await
        }
    }

    fn importer_for(storage: Arc<dyn Storage>, body: Option<&str>) -> CollegeImporter {
        CollegeImporter::new(
            storage,
            Arc::new(StaticFetcher {
                body: body.map(str::to_string),
            }),
        )
    }

    fn location() -> SourceLocation {
        SourceLocation::parse("https://crawler.example.com/colleges.yml")
    }

    const LISTING: &str = r#"
- name: "Foo Campus, Springfield"
  state: Texas
  university: Acme U
  alias: FCS
  established_year: 1961
  website: https://foo.example.edu
  contact: ["555-0100", "555-0101"]
- name: ""
  city: Nowhere
- name: Bar Institute of Technology
  city: Shelbyville
  state: Texas
- city: Ogdenville
"#;

    #[test]
    fn test_extract_city_after_last_comma() {
        assert_eq!(
            extract_city("Foo Campus, Springfield").as_deref(),
            Some("Springfield")
        );
        assert_eq!(
            extract_city("Govt. College, North  CAMPUS ,  Bhopal   City").as_deref(),
            Some("Bhopal City")
        );
        assert_eq!(
            extract_city("St. Joseph's College, Campus  East").as_deref(),
            Some("East")
        );
    }

    #[test]
    fn test_extract_city_without_comma_keeps_name() {
        assert_eq!(extract_city("Foo University").as_deref(), Some("Foo University"));
        assert_eq!(extract_city("Foo Campus University").as_deref(), Some("Foo University"));
    }

    #[test]
    fn test_extract_city_edge_cases() {
        // Trailing empty segments are ignored
        assert_eq!(extract_city("Acme College, Pune,").as_deref(), Some("Pune"));
        assert_eq!(extract_city(","), None);
        assert_eq!(extract_city("Acme College, Campus"), None);
    }

    #[tokio::test]
    async fn test_process_creates_colleges_and_counts() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer_for(storage.clone(), Some(LISTING));

        let summary = importer.process(&location()).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                total: 4,
                created: 2,
                skipped_blank: 2,
                skipped_existing: 0,
            }
        );

        let foo = storage
            .find_college_by_name("Foo Campus, Springfield")
            .await
            .unwrap()
            .unwrap();
        let texas = storage.find_state_by_name("Texas").await.unwrap().unwrap();
        let acme = storage.find_university_by_name("Acme U").await.unwrap().unwrap();

        assert_eq!(foo.city.as_deref(), Some("Springfield"));
        assert_eq!(foo.state_id, Some(texas.id));
        assert_eq!(foo.also_known_as.as_deref(), Some("FCS"));
        assert_eq!(foo.established_year, Some(1961));
        assert_eq!(foo.website.as_deref(), Some("https://foo.example.edu"));
        assert_eq!(foo.contact_numbers.as_deref(), Some("555-0100, 555-0101"));
        assert_eq!(foo.replacement_university_id, Some(acme.id));
        assert_eq!(acme.state_id, Some(texas.id));

        let bar = storage
            .find_college_by_name("Bar Institute of Technology")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bar.city.as_deref(), Some("Shelbyville"));
        assert_eq!(bar.replacement_university_id, None);

        let counts = storage.counts().await.unwrap();
        assert_eq!(counts.states, 1);
        assert_eq!(counts.universities, 1);
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer_for(storage.clone(), Some(LISTING));

        importer.process(&location()).await.unwrap();
        let before = storage.list_colleges().await.unwrap();

        let summary = importer.process(&location()).await.unwrap();
        let after = storage.list_colleges().await.unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(summary.skipped_existing, 2);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_existing_university_gets_state_once() {
        let storage = Arc::new(InMemoryStorage::new());
        let ohio = storage.find_or_create_state("Ohio").await.unwrap();
        let beta = storage.find_or_create_university("Beta U").await.unwrap();
        storage.set_university_state(beta.id, ohio.id).await.unwrap();
        storage.find_or_create_university("Acme U").await.unwrap();

        let listing = r#"
- name: Alpha College
  state: Texas
  university: Acme U
- name: Gamma College
  state: Texas
  university: Beta U
"#;
        importer_for(storage.clone(), Some(listing))
            .process(&location())
            .await
            .unwrap();

        let texas = storage.find_state_by_name("Texas").await.unwrap().unwrap();
        let acme = storage.find_university_by_name("Acme U").await.unwrap().unwrap();
        let beta = storage.find_university_by_name("Beta U").await.unwrap().unwrap();
        assert_eq!(acme.state_id, Some(texas.id));
        assert_eq!(beta.state_id, Some(ohio.id));
    }

    #[tokio::test]
    async fn test_university_without_state_stays_unset() {
        let storage = Arc::new(InMemoryStorage::new());
        importer_for(
            storage.clone(),
            Some("- name: Delta College\n  university: Acme U\n"),
        )
        .process(&location())
        .await
        .unwrap();

        let acme = storage.find_university_by_name("Acme U").await.unwrap().unwrap();
        let delta = storage.find_college_by_name("Delta College").await.unwrap().unwrap();
        assert_eq!(acme.state_id, None);
        assert_eq!(delta.state_id, None);
        assert_eq!(delta.city.as_deref(), Some("Delta College"));
    }

    #[tokio::test]
    async fn test_blank_university_creates_no_row() {
        let storage = Arc::new(InMemoryStorage::new());
        importer_for(
            storage.clone(),
            Some("- name: Epsilon College\n  state: Goa\n  university: '   '\n"),
        )
        .process(&location())
        .await
        .unwrap();

        let epsilon = storage
            .find_college_by_name("Epsilon College")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(epsilon.replacement_university_id, None);
        assert_eq!(storage.counts().await.unwrap().universities, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_writes() {
        let storage = Arc::new(InMemoryStorage::new());
        let err = importer_for(storage.clone(), None)
            .process(&location())
            .await
            .unwrap_err();

        assert!(matches!(err, ImporterError::Fetch { status: 404, .. }));
        assert_eq!(storage.counts().await.unwrap().colleges, 0);
    }

    #[tokio::test]
    async fn test_malformed_listing_aborts_before_writes() {
        let storage = Arc::new(InMemoryStorage::new());
        let listing = "- name: Fine College\n- name: [broken\n";
        let result = importer_for(storage.clone(), Some(listing))
            .process(&location())
            .await;

        assert!(result.is_err());
        assert_eq!(storage.counts().await.unwrap().colleges, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_but_keeps_earlier_rows() {
        let storage = Arc::new(RefusingStorage {
            inner: InMemoryStorage::new(),
            refuse: "Second College",
        });
        let listing = r#"
- name: First College
- name: Second College
- name: Third College
"#;
        let err = importer_for(storage.clone(), Some(listing))
            .process(&location())
            .await
            .unwrap_err();

        assert!(err.is_constraint_violation());
        let names: Vec<String> = storage
            .list_colleges()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["First College"]);
    }

    #[tokio::test]
    async fn test_import_record_outcomes() {
        let storage = Arc::new(InMemoryStorage::new());
        let importer = importer_for(storage.clone(), None);
        let records = parse_records("- name: Zeta College\n- name: ~\n").unwrap();

        assert!(matches!(
            importer.import_record(&records[0]).await.unwrap(),
            RecordOutcome::Created(_)
        ));
        assert_eq!(
            importer.import_record(&records[0]).await.unwrap(),
            RecordOutcome::SkippedExisting
        );
        assert_eq!(
            importer.import_record(&records[1]).await.unwrap(),
            RecordOutcome::SkippedBlankName
        );
    }
}
