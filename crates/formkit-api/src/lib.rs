use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use formkit_core::{Answer, QuestionId, SubmissionId, Template, TemplateId, TemplateSummary};
use formkit_store_sqlite::{IntegrityReport, SchemaStatus, SqliteStore};

mod authz;
mod draft;
mod editing;
mod ports;
mod submission;

pub use authz::{Actor, OwnerOrAdmin};
pub use draft::{OptionDraft, QuestionDraft, TemplateDraft};
pub use editing::{EditError, EditOutcome, TemplateEditingService};
pub use ports::{EditAuthorizer, SubmissionRepository, TemplateRepository};
pub use submission::{SubmissionService, SubmissionView, SubmitError};

pub const API_CONTRACT_VERSION: &str = "api.v1";

/// Failure of a read-only lookup.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

/// Facade over one `SQLite` file. Every call opens and migrates its own store.
#[derive(Debug, Clone)]
pub struct FormsApi {
    db_path: PathBuf,
}

impl FormsApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        let mut store = SqliteStore::open(&self.db_path)?;
        store.migrate()?;
        Ok(store)
    }

    fn editing(&self) -> Result<TemplateEditingService<SqliteStore, OwnerOrAdmin>> {
        Ok(TemplateEditingService::new(self.open_store()?, OwnerOrAdmin))
    }

    fn submissions(&self) -> Result<SubmissionService<SqliteStore>> {
        Ok(SubmissionService::new(self.open_store()?))
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = SqliteStore::open(&self.db_path)?;
        store.schema_status()
    }

    /// # Errors
    /// Returns an error when the database cannot be opened or an integrity probe fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        self.open_store()?.integrity_check()
    }

    /// # Errors
    /// See [`TemplateEditingService::create_template`].
    pub fn create_template(&self, actor: &Actor, draft: TemplateDraft) -> Result<Template, EditError> {
        self.editing().map_err(EditError::Storage)?.create_template(actor, draft)
    }

    /// # Errors
    /// See [`TemplateEditingService::edit_template`].
    pub fn edit_template(
        &self,
        actor: &Actor,
        template_id: TemplateId,
        draft: TemplateDraft,
    ) -> Result<EditOutcome, EditError> {
        self.editing().map_err(EditError::Storage)?.edit_template(actor, template_id, draft)
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] for an unknown template or [`LookupError::Storage`].
    pub fn get_template(&self, template_id: TemplateId) -> Result<Template, LookupError> {
        self.editing().map_err(LookupError::Storage)?.get_template(template_id)
    }

    /// # Errors
    /// Returns [`LookupError::Storage`] when the store cannot be read.
    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>, LookupError> {
        self.editing().map_err(LookupError::Storage)?.list_templates()
    }

    /// # Errors
    /// See [`SubmissionService::submit_answers`].
    pub fn submit_answers(
        &self,
        template_id: TemplateId,
        submitter_user_id: Option<String>,
        answers: BTreeMap<QuestionId, Answer>,
    ) -> Result<SubmissionId, SubmitError> {
        self.submissions()
            .map_err(SubmitError::Storage)?
            .submit_answers(template_id, submitter_user_id, answers)
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] for an unknown submission or [`LookupError::Storage`].
    pub fn read_submission(&self, submission_id: SubmissionId) -> Result<SubmissionView, LookupError> {
        self.submissions().map_err(LookupError::Storage)?.read_submission(submission_id)
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] for an unknown template or [`LookupError::Storage`].
    pub fn list_submissions(&self, template_id: TemplateId) -> Result<Vec<SubmissionView>, LookupError> {
        self.submissions().map_err(LookupError::Storage)?.list_submissions(template_id)
    }
}

#[cfg(test)]
mod tests {
    use formkit_core::{FailureKind, QuestionType, ValidationRules};

    use super::*;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("formkit-api-{}.sqlite3", ulid::Ulid::new()))
    }

    fn cleanup(db_path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
        }
    }

    fn yes_no_draft() -> TemplateDraft {
        TemplateDraft {
            title: "Attendance".to_string(),
            description: None,
            questions: vec![QuestionDraft {
                question_id: None,
                text: "Will you attend?".to_string(),
                description: String::new(),
                question_type: QuestionType::Radio,
                order_index: 0,
                is_required: true,
                validation_rules: ValidationRules::new(),
                options: ["yes", "no"]
                    .iter()
                    .zip(0_i64..)
                    .map(|(value, order_index)| OptionDraft {
                        option_id: None,
                        text: value.to_uppercase(),
                        value: (*value).to_string(),
                        order_index,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn api_create_submit_and_read_round_trip() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());
        let actor = Actor::user("alice");

        let template = api.create_template(&actor, yes_no_draft())?;
        let question_id = template.questions[0].question_id;

        let submission_id = api.submit_answers(
            template.template_id,
            Some("bob".to_string()),
            BTreeMap::from([(question_id, Answer::SingleSelection("yes".to_string()))]),
        )?;
        let view = api.read_submission(submission_id)?;
        assert_eq!(
            view.decoded.answers.get(&question_id),
            Some(&Answer::SingleSelection("yes".to_string()))
        );

        assert_eq!(api.list_templates()?.len(), 1);
        assert_eq!(api.list_submissions(template.template_id)?.len(), 1);

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_edit_changes_what_later_submissions_accept() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());
        let actor = Actor::user("alice");
        let template = api.create_template(&actor, yes_no_draft())?;
        let question_id = template.questions[0].question_id;

        let mut draft = TemplateDraft::from(&template);
        draft.questions[0].options.push(OptionDraft {
            option_id: None,
            text: "Maybe".to_string(),
            value: "maybe".to_string(),
            order_index: 2,
        });
        let outcome = api.edit_template(&actor, template.template_id, draft)?;
        assert_eq!(outcome.changes.options.inserted.len(), 1);
        assert_eq!(outcome.template.questions[0].question_id, question_id);

        let accepted = api.submit_answers(
            template.template_id,
            None,
            BTreeMap::from([(question_id, Answer::SingleSelection("maybe".to_string()))]),
        );
        assert!(accepted.is_ok());

        let wrong_shape = api.submit_answers(
            template.template_id,
            None,
            BTreeMap::from([(question_id, Answer::NumberValue(1.0))]),
        );
        match wrong_shape {
            Err(SubmitError::Validation(failures)) => {
                assert!(matches!(failures[0].kind, FailureKind::TypeMismatch { .. }));
            }
            other => panic!("expected a type mismatch, got {other:?}"),
        }

        cleanup(&db_path);
        Ok(())
    }

    #[test]
    fn api_reports_schema_and_integrity() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = FormsApi::new(db_path.clone());

        assert_eq!(api.schema_status()?.current_version, 0);
        let report = api.integrity_check()?;
        assert!(report.quick_check_ok);
        assert!(report.schema_status.pending_versions.is_empty());

        cleanup(&db_path);
        Ok(())
    }
}
