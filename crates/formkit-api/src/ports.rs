//! Collaborators the orchestrators are constructed with.

use anyhow::Result;
use formkit_core::{
    OptionId, Question, QuestionId, Reconciliation, Submission, SubmissionId, Template, TemplateId,
    TemplateSummary,
};
use formkit_store_sqlite::{ChildIdsInUse, SqliteStore};

use crate::authz::Actor;

pub trait TemplateRepository {
    /// # Errors
    /// Returns an error when the tree cannot be persisted.
    fn create_template(&mut self, template: &Template) -> Result<()>;

    /// # Errors
    /// Returns an error when the tree cannot be read.
    fn load_template(&self, template_id: TemplateId) -> Result<Option<Template>>;

    /// Apply every mutation of `reconciliation` or none of them.
    ///
    /// # Errors
    /// Returns an error when the commit fails; nothing is written in that case.
    fn commit_reconciliation(&mut self, reconciliation: &Reconciliation) -> Result<()>;

    /// # Errors
    /// Returns an error when headers cannot be read.
    fn list_templates(&self) -> Result<Vec<TemplateSummary>>;

    /// Which of the given child ids are already stored anywhere.
    ///
    /// # Errors
    /// Returns an error when the lookups fail.
    fn child_ids_in_use(&self, question_ids: &[QuestionId], option_ids: &[OptionId]) -> Result<ChildIdsInUse>;
}

pub trait SubmissionRepository {
    /// Current questions of a template; `None` when the template does not exist.
    ///
    /// # Errors
    /// Returns an error when questions cannot be read.
    fn load_questions_for_template(&self, template_id: TemplateId) -> Result<Option<Vec<Question>>>;

    /// # Errors
    /// Returns an error when the submission cannot be persisted.
    fn insert_submission(&mut self, submission: &Submission) -> Result<()>;

    /// # Errors
    /// Returns an error when the submission cannot be read.
    fn get_submission(&self, submission_id: SubmissionId) -> Result<Option<Submission>>;

    /// # Errors
    /// Returns an error when submissions cannot be read.
    fn list_submissions(&self, template_id: TemplateId) -> Result<Vec<Submission>>;
}

/// Decides whether an already-identified actor may change a template.
pub trait EditAuthorizer {
    fn is_authorized_to_edit(&self, actor: &Actor, template: &Template) -> bool;
}

impl TemplateRepository for SqliteStore {
    fn create_template(&mut self, template: &Template) -> Result<()> {
        SqliteStore::create_template(self, template)
    }

    fn load_template(&self, template_id: TemplateId) -> Result<Option<Template>> {
        SqliteStore::load_template(self, template_id)
    }

    fn commit_reconciliation(&mut self, reconciliation: &Reconciliation) -> Result<()> {
        SqliteStore::commit_reconciliation(self, reconciliation)
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        SqliteStore::list_templates(self)
    }

    fn child_ids_in_use(&self, question_ids: &[QuestionId], option_ids: &[OptionId]) -> Result<ChildIdsInUse> {
        SqliteStore::child_ids_in_use(self, question_ids, option_ids)
    }
}

impl SubmissionRepository for SqliteStore {
    fn load_questions_for_template(&self, template_id: TemplateId) -> Result<Option<Vec<Question>>> {
        SqliteStore::load_questions_for_template(self, template_id)
    }

    fn insert_submission(&mut self, submission: &Submission) -> Result<()> {
        SqliteStore::insert_submission(self, submission)
    }

    fn get_submission(&self, submission_id: SubmissionId) -> Result<Option<Submission>> {
        SqliteStore::get_submission(self, submission_id)
    }

    fn list_submissions(&self, template_id: TemplateId) -> Result<Vec<Submission>> {
        SqliteStore::list_submissions(self, template_id)
    }
}
