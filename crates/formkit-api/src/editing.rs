use formkit_core::{
    reconcile, ChangeSet, OptionId, QuestionId, StructuralError, Template, TemplateId, TemplateSummary,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::authz::Actor;
use crate::draft::TemplateDraft;
use crate::ports::{EditAuthorizer, TemplateRepository};
use crate::LookupError;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("template {0} not found")]
    NotFound(TemplateId),
    #[error("actor `{user_id}` may not edit template {template_id}")]
    Forbidden { user_id: String, template_id: TemplateId },
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("ids already belong to another template: questions {question_ids:?}, options {option_ids:?}")]
    IdConflict { question_ids: Vec<QuestionId>, option_ids: Vec<OptionId> },
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditOutcome {
    pub template: Template,
    pub changes: ChangeSet,
    /// False when the desired tree matched the stored one and nothing was written.
    pub committed: bool,
}

pub struct TemplateEditingService<R, A> {
    repository: R,
    authorizer: A,
}

impl<R, A> TemplateEditingService<R, A>
where
    R: TemplateRepository,
    A: EditAuthorizer,
{
    #[must_use]
    pub fn new(repository: R, authorizer: A) -> Self {
        Self { repository, authorizer }
    }

    /// Create a template owned by `actor`.
    ///
    /// # Errors
    /// Returns [`EditError::Forbidden`] for an anonymous actor,
    /// [`EditError::Structural`] for a malformed draft, [`EditError::IdConflict`]
    /// when a supplied child id is already stored and [`EditError::Storage`]
    /// when the insert fails.
    pub fn create_template(&mut self, actor: &Actor, draft: TemplateDraft) -> Result<Template, EditError> {
        let now = OffsetDateTime::now_utc();
        let shell = Template::new(actor.user_id.clone(), draft.title.clone(), now);
        if actor.user_id.trim().is_empty() {
            warn!(template_id = %shell.template_id, "anonymous actor tried to create a template");
            return Err(EditError::Forbidden {
                user_id: actor.user_id.clone(),
                template_id: shell.template_id,
            });
        }

        let desired = draft.into_desired(&shell);
        let reconciliation = reconcile(shell, desired, now).map_err(|err| {
            warn!(error = %err, "rejected template draft");
            EditError::Structural(err)
        })?;

        self.ensure_fresh_child_ids(&reconciliation.changes)?;
        self.repository.create_template(&reconciliation.template).map_err(EditError::Storage)?;
        info!(
            template_id = %reconciliation.template.template_id,
            author_id = %reconciliation.template.author_id,
            questions = reconciliation.template.questions.len(),
            "template created"
        );
        Ok(reconciliation.template)
    }

    /// Reconcile the stored tree of `template_id` with `draft` and commit the result atomically.
    ///
    /// When the draft matches the stored tree nothing is written and `updated_at`
    /// keeps its stored value; the outcome then reports `committed: false`.
    ///
    /// # Errors
    /// Returns [`EditError::NotFound`], [`EditError::Forbidden`],
    /// [`EditError::Structural`], [`EditError::IdConflict`] or [`EditError::Storage`];
    /// in every case nothing is written.
    pub fn edit_template(
        &mut self,
        actor: &Actor,
        template_id: TemplateId,
        draft: TemplateDraft,
    ) -> Result<EditOutcome, EditError> {
        let persisted = self
            .repository
            .load_template(template_id)
            .map_err(EditError::Storage)?
            .ok_or(EditError::NotFound(template_id))?;

        if !self.authorizer.is_authorized_to_edit(actor, &persisted) {
            warn!(%template_id, user_id = %actor.user_id, "template edit forbidden");
            return Err(EditError::Forbidden { user_id: actor.user_id.clone(), template_id });
        }

        let desired = draft.into_desired(&persisted);
        let reconciliation =
            reconcile(persisted.clone(), desired, OffsetDateTime::now_utc()).map_err(|err| {
                warn!(%template_id, error = %err, "rejected template edit");
                EditError::Structural(err)
            })?;

        if reconciliation.is_noop() {
            info!(%template_id, "template edit had no changes");
            return Ok(EditOutcome { template: persisted, changes: reconciliation.changes, committed: false });
        }

        self.ensure_fresh_child_ids(&reconciliation.changes)?;
        self.repository.commit_reconciliation(&reconciliation).map_err(|err| {
            warn!(%template_id, error = %err, "template edit commit rolled back");
            EditError::Storage(err)
        })?;

        let changes = &reconciliation.changes;
        info!(
            %template_id,
            questions_inserted = changes.questions.inserted.len(),
            questions_updated = changes.questions.updated.len(),
            questions_removed = changes.questions.removed.len(),
            options_inserted = changes.options.inserted.len(),
            options_updated = changes.options.updated.len(),
            options_removed = changes.options.removed.len(),
            "template reconciled"
        );
        Ok(EditOutcome { template: reconciliation.template, changes: reconciliation.changes, committed: true })
    }

    /// Inserted children must not reuse an id stored elsewhere. An option moved
    /// between questions of this template is removed in the same commit, so it passes.
    fn ensure_fresh_child_ids(&self, changes: &ChangeSet) -> Result<(), EditError> {
        let option_ids = changes
            .options
            .inserted
            .iter()
            .copied()
            .filter(|option_id| !changes.options.removed.contains(option_id))
            .collect::<Vec<_>>();
        let in_use = self
            .repository
            .child_ids_in_use(&changes.questions.inserted, &option_ids)
            .map_err(EditError::Storage)?;
        if in_use.is_empty() {
            return Ok(());
        }

        warn!(
            questions = in_use.questions.len(),
            options = in_use.options.len(),
            "draft reuses child ids stored elsewhere"
        );
        Err(EditError::IdConflict { question_ids: in_use.questions, option_ids: in_use.options })
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] or [`LookupError::Storage`].
    pub fn get_template(&self, template_id: TemplateId) -> Result<Template, LookupError> {
        self.repository
            .load_template(template_id)
            .map_err(LookupError::Storage)?
            .ok_or_else(|| LookupError::NotFound(format!("template {template_id}")))
    }

    /// # Errors
    /// Returns [`LookupError::Storage`] when headers cannot be read.
    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>, LookupError> {
        self.repository.list_templates().map_err(LookupError::Storage)
    }
}
