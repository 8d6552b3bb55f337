use std::collections::BTreeMap;

use formkit_core::{
    decode, encode, validate_submission, Answer, AnswerFailure, CodecError, DecodedAnswers,
    QuestionId, Submission, SubmissionId, TemplateId,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::ports::SubmissionRepository;
use crate::LookupError;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),
    #[error("{} answer(s) failed validation", .0.len())]
    Validation(Vec<AnswerFailure>),
    #[error(transparent)]
    Encoding(#[from] CodecError),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

/// A stored submission read back against its template's current questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionView {
    pub submission: Submission,
    pub decoded: DecodedAnswers,
}

pub struct SubmissionService<R> {
    repository: R,
}

impl<R> SubmissionService<R>
where
    R: SubmissionRepository,
{
    #[must_use]
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Validate every answer against the live questions, then store them as one document.
    ///
    /// Empty answers are treated as absent and are not stored.
    ///
    /// # Errors
    /// Returns [`SubmitError::Validation`] with every failing answer when at least
    /// one fails; nothing is stored in that case.
    pub fn submit_answers(
        &mut self,
        template_id: TemplateId,
        submitter_user_id: Option<String>,
        mut answers: BTreeMap<QuestionId, Answer>,
    ) -> Result<SubmissionId, SubmitError> {
        let questions = self
            .repository
            .load_questions_for_template(template_id)
            .map_err(SubmitError::Storage)?
            .ok_or(SubmitError::TemplateNotFound(template_id))?;

        // Blank answers to live questions count as absent; stray keys stay to be reported.
        answers.retain(|question_id, answer| {
            !answer.is_empty() || !questions.iter().any(|question| question.question_id == *question_id)
        });
        if let Err(failures) = validate_submission(&questions, &answers) {
            warn!(%template_id, failures = failures.len(), "submission rejected");
            return Err(SubmitError::Validation(failures));
        }

        let submission = Submission {
            submission_id: SubmissionId::new(),
            template_id,
            submitter_user_id,
            submitted_at: OffsetDateTime::now_utc(),
            answers: encode(&answers)?,
        };
        self.repository.insert_submission(&submission).map_err(SubmitError::Storage)?;

        info!(
            %template_id,
            submission_id = %submission.submission_id,
            answers = submission.answers.len(),
            "submission stored"
        );
        Ok(submission.submission_id)
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] or [`LookupError::Storage`].
    pub fn read_submission(&self, submission_id: SubmissionId) -> Result<SubmissionView, LookupError> {
        let submission = self
            .repository
            .get_submission(submission_id)
            .map_err(LookupError::Storage)?
            .ok_or_else(|| LookupError::NotFound(format!("submission {submission_id}")))?;
        let questions = self
            .repository
            .load_questions_for_template(submission.template_id)
            .map_err(LookupError::Storage)?
            .unwrap_or_default();

        Ok(view(submission, &questions))
    }

    /// # Errors
    /// Returns [`LookupError::NotFound`] for an unknown template or [`LookupError::Storage`].
    pub fn list_submissions(&self, template_id: TemplateId) -> Result<Vec<SubmissionView>, LookupError> {
        let questions = self
            .repository
            .load_questions_for_template(template_id)
            .map_err(LookupError::Storage)?
            .ok_or_else(|| LookupError::NotFound(format!("template {template_id}")))?;

        let submissions =
            self.repository.list_submissions(template_id).map_err(LookupError::Storage)?;
        Ok(submissions.into_iter().map(|submission| view(submission, &questions)).collect())
    }
}

fn view(submission: Submission, questions: &[formkit_core::Question]) -> SubmissionView {
    let decoded = decode(&submission.answers, questions);
    if !decoded.is_complete() {
        warn!(
            submission_id = %submission.submission_id,
            dangling = decoded.dangling.len(),
            mismatched = decoded.mismatched.len(),
            "submission answers no longer match the template"
        );
    }
    SubmissionView { submission, decoded }
}
