use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

pub mod codec;
pub mod reconcile;
pub mod schema;
pub mod validation;

pub use codec::{
    decode, encode, AnswerDocument, CodecError, DanglingEntry, DecodedAnswers, MismatchedEntry,
};
pub use reconcile::{reconcile, ChangeSet, KeyedDiff, Reconciliation, StructuralError};
pub use schema::{schema_for, shape_for, AnswerShape, RuleKey, TypeSchema};
pub use validation::{
    validate, validate_submission, Answer, AnswerFailure, FailureKind, ValidationResult,
};

/// Longest accepted template title.
pub const MAX_TITLE_CHARS: usize = 255;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(raw).map(Self)
            }
        }
    };
}

ulid_id!(
    /// Stable identity of a form definition. Never reused.
    TemplateId
);
ulid_id!(
    /// Stable identity of one field. Submission answers are keyed by it.
    QuestionId
);
ulid_id!(OptionId);
ulid_id!(SubmissionId);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Number,
    Date,
    Dropdown,
    MultiSelect,
    Checkbox,
    Radio,
    Paragraph,
}

impl QuestionType {
    pub const ALL: [Self; 8] = [
        Self::Text,
        Self::Number,
        Self::Date,
        Self::Dropdown,
        Self::MultiSelect,
        Self::Checkbox,
        Self::Radio,
        Self::Paragraph,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Dropdown => "dropdown",
            Self::MultiSelect => "multi_select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Paragraph => "paragraph",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "dropdown" => Some(Self::Dropdown),
            "multi_select" => Some(Self::MultiSelect),
            "checkbox" => Some(Self::Checkbox),
            "radio" => Some(Self::Radio),
            "paragraph" => Some(Self::Paragraph),
            _ => None,
        }
    }
}

/// Schema-less rule document attached to a question. Unknown keys are kept as-is.
pub type ValidationRules = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOption {
    pub option_id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub value: String,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question_id: QuestionId,
    pub template_id: TemplateId,
    pub text: String,
    #[serde(default)]
    pub description: String,
    pub question_type: QuestionType,
    pub order_index: i64,
    pub is_required: bool,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Option values legal for a selection answer.
    pub fn option_values(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub template_id: TemplateId,
    pub title: String,
    pub description: Option<String>,
    pub author_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Template {
    /// An empty template owned by `author_id`, used as the persisted side when creating.
    #[must_use]
    pub fn new(author_id: impl Into<String>, title: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            template_id: TemplateId::new(),
            title: title.into(),
            description: None,
            author_id: author_id.into(),
            created_at: now,
            updated_at: now,
            questions: Vec::new(),
        }
    }

    #[must_use]
    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| question.question_id == question_id)
    }
}

/// Template header without its question tree, as listed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateSummary {
    pub template_id: TemplateId,
    pub title: String,
    pub description: Option<String>,
    pub author_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub question_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub template_id: TemplateId,
    pub submitter_user_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub answers: AnswerDocument,
}
