//! Client-supplied desired state of a template tree.
//!
//! Drafts carry only the fields a client may set. Identity, ownership and
//! timestamps are taken from the persisted template, so anything a client sends
//! for them is dropped during deserialization.

use formkit_core::{
    OptionId, Question, QuestionId, QuestionOption, QuestionType, Template, ValidationRules,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionDraft {
    /// `None` asks for a new question.
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    pub text: String,
    #[serde(default)]
    pub description: String,
    pub question_type: QuestionType,
    pub order_index: i64,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionDraft {
    #[serde(default)]
    pub option_id: Option<OptionId>,
    pub text: String,
    pub value: String,
    pub order_index: i64,
}

impl TemplateDraft {
    /// Desired tree for reconciling against `persisted`. Children without an id get a fresh one.
    #[must_use]
    pub fn into_desired(self, persisted: &Template) -> Template {
        let template_id = persisted.template_id;
        Template {
            template_id,
            title: self.title,
            description: self.description,
            author_id: persisted.author_id.clone(),
            created_at: persisted.created_at,
            updated_at: persisted.updated_at,
            questions: self
                .questions
                .into_iter()
                .map(|draft| {
                    let question_id = draft.question_id.unwrap_or_default();
                    Question {
                        question_id,
                        template_id,
                        text: draft.text,
                        description: draft.description,
                        question_type: draft.question_type,
                        order_index: draft.order_index,
                        is_required: draft.is_required,
                        validation_rules: draft.validation_rules,
                        options: draft
                            .options
                            .into_iter()
                            .map(|option| QuestionOption {
                                option_id: option.option_id.unwrap_or_default(),
                                question_id,
                                text: option.text,
                                value: option.value,
                                order_index: option.order_index,
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}

impl From<&Template> for TemplateDraft {
    fn from(template: &Template) -> Self {
        Self {
            title: template.title.clone(),
            description: template.description.clone(),
            questions: template
                .questions
                .iter()
                .map(|question| QuestionDraft {
                    question_id: Some(question.question_id),
                    text: question.text.clone(),
                    description: question.description.clone(),
                    question_type: question.question_type,
                    order_index: question.order_index,
                    is_required: question.is_required,
                    validation_rules: question.validation_rules.clone(),
                    options: question
                        .options
                        .iter()
                        .map(|option| OptionDraft {
                            option_id: Some(option.option_id),
                            text: option.text.clone(),
                            value: option.value.clone(),
                            order_index: option.order_index,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn server_owned_fields_in_payload_are_dropped() -> Result<(), serde_json::Error> {
        let persisted = Template::new("owner", "Original", OffsetDateTime::UNIX_EPOCH);
        let draft: TemplateDraft = serde_json::from_value(json!({
            "template_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "author_id": "intruder",
            "created_at": "2030-01-01T00:00:00Z",
            "title": "Renamed",
            "questions": [
                {"text": "Name", "question_type": "text", "order_index": 0, "template_id": "x"}
            ]
        }))?;

        let desired = draft.into_desired(&persisted);
        assert_eq!(desired.template_id, persisted.template_id);
        assert_eq!(desired.author_id, "owner");
        assert_eq!(desired.created_at, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(desired.questions[0].template_id, persisted.template_id);
        assert!(!desired.questions[0].is_required);
        Ok(())
    }

    #[test]
    fn new_children_get_fresh_ids_and_keep_given_ones() {
        let persisted = Template::new("owner", "Original", OffsetDateTime::UNIX_EPOCH);
        let kept = QuestionId::new();
        let draft = TemplateDraft {
            title: "Two questions".to_string(),
            description: None,
            questions: vec![
                QuestionDraft {
                    question_id: Some(kept),
                    text: "Kept".to_string(),
                    description: String::new(),
                    question_type: QuestionType::Radio,
                    order_index: 0,
                    is_required: true,
                    validation_rules: ValidationRules::new(),
                    options: vec![OptionDraft {
                        option_id: None,
                        text: "Yes".to_string(),
                        value: "yes".to_string(),
                        order_index: 0,
                    }],
                },
                QuestionDraft {
                    question_id: None,
                    text: "Fresh".to_string(),
                    description: String::new(),
                    question_type: QuestionType::Text,
                    order_index: 1,
                    is_required: false,
                    validation_rules: ValidationRules::new(),
                    options: Vec::new(),
                },
            ],
        };

        let desired = draft.into_desired(&persisted);
        assert_eq!(desired.questions[0].question_id, kept);
        assert_eq!(desired.questions[0].options[0].question_id, kept);
        assert_ne!(desired.questions[1].question_id, kept);
    }

    #[test]
    fn draft_from_template_resends_the_same_tree() {
        let mut template = Template::new("owner", "Survey", OffsetDateTime::UNIX_EPOCH);
        template.questions.push(Question {
            question_id: QuestionId::new(),
            template_id: template.template_id,
            text: "Age".to_string(),
            description: String::new(),
            question_type: QuestionType::Number,
            order_index: 0,
            is_required: true,
            validation_rules: ValidationRules::new(),
            options: Vec::new(),
        });

        let resent = TemplateDraft::from(&template).into_desired(&template);
        assert_eq!(resent, template);
    }
}
