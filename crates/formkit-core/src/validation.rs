use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::schema::{schema_for, AnswerShape, RuleKey, RuleOperand};
use crate::{Question, QuestionId};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// One typed value supplied for one question. Exactly one slot is ever populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum Answer {
    TextValue(String),
    NumberValue(f64),
    DateValue(#[serde(with = "iso_date")] Date),
    SingleSelection(String),
    MultiSelection(BTreeSet<String>),
}

impl Answer {
    #[must_use]
    pub fn shape(&self) -> AnswerShape {
        match self {
            Self::TextValue(_) => AnswerShape::TextValue,
            Self::NumberValue(_) => AnswerShape::NumberValue,
            Self::DateValue(_) => AnswerShape::DateValue,
            Self::SingleSelection(_) => AnswerShape::SingleSelection,
            Self::MultiSelection(_) => AnswerShape::MultiSelection,
        }
    }

    /// Blank text, a blank selection and an empty selection set count as no answer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::TextValue(text) | Self::SingleSelection(text) => text.trim().is_empty(),
            Self::MultiSelection(values) => values.is_empty(),
            Self::NumberValue(_) | Self::DateValue(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    #[error("an answer is required")]
    MissingRequiredAnswer,
    #[error("expected {} but received {}", .expected.as_str(), .found.as_str())]
    TypeMismatch { expected: AnswerShape, found: AnswerShape },
    #[error("`{value}` is not one of the question's options")]
    UnknownOption { value: String },
    #[error("rule {rule} failed: {detail}")]
    RuleViolation { rule: RuleKey, detail: String },
    #[error("number must be finite")]
    InvalidNumber,
    #[error("question does not belong to this template")]
    UnknownQuestion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("question {question_id}: {kind}")]
pub struct AnswerFailure {
    pub question_id: QuestionId,
    #[serde(flatten)]
    pub kind: FailureKind,
}

pub type ValidationResult = Result<(), AnswerFailure>;

/// Validate one answer (or its absence) against one question.
///
/// Checks run in a fixed order and stop at the first failure: presence,
/// shape, option membership, then the rule document.
///
/// # Errors
/// Returns the first [`AnswerFailure`] found for this question.
pub fn validate(question: &Question, answer: Option<&Answer>) -> ValidationResult {
    let fail = |kind| Err(AnswerFailure { question_id: question.question_id, kind });

    let Some(answer) = answer.filter(|answer| !answer.is_empty()) else {
        return if question.is_required { fail(FailureKind::MissingRequiredAnswer) } else { Ok(()) };
    };

    let schema = schema_for(question.question_type);
    if answer.shape() != schema.shape {
        return fail(FailureKind::TypeMismatch { expected: schema.shape, found: answer.shape() });
    }

    match answer {
        Answer::NumberValue(number) if !number.is_finite() => {
            return fail(FailureKind::InvalidNumber);
        }
        Answer::SingleSelection(value) => {
            if !question.option_values().any(|known| known == value.as_str()) {
                return fail(FailureKind::UnknownOption { value: value.clone() });
            }
        }
        Answer::MultiSelection(values) => {
            let known = question.option_values().collect::<BTreeSet<_>>();
            if let Some(value) = values.iter().find(|value| !known.contains(&value.as_str())) {
                return fail(FailureKind::UnknownOption { value: value.clone() });
            }
        }
        _ => {}
    }

    for &rule in schema.rules {
        if let Some(detail) = rule_violation(question, rule, answer) {
            return fail(FailureKind::RuleViolation { rule, detail });
        }
    }

    Ok(())
}

/// Validate a whole submission: every question of the template plus every supplied answer.
///
/// # Errors
/// Returns every failure found, ordered by question position then by stray answer id.
pub fn validate_submission(
    questions: &[Question],
    answers: &BTreeMap<QuestionId, Answer>,
) -> Result<(), Vec<AnswerFailure>> {
    let mut failures = questions
        .iter()
        .filter_map(|question| validate(question, answers.get(&question.question_id)).err())
        .collect::<Vec<_>>();

    let known = questions.iter().map(|question| question.question_id).collect::<BTreeSet<_>>();
    failures.extend(answers.keys().filter(|id| !known.contains(*id)).map(|&question_id| {
        AnswerFailure { question_id, kind: FailureKind::UnknownQuestion }
    }));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// First known rule of `question` whose value cannot be read as its operand kind.
pub(crate) fn malformed_rule(question: &Question) -> Option<RuleKey> {
    schema_for(question.question_type).rules.iter().copied().find(|&rule| {
        question
            .validation_rules
            .get(rule.as_str())
            .is_some_and(|value| !operand_is_readable(rule.operand(), value))
    })
}

fn operand_is_readable(operand: RuleOperand, value: &Value) -> bool {
    match operand {
        RuleOperand::Count => value.as_u64().is_some(),
        RuleOperand::Number => value.as_f64().is_some_and(f64::is_finite),
        RuleOperand::Date => value.as_str().and_then(parse_iso_date).is_some(),
    }
}

fn rule_violation(question: &Question, rule: RuleKey, answer: &Answer) -> Option<String> {
    let operand = question.validation_rules.get(rule.as_str())?;

    match (rule, answer) {
        (RuleKey::MinLength, Answer::TextValue(text)) => {
            let limit = operand.as_u64()?;
            let length = to_u64(text.chars().count());
            (length < limit).then(|| format!("length {length} is below {limit}"))
        }
        (RuleKey::MaxLength, Answer::TextValue(text)) => {
            let limit = operand.as_u64()?;
            let length = to_u64(text.chars().count());
            (length > limit).then(|| format!("length {length} exceeds {limit}"))
        }
        (RuleKey::Min, Answer::NumberValue(number)) => {
            let limit = operand.as_f64()?;
            (*number < limit).then(|| format!("{number} is below {limit}"))
        }
        (RuleKey::Max, Answer::NumberValue(number)) => {
            let limit = operand.as_f64()?;
            (*number > limit).then(|| format!("{number} exceeds {limit}"))
        }
        (RuleKey::MinDate, Answer::DateValue(date)) => {
            let limit = operand.as_str().and_then(parse_iso_date)?;
            (*date < limit).then(|| format!("{date} is before {limit}"))
        }
        (RuleKey::MaxDate, Answer::DateValue(date)) => {
            let limit = operand.as_str().and_then(parse_iso_date)?;
            (*date > limit).then(|| format!("{date} is after {limit}"))
        }
        (RuleKey::MinSelected, Answer::MultiSelection(values)) => {
            let limit = operand.as_u64()?;
            let count = to_u64(values.len());
            (count < limit).then(|| format!("{count} selected, at least {limit} required"))
        }
        (RuleKey::MaxSelected, Answer::MultiSelection(values)) => {
            let limit = operand.as_u64()?;
            let count = to_u64(values.len());
            (count > limit).then(|| format!("{count} selected, at most {limit} allowed"))
        }
        _ => None,
    }
}

fn to_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

pub(crate) fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw, time::macros::format_description!("[year]-[month]-[day]")).ok()
}

pub(crate) fn format_iso_date(date: Date) -> String {
    date.format(time::macros::format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
