//! Submission answer document encoding.
//!
//! A submission stores all answers as one JSON object keyed by question id.
//! Values are raw JSON primitives, so reading a document back needs the current
//! question list to know which shape each entry has.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{shape_for, AnswerShape};
use crate::validation::{format_iso_date, parse_iso_date};
use crate::{Answer, Question, QuestionId};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CodecError {
    #[error("answer for question {0} is not a finite number")]
    NonFiniteNumber(QuestionId),
    #[error("answer document is not a JSON object: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnswerDocument(pub Map<String, Value>);

impl AnswerDocument {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Parse a stored document.
    ///
    /// # Errors
    /// Returns [`CodecError::Malformed`] when the text is not a JSON object.
    pub fn from_json_str(raw: &str) -> Result<Self, CodecError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(CodecError::Malformed(format!("found {other}"))),
            Err(err) => Err(CodecError::Malformed(err.to_string())),
        }
    }
}

/// Entry whose key no longer names a question of the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DanglingEntry {
    pub key: String,
    pub raw: Value,
}

/// Entry for a live question whose stored value no longer fits its current shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MismatchedEntry {
    pub question_id: QuestionId,
    pub expected: AnswerShape,
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecodedAnswers {
    pub answers: BTreeMap<QuestionId, Answer>,
    /// Kept, not dropped: answers to questions deleted after submission.
    pub dangling: Vec<DanglingEntry>,
    pub mismatched: Vec<MismatchedEntry>,
}

impl DecodedAnswers {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.dangling.is_empty() && self.mismatched.is_empty()
    }
}

/// Encode a submission's answers into one document.
///
/// # Errors
/// Returns [`CodecError::NonFiniteNumber`] for NaN or infinite numbers, which JSON cannot hold.
pub fn encode(answers: &BTreeMap<QuestionId, Answer>) -> Result<AnswerDocument, CodecError> {
    let mut document = Map::new();
    for (&question_id, answer) in answers {
        let raw = match answer {
            Answer::TextValue(text) | Answer::SingleSelection(text) => Value::String(text.clone()),
            Answer::NumberValue(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .ok_or(CodecError::NonFiniteNumber(question_id))?,
            Answer::DateValue(date) => Value::String(format_iso_date(*date)),
            Answer::MultiSelection(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        };
        document.insert(question_id.to_string(), raw);
    }
    Ok(AnswerDocument(document))
}

/// Decode a stored document against the template's current questions.
///
/// Never fails: entries that cannot be matched to a live question, or that no
/// longer fit the question's shape, are returned alongside the decoded answers.
#[must_use]
pub fn decode(document: &AnswerDocument, questions: &[Question]) -> DecodedAnswers {
    let shapes = questions
        .iter()
        .map(|question| (question.question_id, shape_for(question.question_type)))
        .collect::<BTreeMap<_, _>>();

    let mut decoded = DecodedAnswers::default();
    for (key, raw) in &document.0 {
        let Some((question_id, shape)) = key
            .parse::<QuestionId>()
            .ok()
            .and_then(|id| shapes.get(&id).map(|shape| (id, *shape)))
        else {
            decoded.dangling.push(DanglingEntry { key: key.clone(), raw: raw.clone() });
            continue;
        };

        match decode_value(shape, raw) {
            Some(answer) => {
                decoded.answers.insert(question_id, answer);
            }
            None => decoded.mismatched.push(MismatchedEntry {
                question_id,
                expected: shape,
                raw: raw.clone(),
            }),
        }
    }
    decoded
}

fn decode_value(shape: AnswerShape, raw: &Value) -> Option<Answer> {
    match shape {
        AnswerShape::TextValue => raw.as_str().map(|text| Answer::TextValue(text.to_string())),
        AnswerShape::NumberValue => raw.as_f64().map(Answer::NumberValue),
        AnswerShape::DateValue => raw.as_str().and_then(parse_iso_date).map(Answer::DateValue),
        AnswerShape::SingleSelection => {
            raw.as_str().map(|value| Answer::SingleSelection(value.to_string()))
        }
        AnswerShape::MultiSelection => decode_selection_set(raw).map(Answer::MultiSelection),
    }
}

/// Arrays of values, or the older `{"value": true}` flag map.
fn decode_selection_set(raw: &Value) -> Option<BTreeSet<String>> {
    match raw {
        Value::Array(items) => {
            items.iter().map(|item| item.as_str().map(str::to_string)).collect()
        }
        Value::Object(flags) => flags
            .iter()
            .filter_map(|(value, flag)| match flag {
                Value::Bool(true) => Some(Some(value.clone())),
                Value::Bool(false) => None,
                _ => Some(None),
            })
            .collect(),
        _ => None,
    }
}
