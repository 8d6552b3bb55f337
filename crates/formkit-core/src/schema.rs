//! Static question-type table.
//!
//! Every other component asks this module which answer shape a question type
//! accepts and which rule keys it understands. Adding a question type means one
//! new [`QuestionType`] member plus one row in [`schema_for`].

use serde::{Deserialize, Serialize};

use crate::QuestionType;

/// The single value slot an answer may populate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    TextValue,
    NumberValue,
    DateValue,
    /// Exactly one of the question's current option values.
    SingleSelection,
    /// Any subset of the question's current option values.
    MultiSelection,
}

impl AnswerShape {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextValue => "text_value",
            Self::NumberValue => "number_value",
            Self::DateValue => "date_value",
            Self::SingleSelection => "single_selection",
            Self::MultiSelection => "multi_selection",
        }
    }

    /// Selection shapes draw their legal values from the question's options.
    #[must_use]
    pub fn is_selection(self) -> bool {
        matches!(self, Self::SingleSelection | Self::MultiSelection)
    }
}

/// Known keys of a question's rule document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RuleKey {
    #[serde(rename = "minLength")]
    MinLength,
    #[serde(rename = "maxLength")]
    MaxLength,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "minDate")]
    MinDate,
    #[serde(rename = "maxDate")]
    MaxDate,
    #[serde(rename = "minSelected")]
    MinSelected,
    #[serde(rename = "maxSelected")]
    MaxSelected,
}

impl RuleKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Min => "min",
            Self::Max => "max",
            Self::MinDate => "minDate",
            Self::MaxDate => "maxDate",
            Self::MinSelected => "minSelected",
            Self::MaxSelected => "maxSelected",
        }
    }

    /// Kind of JSON value the rule expects.
    #[must_use]
    pub fn operand(self) -> RuleOperand {
        match self {
            Self::MinLength | Self::MaxLength | Self::MinSelected | Self::MaxSelected => {
                RuleOperand::Count
            }
            Self::Min | Self::Max => RuleOperand::Number,
            Self::MinDate | Self::MaxDate => RuleOperand::Date,
        }
    }
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RuleOperand {
    /// Non-negative integer.
    Count,
    /// Finite JSON number.
    Number,
    /// `YYYY-MM-DD` string.
    Date,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TypeSchema {
    pub shape: AnswerShape,
    /// Rule keys the validation engine applies for this type; any other key is ignored.
    pub rules: &'static [RuleKey],
}

const TEXT_RULES: &[RuleKey] = &[RuleKey::MinLength, RuleKey::MaxLength];
const NUMBER_RULES: &[RuleKey] = &[RuleKey::Min, RuleKey::Max];
const DATE_RULES: &[RuleKey] = &[RuleKey::MinDate, RuleKey::MaxDate];
const MULTI_RULES: &[RuleKey] = &[RuleKey::MinSelected, RuleKey::MaxSelected];

#[must_use]
pub fn schema_for(question_type: QuestionType) -> TypeSchema {
    match question_type {
        QuestionType::Text | QuestionType::Paragraph => {
            TypeSchema { shape: AnswerShape::TextValue, rules: TEXT_RULES }
        }
        QuestionType::Number => TypeSchema { shape: AnswerShape::NumberValue, rules: NUMBER_RULES },
        QuestionType::Date => TypeSchema { shape: AnswerShape::DateValue, rules: DATE_RULES },
        QuestionType::Dropdown | QuestionType::Radio => {
            TypeSchema { shape: AnswerShape::SingleSelection, rules: &[] }
        }
        QuestionType::MultiSelect | QuestionType::Checkbox => {
            TypeSchema { shape: AnswerShape::MultiSelection, rules: MULTI_RULES }
        }
    }
}

#[must_use]
pub fn shape_for(question_type: QuestionType) -> AnswerShape {
    schema_for(question_type).shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_family_maps_to_selection_shapes() {
        for question_type in QuestionType::ALL {
            let expects_options = matches!(
                question_type,
                QuestionType::Dropdown
                    | QuestionType::MultiSelect
                    | QuestionType::Checkbox
                    | QuestionType::Radio
            );
            assert_eq!(shape_for(question_type).is_selection(), expects_options, "{question_type:?}");
        }
    }

    #[test]
    fn multi_select_and_checkbox_share_a_shape() {
        assert_eq!(shape_for(QuestionType::MultiSelect), AnswerShape::MultiSelection);
        assert_eq!(shape_for(QuestionType::Checkbox), AnswerShape::MultiSelection);
        assert_eq!(shape_for(QuestionType::Paragraph), AnswerShape::TextValue);
    }

    #[test]
    fn rule_key_serde_uses_document_names() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&RuleKey::MinSelected)?, "\"minSelected\"");
        let parsed: RuleKey = serde_json::from_str("\"maxDate\"")?;
        assert_eq!(parsed, RuleKey::MaxDate);
        Ok(())
    }
}
