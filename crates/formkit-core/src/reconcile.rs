//! Identity-keyed reconciliation of a template tree.
//!
//! The persisted tree is merged with a client's desired tree in three passes:
//! template scalars, questions, then each question's options. Children are
//! matched by identifier only, so reordering a question is an update and never
//! a delete plus insert. Nothing here touches storage; the caller commits the
//! returned [`ChangeSet`] atomically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::schema::RuleKey;
use crate::validation::malformed_rule;
use crate::{OptionId, Question, QuestionId, QuestionOption, Template, MAX_TITLE_CHARS};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum StructuralError {
    #[error("title MUST be non-empty")]
    EmptyTitle,
    #[error("title MUST be at most {MAX_TITLE_CHARS} characters")]
    TitleTooLong,
    #[error("question {0} appears more than once")]
    DuplicateQuestionId(QuestionId),
    #[error("questions {first} and {second} share order_index {order_index}")]
    DuplicateQuestionOrder { order_index: i64, first: QuestionId, second: QuestionId },
    #[error("option {option_id} appears more than once (question {question_id})")]
    DuplicateOptionId { question_id: QuestionId, option_id: OptionId },
    #[error("question {question_id} has two options at order_index {order_index}")]
    DuplicateOptionOrder { question_id: QuestionId, order_index: i64 },
    #[error("question {question_id} has two options with value `{value}`")]
    DuplicateOptionValue { question_id: QuestionId, value: String },
    #[error("order_index {order_index} MUST be >= 0 (question {question_id})")]
    NegativeOrderIndex { question_id: QuestionId, order_index: i64 },
    #[error("rule {rule} of question {question_id} has an unreadable value")]
    MalformedRule { question_id: QuestionId, rule: RuleKey },
}

/// Keys touched at one nesting level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyedDiff<K> {
    pub inserted: Vec<K>,
    pub updated: Vec<K>,
    pub removed: Vec<K>,
}

impl<K> Default for KeyedDiff<K> {
    fn default() -> Self {
        Self { inserted: Vec::new(), updated: Vec::new(), removed: Vec::new() }
    }
}

impl<K> KeyedDiff<K> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    fn absorb(&mut self, other: Self) {
        self.inserted.extend(other.inserted);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

/// Row-level mutations produced by one reconciliation.
///
/// Options of a removed question are not listed; they go with their question.
/// Options of an inserted question are listed as inserted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSet {
    pub template_updated: bool,
    pub questions: KeyedDiff<QuestionId>,
    pub options: KeyedDiff<OptionId>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.template_updated && self.questions.is_empty() && self.options.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub template: Template,
    pub changes: ChangeSet,
}

impl Reconciliation {
    /// True when committing would only restamp `updated_at`.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Merge `desired` into `persisted`.
///
/// `template_id`, `author_id` and `created_at` always come from `persisted`;
/// `updated_at` is set to `now`. An empty desired question list removes every
/// question.
///
/// # Errors
/// Returns [`StructuralError`] when `desired` is malformed. Validation runs
/// before any merge, so a failure leaves nothing half-applied.
pub fn reconcile(
    mut persisted: Template,
    desired: Template,
    now: OffsetDateTime,
) -> Result<Reconciliation, StructuralError> {
    validate_structure(&desired)?;

    let mut changes = ChangeSet {
        template_updated: persisted.title != desired.title
            || persisted.description != desired.description,
        ..ChangeSet::default()
    };
    persisted.title = desired.title;
    persisted.description = desired.description;
    persisted.updated_at = now;

    let template_id = persisted.template_id;
    let question_diff = diff_by_key(
        &mut persisted.questions,
        desired.questions,
        &mut changes,
        |question| question.question_id,
        |question, changes| {
            question.template_id = template_id;
            let desired_options = std::mem::take(&mut question.options);
            reconcile_options(question, desired_options, changes);
        },
        merge_question,
    );
    changes.questions.absorb(question_diff);

    persisted.questions.sort_by_key(|question| question.order_index);
    for question in &mut persisted.questions {
        question.options.sort_by_key(|option| option.order_index);
    }

    Ok(Reconciliation { template: persisted, changes })
}

fn merge_question(existing: &mut Question, desired: Question, changes: &mut ChangeSet) -> bool {
    let changed = existing.text != desired.text
        || existing.description != desired.description
        || existing.question_type != desired.question_type
        || existing.order_index != desired.order_index
        || existing.is_required != desired.is_required
        || existing.validation_rules != desired.validation_rules;

    existing.text = desired.text;
    existing.description = desired.description;
    existing.question_type = desired.question_type;
    existing.order_index = desired.order_index;
    existing.is_required = desired.is_required;
    existing.validation_rules = desired.validation_rules;

    reconcile_options(existing, desired.options, changes);
    changed
}

fn reconcile_options(question: &mut Question, desired: Vec<QuestionOption>, changes: &mut ChangeSet) {
    let question_id = question.question_id;
    let option_diff = diff_by_key(
        &mut question.options,
        desired,
        changes,
        |option| option.option_id,
        |option, _| option.question_id = question_id,
        |existing, desired, _| {
            let changed = existing.text != desired.text
                || existing.value != desired.value
                || existing.order_index != desired.order_index;
            existing.text = desired.text;
            existing.value = desired.value;
            existing.order_index = desired.order_index;
            changed
        },
    );
    changes.options.absorb(option_diff);
}

/// Apply one level of an identity-keyed diff in place.
///
/// Unmatched desired items are adopted and appended, matched ones are merged
/// (reported as updated only when `merge` says something changed), and items
/// from the original persisted set with no desired counterpart are removed.
/// `desired` must not contain duplicate keys.
fn diff_by_key<T, K>(
    persisted: &mut Vec<T>,
    desired: Vec<T>,
    changes: &mut ChangeSet,
    key: impl Fn(&T) -> K,
    mut adopt: impl FnMut(&mut T, &mut ChangeSet),
    mut merge: impl FnMut(&mut T, T, &mut ChangeSet) -> bool,
) -> KeyedDiff<K>
where
    K: Ord + Copy,
{
    let positions =
        persisted.iter().enumerate().map(|(index, item)| (key(item), index)).collect::<BTreeMap<_, _>>();
    let wanted = desired.iter().map(&key).collect::<BTreeSet<_>>();
    let mut diff = KeyedDiff::default();

    for mut item in desired {
        let item_key = key(&item);
        if let Some(&index) = positions.get(&item_key) {
            if merge(&mut persisted[index], item, changes) {
                diff.updated.push(item_key);
            }
        } else {
            adopt(&mut item, changes);
            diff.inserted.push(item_key);
            persisted.push(item);
        }
    }

    persisted.retain(|item| {
        let item_key = key(item);
        let keep = !positions.contains_key(&item_key) || wanted.contains(&item_key);
        if !keep {
            diff.removed.push(item_key);
        }
        keep
    });

    diff
}

fn validate_structure(desired: &Template) -> Result<(), StructuralError> {
    if desired.title.trim().is_empty() {
        return Err(StructuralError::EmptyTitle);
    }
    if desired.title.chars().count() > MAX_TITLE_CHARS {
        return Err(StructuralError::TitleTooLong);
    }

    let mut question_ids = BTreeSet::new();
    let mut question_orders = BTreeMap::new();
    let mut option_ids = BTreeSet::new();

    for question in &desired.questions {
        let question_id = question.question_id;
        if !question_ids.insert(question_id) {
            return Err(StructuralError::DuplicateQuestionId(question_id));
        }
        if question.order_index < 0 {
            return Err(StructuralError::NegativeOrderIndex {
                question_id,
                order_index: question.order_index,
            });
        }
        if let Some(&first) = question_orders.get(&question.order_index) {
            return Err(StructuralError::DuplicateQuestionOrder {
                order_index: question.order_index,
                first,
                second: question_id,
            });
        }
        question_orders.insert(question.order_index, question_id);

        if let Some(rule) = malformed_rule(question) {
            return Err(StructuralError::MalformedRule { question_id, rule });
        }

        let mut option_orders = BTreeSet::new();
        let mut option_values = BTreeSet::new();
        for option in &question.options {
            if !option_ids.insert(option.option_id) {
                return Err(StructuralError::DuplicateOptionId {
                    question_id,
                    option_id: option.option_id,
                });
            }
            if option.order_index < 0 {
                return Err(StructuralError::NegativeOrderIndex {
                    question_id,
                    order_index: option.order_index,
                });
            }
            if !option_orders.insert(option.order_index) {
                return Err(StructuralError::DuplicateOptionOrder {
                    question_id,
                    order_index: option.order_index,
                });
            }
            if !option_values.insert(option.value.as_str()) {
                return Err(StructuralError::DuplicateOptionValue {
                    question_id,
                    value: option.value.clone(),
                });
            }
        }
    }

    Ok(())
}
