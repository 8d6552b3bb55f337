use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use formkit_core::{
    AnswerDocument, OptionId, Question, QuestionId, QuestionOption, QuestionType, Reconciliation,
    Submission, SubmissionId, Template, TemplateId, TemplateSummary, ValidationRules,
};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS templates (
  template_id TEXT PRIMARY KEY,
  title TEXT NOT NULL CHECK (length(trim(title)) > 0),
  description TEXT,
  author_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
  question_id TEXT PRIMARY KEY,
  template_id TEXT NOT NULL,
  text TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT '',
  question_type TEXT NOT NULL CHECK (question_type IN ('text','number','date','dropdown','multi_select','checkbox','radio','paragraph')),
  order_index INTEGER NOT NULL CHECK (order_index >= 0),
  is_required INTEGER NOT NULL CHECK (is_required IN (0, 1)),
  validation_rules_json TEXT NOT NULL DEFAULT '{}',
  FOREIGN KEY (template_id) REFERENCES templates(template_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS question_options (
  option_id TEXT PRIMARY KEY,
  question_id TEXT NOT NULL,
  text TEXT NOT NULL,
  value TEXT NOT NULL,
  order_index INTEGER NOT NULL CHECK (order_index >= 0),
  FOREIGN KEY (question_id) REFERENCES questions(question_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS submissions (
  submission_id TEXT PRIMARY KEY,
  template_id TEXT NOT NULL,
  submitter_user_id TEXT,
  submitted_at TEXT NOT NULL,
  answers_json TEXT NOT NULL,
  FOREIGN KEY (template_id) REFERENCES templates(template_id)
);

CREATE INDEX IF NOT EXISTS idx_questions_template ON questions(template_id);
CREATE INDEX IF NOT EXISTS idx_question_options_question ON question_options(question_id);
CREATE INDEX IF NOT EXISTS idx_submissions_template ON submissions(template_id, submitted_at);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

/// Question and option ids that already name a stored row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChildIdsInUse {
    pub questions: Vec<QuestionId>,
    pub options: Vec<OptionId>,
}

impl ChildIdsInUse {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.options.is_empty()
    }
}

impl SqliteStore {
    /// Open a SQLite-backed form store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus { current_version, target_version: LATEST_SCHEMA_VERSION, pending_versions })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            let tx = self.conn.transaction().context("failed to start migration v1 transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration v1")?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Persist a new template with its whole question tree.
    ///
    /// # Errors
    /// Returns an error when the template id is taken or any write in the transaction fails.
    pub fn create_template(&mut self, template: &Template) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start transaction")?;

        tx.execute(
            "INSERT INTO templates(template_id, title, description, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template.template_id.to_string(),
                template.title,
                template.description,
                template.author_id,
                rfc3339(template.created_at)?,
                rfc3339(template.updated_at)?,
            ],
        )
        .context("failed to insert template")?;

        for question in &template.questions {
            insert_question(&tx, question)?;
            for option in &question.options {
                insert_option(&tx, option)?;
            }
        }

        tx.commit().context("failed to commit template create transaction")?;
        Ok(())
    }

    /// Load a template with its questions and options, children ordered by `order_index`.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn load_template(&self, template_id: TemplateId) -> Result<Option<Template>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start template read transaction")?;

        let header = tx
            .query_row(
                "SELECT template_id, title, description, author_id, created_at, updated_at
                 FROM templates WHERE template_id = ?1",
                params![template_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .context("failed to read template")?;

        let Some((title, description, author_id, created_at, updated_at)) = header else {
            return Ok(None);
        };

        let questions = load_question_tree(&tx, template_id)?;

        Ok(Some(Template {
            template_id,
            title,
            description,
            author_id,
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
            questions,
        }))
    }

    /// Questions of a template with their options; `None` when the template does not exist.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn load_questions_for_template(&self, template_id: TemplateId) -> Result<Option<Vec<Question>>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start question read transaction")?;
        if !template_exists(&tx, template_id)? {
            return Ok(None);
        }
        load_question_tree(&tx, template_id).map(Some)
    }

    /// List template headers, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                t.template_id, t.title, t.description, t.author_id, t.created_at, t.updated_at,
                (SELECT COUNT(*) FROM questions q WHERE q.template_id = t.template_id)
             FROM templates t
             ORDER BY t.created_at DESC, t.template_id ASC",
        )?;

        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let question_count = row.get::<_, i64>(6)?;
            summaries.push(TemplateSummary {
                template_id: parse_id(&row.get::<_, String>(0)?)?,
                title: row.get(1)?,
                description: row.get(2)?,
                author_id: row.get(3)?,
                created_at: parse_rfc3339(&row.get::<_, String>(4)?)?,
                updated_at: parse_rfc3339(&row.get::<_, String>(5)?)?,
                question_count: usize::try_from(question_count)
                    .with_context(|| format!("invalid question count: {question_count}"))?,
            });
        }

        Ok(summaries)
    }

    /// Report which of the given ids are already stored, under any template.
    ///
    /// # Errors
    /// Returns an error when the lookups fail.
    pub fn child_ids_in_use(
        &self,
        question_ids: &[QuestionId],
        option_ids: &[OptionId],
    ) -> Result<ChildIdsInUse> {
        let mut in_use = ChildIdsInUse::default();

        let mut stmt = self.conn.prepare("SELECT 1 FROM questions WHERE question_id = ?1")?;
        for &question_id in question_ids {
            if stmt
                .exists(params![question_id.to_string()])
                .with_context(|| format!("failed to look up question {question_id}"))?
            {
                in_use.questions.push(question_id);
            }
        }

        let mut stmt = self.conn.prepare("SELECT 1 FROM question_options WHERE option_id = ?1")?;
        for &option_id in option_ids {
            if stmt
                .exists(params![option_id.to_string()])
                .with_context(|| format!("failed to look up option {option_id}"))?
            {
                in_use.options.push(option_id);
            }
        }

        Ok(in_use)
    }

    /// Apply a reconciled template tree in one transaction.
    ///
    /// Removals run first so a freed option id may be reused under another
    /// question in the same commit. Any failure rolls back every level.
    ///
    /// # Errors
    /// Returns an error when the template no longer exists, the change set names a
    /// row missing from the reconciled tree, or any write fails.
    pub fn commit_reconciliation(&mut self, reconciliation: &Reconciliation) -> Result<()> {
        let template = &reconciliation.template;
        let changes = &reconciliation.changes;
        let questions = template
            .questions
            .iter()
            .map(|question| (question.question_id, question))
            .collect::<BTreeMap<_, _>>();
        let options = template
            .questions
            .iter()
            .flat_map(|question| question.options.iter())
            .map(|option| (option.option_id, option))
            .collect::<BTreeMap<_, _>>();

        let tx = self.conn.transaction().context("failed to start transaction")?;

        let touched = tx
            .execute(
                "UPDATE templates SET title = ?2, description = ?3, updated_at = ?4
                 WHERE template_id = ?1",
                params![
                    template.template_id.to_string(),
                    template.title,
                    template.description,
                    rfc3339(template.updated_at)?,
                ],
            )
            .context("failed to update template")?;
        if touched != 1 {
            return Err(anyhow!("template {} does not exist", template.template_id));
        }

        for question_id in &changes.questions.removed {
            tx.execute(
                "DELETE FROM questions WHERE question_id = ?1 AND template_id = ?2",
                params![question_id.to_string(), template.template_id.to_string()],
            )
            .with_context(|| format!("failed to delete question {question_id}"))?;
        }

        for option_id in &changes.options.removed {
            tx.execute(
                "DELETE FROM question_options WHERE option_id = ?1",
                params![option_id.to_string()],
            )
            .with_context(|| format!("failed to delete option {option_id}"))?;
        }

        for question_id in &changes.questions.updated {
            update_question(&tx, lookup(&questions, *question_id)?)?;
        }

        for option_id in &changes.options.updated {
            update_option(&tx, lookup(&options, *option_id)?)?;
        }

        for question_id in &changes.questions.inserted {
            insert_question(&tx, lookup(&questions, *question_id)?)?;
        }

        for option_id in &changes.options.inserted {
            insert_option(&tx, lookup(&options, *option_id)?)?;
        }

        tx.commit().context("failed to commit reconciliation transaction")?;
        Ok(())
    }

    /// Persist one submission document.
    ///
    /// # Errors
    /// Returns an error when the template does not exist or the write fails.
    pub fn insert_submission(&mut self, submission: &Submission) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        tx.execute(
            "INSERT INTO submissions(submission_id, template_id, submitter_user_id, submitted_at, answers_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                submission.submission_id.to_string(),
                submission.template_id.to_string(),
                submission.submitter_user_id,
                rfc3339(submission.submitted_at)?,
                submission.answers.to_json_string(),
            ],
        )
        .context("failed to insert submission")?;
        tx.commit().context("failed to commit submission transaction")?;
        Ok(())
    }

    /// # Errors
    /// Returns an error when lookup or document parsing fails.
    pub fn get_submission(&self, submission_id: SubmissionId) -> Result<Option<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT submission_id, template_id, submitter_user_id, submitted_at, answers_json
             FROM submissions WHERE submission_id = ?1",
        )?;
        let row = stmt
            .query_row(params![submission_id.to_string()], SubmissionRow::from_row)
            .optional()?;

        row.map(SubmissionRow::into_submission).transpose()
    }

    /// Submissions of one template in submission order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or a stored document cannot be parsed.
    pub fn list_submissions(&self, template_id: TemplateId) -> Result<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT submission_id, template_id, submitter_user_id, submitted_at, answers_json
             FROM submissions
             WHERE template_id = ?1
             ORDER BY submitted_at ASC, submission_id ASC",
        )?;
        let rows = stmt.query_map(params![template_id.to_string()], SubmissionRow::from_row)?;

        let mut submissions = Vec::new();
        for row in rows {
            submissions.push(row?.into_submission()?);
        }
        Ok(submissions)
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }
}

struct SubmissionRow {
    submission_id: String,
    template_id: String,
    submitter_user_id: Option<String>,
    submitted_at: String,
    answers_json: String,
}

impl SubmissionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            submission_id: row.get(0)?,
            template_id: row.get(1)?,
            submitter_user_id: row.get(2)?,
            submitted_at: row.get(3)?,
            answers_json: row.get(4)?,
        })
    }

    fn into_submission(self) -> Result<Submission> {
        Ok(Submission {
            submission_id: parse_id(&self.submission_id)?,
            template_id: parse_id(&self.template_id)?,
            submitter_user_id: self.submitter_user_id,
            submitted_at: parse_rfc3339(&self.submitted_at)?,
            answers: AnswerDocument::from_json_str(&self.answers_json).with_context(|| {
                format!("failed to parse answers of submission {}", self.submission_id)
            })?,
        })
    }
}

fn load_question_tree(conn: &Connection, template_id: TemplateId) -> Result<Vec<Question>> {
    let mut options_by_question: BTreeMap<QuestionId, Vec<QuestionOption>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT o.option_id, o.question_id, o.text, o.value, o.order_index
             FROM question_options o
             JOIN questions q ON q.question_id = o.question_id
             WHERE q.template_id = ?1
             ORDER BY o.order_index ASC, o.option_id ASC",
        )?;
        let mut rows = stmt.query(params![template_id.to_string()])?;
        while let Some(row) = rows.next()? {
            let option = QuestionOption {
                option_id: parse_id(&row.get::<_, String>(0)?)?,
                question_id: parse_id(&row.get::<_, String>(1)?)?,
                text: row.get(2)?,
                value: row.get(3)?,
                order_index: row.get(4)?,
            };
            options_by_question.entry(option.question_id).or_default().push(option);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT question_id, text, description, question_type, order_index, is_required, validation_rules_json
         FROM questions
         WHERE template_id = ?1
         ORDER BY order_index ASC, question_id ASC",
    )?;
    let mut rows = stmt.query(params![template_id.to_string()])?;
    let mut questions = Vec::new();

    while let Some(row) = rows.next()? {
        let question_id: QuestionId = parse_id(&row.get::<_, String>(0)?)?;
        let question_type_raw: String = row.get(3)?;
        let rules_json: String = row.get(6)?;

        questions.push(Question {
            question_id,
            template_id,
            text: row.get(1)?,
            description: row.get(2)?,
            question_type: QuestionType::parse(&question_type_raw)
                .ok_or_else(|| anyhow!("unknown question_type: {question_type_raw}"))?,
            order_index: row.get(4)?,
            is_required: row.get(5)?,
            validation_rules: serde_json::from_str::<ValidationRules>(&rules_json)
                .with_context(|| format!("failed to deserialize rules of question {question_id}"))?,
            options: options_by_question.remove(&question_id).unwrap_or_default(),
        });
    }

    Ok(questions)
}

fn insert_question(tx: &Transaction<'_>, question: &Question) -> Result<()> {
    tx.execute(
        "INSERT INTO questions(
            question_id, template_id, text, description, question_type,
            order_index, is_required, validation_rules_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            question.question_id.to_string(),
            question.template_id.to_string(),
            question.text,
            question.description,
            question.question_type.as_str(),
            question.order_index,
            question.is_required,
            serde_json::to_string(&question.validation_rules)
                .context("failed to serialize validation rules")?,
        ],
    )
    .with_context(|| format!("failed to insert question {}", question.question_id))?;
    Ok(())
}

fn update_question(tx: &Transaction<'_>, question: &Question) -> Result<()> {
    let touched = tx
        .execute(
            "UPDATE questions SET
                text = ?3, description = ?4, question_type = ?5,
                order_index = ?6, is_required = ?7, validation_rules_json = ?8
             WHERE question_id = ?1 AND template_id = ?2",
            params![
                question.question_id.to_string(),
                question.template_id.to_string(),
                question.text,
                question.description,
                question.question_type.as_str(),
                question.order_index,
                question.is_required,
                serde_json::to_string(&question.validation_rules)
                    .context("failed to serialize validation rules")?,
            ],
        )
        .with_context(|| format!("failed to update question {}", question.question_id))?;
    if touched != 1 {
        return Err(anyhow!("question {} no longer exists", question.question_id));
    }
    Ok(())
}

fn insert_option(tx: &Transaction<'_>, option: &QuestionOption) -> Result<()> {
    tx.execute(
        "INSERT INTO question_options(option_id, question_id, text, value, order_index)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            option.option_id.to_string(),
            option.question_id.to_string(),
            option.text,
            option.value,
            option.order_index,
        ],
    )
    .with_context(|| format!("failed to insert option {}", option.option_id))?;
    Ok(())
}

fn update_option(tx: &Transaction<'_>, option: &QuestionOption) -> Result<()> {
    let touched = tx
        .execute(
            "UPDATE question_options SET text = ?3, value = ?4, order_index = ?5
             WHERE option_id = ?1 AND question_id = ?2",
            params![
                option.option_id.to_string(),
                option.question_id.to_string(),
                option.text,
                option.value,
                option.order_index,
            ],
        )
        .with_context(|| format!("failed to update option {}", option.option_id))?;
    if touched != 1 {
        return Err(anyhow!("option {} no longer exists", option.option_id));
    }
    Ok(())
}

fn lookup<'a, K, V>(rows: &BTreeMap<K, &'a V>, key: K) -> Result<&'a V>
where
    K: Ord + Display,
{
    rows.get(&key)
        .copied()
        .ok_or_else(|| anyhow!("change set names {key} but the reconciled tree does not contain it"))
}

fn template_exists(conn: &Connection, template_id: TemplateId) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM templates WHERE template_id = ?1)",
            params![template_id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if template exists: {template_id}"))?;
    Ok(exists == 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = rfc3339(OffsetDateTime::now_utc())?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

fn parse_id<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = ulid::DecodeError>,
{
    raw.parse::<T>().with_context(|| format!("invalid ULID: {raw}"))
}
