/// Editable fields of admin registrations and the writes built from them
///
/// A registration's `form` lists every field the admin may set, the column it
/// is stored in and how a JSON value is checked before binding. Fields not in
/// the form (timestamps, resolved names) are read-only. Passwords are
/// write-only: a `Password` field is hashed before binding and never read.

use super::ModelAdmin;
use crate::{
    error::{ApiError, ApiResult, ValidationErrorDetail},
    routes::{users::validate_username, REQUIRED},
};
use chrono::{DateTime, Utc};
use prman_shared::auth::password;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use validator::ValidateEmail;

const BLANK: &str = "This field may not be blank.";
const NULL: &str = "This field may not be null.";

/// How a form field is checked and bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text { max_length: Option<usize> },
    Username,
    Email,
    Password,
    Boolean,
    ForeignKey { model: &'static str, nullable: bool },
    Choice {
        #[serde(skip)]
        sql_type: &'static str,
        choices: &'static [&'static str],
    },
    DateTime,
}

/// One editable field of a registration
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FormField {
    pub name: &'static str,

    #[serde(skip)]
    pub column: &'static str,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Must be present when adding an object
    pub required: bool,
}

pub(super) const fn required_field(name: &'static str, column: &'static str, kind: FieldKind) -> FormField {
    FormField {
        name,
        column,
        kind,
        required: true,
    }
}

pub(super) const fn optional_field(name: &'static str, column: &'static str, kind: FieldKind) -> FormField {
    FormField {
        name,
        column,
        kind,
        required: false,
    }
}

/// A checked value ready to bind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Id(Option<Uuid>),
    Choice { value: String, sql_type: &'static str },
    Timestamp(DateTime<Utc>),
}

/// Adding enforces required fields; changing accepts any subset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Change,
}

pub type CleanedForm = Vec<(&'static FormField, FieldValue)>;

/// Checks a submitted object against a registration's form
///
/// Every problem is reported, one detail per field; unknown keys are errors.
pub fn clean(model: &'static ModelAdmin, data: &Map<String, Value>, mode: FormMode) -> ApiResult<CleanedForm> {
    let mut errors = Vec::new();
    let mut cleaned = Vec::new();

    for key in data.keys() {
        if model.form.iter().all(|field| field.name != key) {
            errors.push(ValidationErrorDetail::new(key.as_str(), "Unknown field."));
        }
    }

    for field in model.form {
        match data.get(field.name) {
            Some(raw) => match clean_value(field, raw) {
                Ok(value) => cleaned.push((field, value)),
                Err(message) => errors.push(ValidationErrorDetail::new(field.name, message)),
            },
            None if mode == FormMode::Add && field.required => {
                errors.push(ValidationErrorDetail::new(field.name, REQUIRED));
            }
            None => {}
        }
    }

    if !errors.is_empty() {
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        return Err(ApiError::ValidationError(errors));
    }

    for (field, value) in cleaned.iter_mut() {
        if let (FieldKind::Password, FieldValue::Text(plain)) = (field.kind, &*value) {
            *value = FieldValue::Text(password::hash_password(plain)?);
        }
    }

    Ok(cleaned)
}

fn clean_value(field: &FormField, raw: &Value) -> Result<FieldValue, String> {
    if raw.is_null() {
        return match field.kind {
            FieldKind::ForeignKey { nullable: true, .. } => Ok(FieldValue::Id(None)),
            _ => Err(NULL.to_string()),
        };
    }

    match field.kind {
        FieldKind::Text { max_length } => {
            let text = string(raw)?;
            if field.required && text.is_empty() {
                return Err(BLANK.to_string());
            }
            if let Some(max) = max_length.filter(|max| text.chars().count() > *max) {
                return Err(format!("Ensure this field has no more than {} characters.", max));
            }
            Ok(FieldValue::Text(text.to_string()))
        }
        FieldKind::Username => {
            let username = string(raw)?;
            if username.is_empty() || username.chars().count() > 150 {
                return Err("Ensure this field has between 1 and 150 characters.".to_string());
            }
            validate_username(username)
                .map_err(|e| e.message.map(|m| m.to_string()).unwrap_or_default())?;
            Ok(FieldValue::Text(username.to_string()))
        }
        FieldKind::Email => {
            let email = string(raw)?;
            if !email.validate_email() {
                return Err("Enter a valid email address.".to_string());
            }
            Ok(FieldValue::Text(email.to_string()))
        }
        FieldKind::Password => {
            let plain = string(raw)?;
            if plain.is_empty() {
                return Err(BLANK.to_string());
            }
            Ok(FieldValue::Text(plain.to_string()))
        }
        FieldKind::Boolean => raw
            .as_bool()
            .map(FieldValue::Bool)
            .ok_or_else(|| "Must be a valid boolean.".to_string()),
        FieldKind::ForeignKey { .. } => {
            let id = string(raw)?
                .parse::<Uuid>()
                .map_err(|_| "Must be a valid UUID.".to_string())?;
            Ok(FieldValue::Id(Some(id)))
        }
        FieldKind::Choice { sql_type, choices } => {
            let value = string(raw)?;
            if !choices.contains(&value) {
                return Err(format!("\"{}\" is not a valid choice.", value));
            }
            Ok(FieldValue::Choice {
                value: value.to_string(),
                sql_type,
            })
        }
        FieldKind::DateTime => {
            let at = DateTime::parse_from_rfc3339(string(raw)?)
                .map_err(|_| "Datetime has wrong format. Use RFC 3339.".to_string())?;
            Ok(FieldValue::Timestamp(at.with_timezone(&Utc)))
        }
    }
}

fn string(raw: &Value) -> Result<&str, String> {
    raw.as_str().ok_or_else(|| "Not a valid string.".to_string())
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: FieldValue) {
    match value {
        FieldValue::Text(text) => {
            qb.push_bind(text);
        }
        FieldValue::Bool(flag) => {
            qb.push_bind(flag);
        }
        FieldValue::Id(id) => {
            qb.push_bind(id);
        }
        FieldValue::Timestamp(at) => {
            qb.push_bind(at);
        }
        FieldValue::Choice { value, sql_type } => {
            qb.push_bind(value).push(format!("::{}", sql_type));
        }
    }
}

/// Inserts one row from a cleaned form, returning its id
pub fn insert_query(model: &ModelAdmin, form: CleanedForm) -> QueryBuilder<'static, Postgres> {
    let columns: Vec<&str> = form.iter().map(|(field, _)| field.column).collect();
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        model.table,
        columns.join(", ")
    ));

    for (i, (_, value)) in form.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, value);
    }

    qb.push(") RETURNING id");
    qb
}

/// Updates the submitted columns of one row, returning its id
///
/// `form` must not be empty.
pub fn update_query(model: &ModelAdmin, id: Uuid, form: CleanedForm) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", model.table));

    for (i, (field, value)) in form.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("{} = ", field.column));
        push_value(&mut qb, value);
    }

    if model.tracks_updated_at {
        qb.push(", updated_at = NOW()");
    }

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING id");
    qb
}
