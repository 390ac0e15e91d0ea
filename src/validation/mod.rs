//! Request validation: turns a loosely typed field map (JSON object or
//! multipart text fields) into a typed input, or a set of field errors.

pub mod upload;

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::database::models::{ArticleInput, AuthorInput, CategoryInput};

pub use upload::{Upload, UploadRules, ValidUpload};

/// Field name -> first failure message for that field
pub type FieldErrors = HashMap<String, String>;

pub trait Validate: Sized {
    fn validate(fields: &Map<String, Value>) -> Result<Self, FieldErrors>;
}

/// Accumulates errors while reading fields so every failure is reported at once
pub struct Fields<'a> {
    fields: &'a Map<String, Value>,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            errors: FieldErrors::new(),
        }
    }

    fn fail(&mut self, field: &str, message: String) {
        self.errors.entry(field.to_string()).or_insert(message);
    }

    /// Present, non-null and not blank after trimming
    fn present(&self, field: &str) -> Option<&'a Value> {
        match self.fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        }
    }

    pub fn required_string(&mut self, field: &str, max: usize) -> Option<String> {
        if self.present(field).is_none() {
            self.fail(field, format!("The {} field is required.", label(field)));
            return None;
        }
        self.optional_string(field, max)
    }

    pub fn optional_string(&mut self, field: &str, max: usize) -> Option<String> {
        match self.present(field)? {
            Value::String(s) => {
                let s = s.trim();
                if s.chars().count() > max {
                    self.fail(
                        field,
                        format!("The {} may not be greater than {} characters.", label(field), max),
                    );
                    return None;
                }
                Some(s.to_string())
            }
            _ => {
                self.fail(field, format!("The {} must be a string.", label(field)));
                None
            }
        }
    }

    pub fn required_email(&mut self, field: &str, max: usize) -> Option<String> {
        let email = self.required_string(field, max)?;
        if !looks_like_email(&email) {
            self.fail(field, format!("The {} must be a valid email address.", label(field)));
            return None;
        }
        Some(email)
    }

    /// Positive integer id, accepting numeric strings from form fields
    pub fn required_id(&mut self, field: &str) -> Option<i64> {
        let parsed = match self.present(field) {
            None => {
                self.fail(field, format!("The {} field is required.", label(field)));
                return None;
            }
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(id) if id > 0 => Some(id),
            _ => {
                self.fail(field, format!("The {} must be a positive integer.", label(field)));
                None
            }
        }
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

impl Validate for CategoryInput {
    fn validate(fields: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut v = Fields::new(fields);
        let name = v.required_string("name", 255);
        v.into_result()?;
        Ok(Self {
            name: name.unwrap_or_default(),
        })
    }
}

impl Validate for AuthorInput {
    fn validate(fields: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut v = Fields::new(fields);
        let name = v.required_string("name", 255);
        let email = v.required_email("email", 255);
        let bio = v.optional_string("bio", 5000);
        v.into_result()?;
        Ok(Self {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            bio,
        })
    }
}

impl Validate for ArticleInput {
    fn validate(fields: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut v = Fields::new(fields);
        let title = v.required_string("title", 255);
        let content = v.required_string("content", 65_535);
        let category_id = v.required_id("category_id");
        let author_id = v.required_id("author_id");
        v.into_result()?;
        Ok(Self {
            title: title.unwrap_or_default(),
            content: content.unwrap_or_default(),
            category_id: category_id.unwrap_or_default(),
            author_id: author_id.unwrap_or_default(),
        })
    }
}
