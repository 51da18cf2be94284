use crate::entity::Entity;
use crate::error::{FormError, MutationResult, user_message};
use crate::filter::{as_number, parse_date};
use crate::mutation::{Command, MutationDispatcher};
use crate::resource::ResourceDescriptor;
use crate::tag::Tag;
use crate::transport::{Transport, Verb};
use crate::ui_state::{SubmitTarget, UiState};
use error_stack::{Report, ResultExt};
use itertools::Itertools;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, instrument};

pub type FormResult<T> = Result<T, Report<FormError>>;

/// A rule on one field. Only [`FieldRule::Required`] rejects an empty value; every other
/// rule lets empty values through.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Pattern {
        regex: Arc<Regex>,
        /// Completes "must be ...", e.g. "a valid email address".
        description: &'static str,
    },
    OneOf(Vec<String>),
}

impl FieldRule {
    pub fn pattern(pattern: &str, description: &'static str) -> FormResult<Self> {
        let regex = Regex::new(pattern)
            .change_context(FormError::InvalidPattern)
            .attach_with(|| format!("pattern: {pattern}"))?;
        Ok(FieldRule::Pattern {
            regex: Arc::new(regex),
            description,
        })
    }

    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldRule::OneOf(options.into_iter().map(Into::into).collect())
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        let text = value.and_then(text_of);
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return match self {
                FieldRule::Required if is_blank(value) => Some("is required".to_string()),
                _ => None,
            };
        };

        match self {
            FieldRule::Required => None,
            FieldRule::MinLength(min) if text.chars().count() < *min => {
                Some(format!("must be at least {min} characters"))
            }
            FieldRule::MaxLength(max) if text.chars().count() > *max => {
                Some(format!("must be at most {max} characters"))
            }
            FieldRule::Pattern { regex, description } if !regex.is_match(&text) => {
                Some(format!("must be {description}"))
            }
            FieldRule::OneOf(options) if !options.iter().any(|o| *o == text) => {
                Some(format!("must be one of {}", options.iter().join(", ")))
            }
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CrossFieldRule {
    /// `field` is a date no earlier than the date in `other`.
    DateNotBefore {
        field: &'static str,
        other: &'static str,
    },
    /// `field` is a number no smaller than the number in `other`.
    NotLessThan {
        field: &'static str,
        other: &'static str,
    },
}

impl CrossFieldRule {
    /// Skipped unless both fields parse; the per field rules report missing values.
    fn check(&self, values: &Map<String, Value>) -> Option<(&'static str, String)> {
        match *self {
            CrossFieldRule::DateNotBefore { field, other } => {
                let value = parse_date(values.get(field)?)?;
                let bound = parse_date(values.get(other)?)?;
                (value < bound).then(|| (field, format!("must not be before {other}")))
            }
            CrossFieldRule::NotLessThan { field, other } => {
                let value = as_number(values.get(field)?)?;
                let bound = as_number(values.get(other)?)?;
                (value < bound).then(|| (field, format!("must not be less than {other}")))
            }
        }
    }
}

/// Validation errors keyed by field name.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn push(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_default().push(message);
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .iter()
                .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field} {m}")))
                .join("; ")
        )
    }
}

/// The declared rules of one resource's create/edit form.
#[derive(Debug, Clone, Default)]
pub struct FormSchema {
    fields: Vec<(&'static str, Vec<FieldRule>)>,
    cross_field: Vec<CrossFieldRule>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rules: impl IntoIterator<Item = FieldRule>) -> Self {
        self.fields.push((name, rules.into_iter().collect()));
        self
    }

    pub fn cross_field(mut self, rule: CrossFieldRule) -> Self {
        self.cross_field.push(rule);
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    pub fn validate(&self, values: &Map<String, Value>) -> FieldErrors {
        let mut errors = FieldErrors::default();

        for (name, rules) in &self.fields {
            for rule in rules {
                if let Some(message) = rule.check(values.get(*name)) {
                    errors.push(name, message);
                }
            }
        }

        for rule in &self.cross_field {
            if let Some((field, message)) = rule.check(values) {
                errors.push(field, message);
            }
        }

        errors
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient toast.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    pub fn for_mutation(label: &str, verb: Verb, result: &MutationResult<Entity>) -> Self {
        match result {
            Ok(_) => Notification::success(format!("{label} {} successfully", verb.past_tense())),
            Err(report) => Notification::error(user_message(report)),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SubmitOutcome {
    /// The modal was closed.
    Submitted {
        entity: Entity,
        notification: Notification,
    },
    /// Nothing was sent.
    Invalid(FieldErrors),
    /// The modal stays open with its values.
    Failed { notification: Notification },
}

/// A validated command waiting to be dispatched.
#[derive(Debug, Clone)]
pub enum Prepared {
    Ready(Command),
    Invalid(FieldErrors),
}

/// The submit button of a modal form. Exactly one command per submit, never retried.
///
/// [`CommandSurface::submit`] runs the three phases in one go. They are public on their
/// own so that a caller that drives the network call itself can keep the button
/// disabled in between.
#[derive(Debug, Clone)]
pub struct CommandSurface {
    schema: FormSchema,
    submitting: bool,
}

impl CommandSurface {
    pub fn new(schema: FormSchema) -> Self {
        Self {
            schema,
            submitting: false,
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Validates `values` and builds the command for the open modal.
    /// The surface counts as submitting from a `Ready` result until [`CommandSurface::finish`].
    pub fn prepare(
        &mut self,
        ui: &UiState,
        descriptor: &ResourceDescriptor,
        values: &Map<String, Value>,
    ) -> FormResult<Prepared> {
        if self.submitting {
            return Err(Report::new(FormError::AlreadySubmitting));
        }

        let target = ui
            .begin_submit(descriptor.id_field())
            .change_context(FormError::InvalidTransition)?;

        let errors = self.schema.validate(values);
        if !errors.is_empty() {
            debug!(%errors, "form rejected before submission");
            return Ok(Prepared::Invalid(errors));
        }

        let body = Value::Object(values.clone());
        let command = match target {
            SubmitTarget::Create => Command::create(descriptor, body),
            SubmitTarget::Update(id) => Command::update(descriptor, id, body),
        };

        self.submitting = true;
        Ok(Prepared::Ready(command))
    }

    /// Re-enables the surface and applies the outcome of a dispatched command to `ui`.
    pub fn finish(
        &mut self,
        ui: &mut UiState,
        label: &str,
        verb: Verb,
        result: MutationResult<Entity>,
    ) -> SubmitOutcome {
        self.submitting = false;
        let notification = Notification::for_mutation(label, verb, &result);

        match result {
            Ok(entity) => {
                ui.close();
                SubmitOutcome::Submitted {
                    entity,
                    notification,
                }
            }
            Err(_) => SubmitOutcome::Failed { notification },
        }
    }

    #[instrument(skip_all, name = "form#submit", fields(resource = descriptor.path()))]
    pub async fn submit<T: Transport>(
        &mut self,
        ui: &mut UiState,
        dispatcher: &MutationDispatcher<T>,
        descriptor: &ResourceDescriptor,
        values: &Map<String, Value>,
        extra_tags: &[Tag],
    ) -> FormResult<SubmitOutcome> {
        let command = match self.prepare(ui, descriptor, values)? {
            Prepared::Ready(command) => command.invalidating(extra_tags.iter().cloned()),
            Prepared::Invalid(errors) => return Ok(SubmitOutcome::Invalid(errors)),
        };

        let verb = command.verb();
        let result = {
            let _pending = Pending(&mut self.submitting);
            dispatcher.mutate(command).await
        };
        Ok(self.finish(ui, descriptor.label(), verb, result))
    }
}

/// Re-enables a surface whose submit future is dropped before the mutation resolved.
struct Pending<'a>(&'a mut bool);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(_) => false,
    }
}
