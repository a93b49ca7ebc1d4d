//! Validation results as data.
//!
//! A screen's "done" handler returns a [`Validation`] instead of throwing or
//! poking at rows. [`process_validation`] turns it into a stream of
//! [`ValidationEvent`]s the host reacts to: show an alert, shake a field,
//! navigate back. A [`FailResult::Deferred`] result hands a continuation to
//! asynchronous work, which reports its own validation when it finishes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::form::{Identifier, Value};

/// What to do after a successful validation.
#[derive(Clone)]
pub enum Behaviour {
    /// Close the screen.
    NavigateBack,
    /// Close the screen with a push-style animation.
    NavigateBackWithPush,
    /// Run a host-provided action.
    Custom(Arc<dyn Fn() + Send + Sync>),
}

impl fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NavigateBack => write!(f, "NavigateBack"),
            Self::NavigateBackWithPush => write!(f, "NavigateBackWithPush"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// How a failing field is highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailAction {
    Shake,
    /// Shake and attach `data` for the row to display.
    ShakeWithData(String),
}

/// Continuation receiving the outcome of deferred validation.
pub type Continuation = Box<dyn FnOnce(Validation) + Send>;

/// Why validation failed.
pub enum FailResult {
    /// Show a message.
    Alert(String),
    /// Highlight individual fields.
    Fields(BTreeMap<Identifier, FailAction>),
    /// Show `text` under the field `identifier`.
    TextAfter { text: String, identifier: Identifier },
    /// Validation continues asynchronously; the closure reports the outcome
    /// through the continuation it receives.
    Deferred(Box<dyn FnOnce(Continuation) + Send>),
    /// Fail silently.
    None,
}

impl fmt::Debug for FailResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert(text) => f.debug_tuple("Alert").field(text).finish(),
            Self::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Self::TextAfter { text, identifier } => f
                .debug_struct("TextAfter")
                .field("text", text)
                .field("identifier", identifier)
                .finish(),
            Self::Deferred(_) => write!(f, "Deferred(..)"),
            Self::None => write!(f, "None"),
        }
    }
}

/// The outcome of validating a screen.
#[derive(Debug)]
pub enum Validation {
    Success(Behaviour),
    Fail(FailResult),
    /// Nothing to do.
    None,
}

impl Validation {
    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Fail with an alert.
    pub fn alert(text: impl Into<String>) -> Self {
        Self::Fail(FailResult::Alert(text.into()))
    }

    /// Fail by shaking a single field.
    pub fn shake(identifier: impl Into<Identifier>) -> Self {
        Self::Fail(FailResult::Fields(BTreeMap::from([(
            identifier.into(),
            FailAction::Shake,
        )])))
    }

    /// Continue asynchronously.
    pub fn deferred<F>(work: F) -> Self
    where
        F: FnOnce(Continuation) + Send + 'static,
    {
        Self::Fail(FailResult::Deferred(Box::new(work)))
    }
}

/// What the host should do in response to a validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    /// Show an alert.
    Alert(String),
    /// Shake a field, optionally attaching data to it.
    Shake {
        identifier: Identifier,
        data: Option<String>,
    },
    /// Scroll the list so the field is visible.
    ScrollTo(Identifier),
    /// Show text under a field.
    TextAfter { text: String, identifier: Identifier },
    /// Close the screen.
    NavigateBack { with_push: bool },
    /// A custom success action ran.
    Completed,
    /// An input holds `overflow` characters more than its limit allows.
    InputLimitReached {
        identifier: Identifier,
        overflow: usize,
    },
}

/// Receiver of validation events.
pub type ValidationSink = Arc<dyn Fn(ValidationEvent) + Send + Sync>;

/// Turn `validation` into events delivered to `sink`.
///
/// Deferred results hand a continuation to their work and return at once;
/// the events of the eventual outcome reach `sink` from whichever thread
/// calls the continuation.
pub fn process_validation(validation: Validation, sink: &ValidationSink) {
    match validation {
        Validation::None => {}
        Validation::Success(behaviour) => match behaviour {
            Behaviour::NavigateBack => sink(ValidationEvent::NavigateBack { with_push: false }),
            Behaviour::NavigateBackWithPush => {
                sink(ValidationEvent::NavigateBack { with_push: true })
            }
            Behaviour::Custom(action) => {
                action();
                sink(ValidationEvent::Completed);
            }
        },
        Validation::Fail(result) => match result {
            FailResult::Alert(text) => sink(ValidationEvent::Alert(text)),
            FailResult::Fields(fields) => {
                for (identifier, action) in fields {
                    let data = match action {
                        FailAction::Shake => None,
                        FailAction::ShakeWithData(data) => Some(data),
                    };
                    sink(ValidationEvent::Shake { identifier, data });
                }
            }
            FailResult::TextAfter { text, identifier } => {
                sink(ValidationEvent::TextAfter { text, identifier })
            }
            FailResult::Deferred(work) => {
                tracing::trace!(target: "tabula::validation", "validation deferred");
                let sink = sink.clone();
                work(Box::new(move |next| process_validation(next, &sink)));
            }
            FailResult::None => {}
        },
    }
}

/// Number of characters `value` holds beyond `limit`, if any.
pub fn input_overflow(value: &Value, limit: usize) -> Option<usize> {
    let length = value.as_text().map_or(0, |text| text.chars().count());
    (length > limit).then(|| length - limit)
}

/// Inputs whose text exceeds their limit, with the overflow, in input order.
pub fn check_input_limits<'a>(
    inputs: impl IntoIterator<Item = (&'a Identifier, &'a Value, usize)>,
) -> Vec<(Identifier, usize)> {
    inputs
        .into_iter()
        .filter_map(|(identifier, value, limit)| {
            input_overflow(value, limit).map(|overflow| (identifier.clone(), overflow))
        })
        .collect()
}
