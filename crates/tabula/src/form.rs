//! Form entries.
//!
//! A closed set of row kinds for settings-style form screens. Every kind is
//! a variant of [`FormEntry`] and materializes into a [`FormRow`] by pattern
//! matching, so the set of row kinds is checked at compile time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::arguments::{FormAction, FormArguments};
use crate::controller::{ListController, ListControllerBuilder};
use crate::entry::{Entry, RowContext, RowModel, SortKey};
use crate::validation::{Validation, ValidationEvent, check_input_limits};

/// Height of a description row.
pub const DESC_HEIGHT: f32 = 30.0;
/// Height of input, general, selector and date rows.
pub const ROW_HEIGHT: f32 = 40.0;
/// Height of the loading row.
pub const LOADING_HEIGHT: f32 = 60.0;

/// Name of a form field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Create an identifier.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Value held by a form field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// Free text, `None` when never entered.
    Text(Option<String>),
    /// A calendar date.
    Date { day: u8, month: u8, year: i32 },
    /// A toggle.
    Flag(bool),
    /// No value.
    #[default]
    None,
}

impl Value {
    /// A text value.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Some(text.into()))
    }

    /// The text, when this is a non-empty text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(Some(text)) => Some(text),
            _ => None,
        }
    }
}

/// A field-level error shown under its row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{description}")]
pub struct ValueError {
    /// Human readable description.
    pub description: String,
}

impl ValueError {
    /// Create an error with `description`.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// How an input row displays its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputMode {
    #[default]
    Plain,
    Secure,
}

/// Kind of a section separator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SectionKind {
    Normal,
    Legacy,
    Custom(f32),
}

impl SectionKind {
    /// Height of the separator row.
    pub fn height(&self) -> f32 {
        match self {
            Self::Normal | Self::Legacy => 20.0,
            Self::Custom(height) => *height,
        }
    }
}

/// Stable identity of a form row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormEntryId {
    Section(i32),
    Desc { section: i32, index: i32 },
    Input(Identifier),
    General(Identifier),
    Selector(Identifier),
    DateSelector(Identifier),
    Custom(Identifier),
    Loading,
}

impl FormEntryId {
    /// The field identifier, for rows that carry one.
    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Self::Input(identifier)
            | Self::General(identifier)
            | Self::Selector(identifier)
            | Self::DateSelector(identifier)
            | Self::Custom(identifier) => Some(identifier),
            Self::Section(_) | Self::Desc { .. } | Self::Loading => None,
        }
    }
}

/// One row of a form screen.
///
/// Equality covers every displayed field; it is what decides whether a row
/// with unchanged identity is updated.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEntry {
    /// Separator closing `section`.
    Section { section: i32, kind: SectionKind },
    /// Static description text.
    Desc {
        section: i32,
        index: i32,
        text: String,
    },
    /// Editable text field, limited to `limit` characters.
    Input {
        section: i32,
        index: i32,
        identifier: Identifier,
        value: Value,
        error: Option<ValueError>,
        mode: InputMode,
        placeholder: String,
        limit: usize,
    },
    /// Titled row that reports its value when activated.
    General {
        section: i32,
        index: i32,
        identifier: Identifier,
        value: Value,
        error: Option<ValueError>,
        title: String,
    },
    /// Choice among `options`.
    Selector {
        section: i32,
        index: i32,
        identifier: Identifier,
        value: Value,
        error: Option<ValueError>,
        placeholder: String,
        options: Vec<Value>,
    },
    /// Date picker.
    DateSelector {
        section: i32,
        index: i32,
        identifier: Identifier,
        value: Value,
        error: Option<ValueError>,
        placeholder: String,
    },
    /// Host-defined row; `fingerprint` stands in for its payload.
    Custom {
        section: i32,
        index: i32,
        identifier: Identifier,
        value: Value,
        fingerprint: u64,
        height: f32,
    },
    /// Placeholder shown while data loads.
    Loading,
}

/// What a [`FormRow`] displays.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Separator,
    Text(String),
    Input {
        mode: InputMode,
        placeholder: String,
        limit: usize,
    },
    General {
        title: String,
    },
    Selector {
        placeholder: String,
        options: Vec<Value>,
    },
    DateSelector {
        placeholder: String,
    },
    Custom {
        fingerprint: u64,
    },
    Loading,
}

/// Materialized form row view-model.
#[derive(Debug, Clone)]
pub struct FormRow {
    /// Identity of the entry the row was made from.
    pub id: FormEntryId,
    /// What the row displays.
    pub kind: RowKind,
    /// Current value.
    pub value: Value,
    /// Field error, if any.
    pub error: Option<ValueError>,
    /// Row width.
    pub width: f32,
    height: f32,
    arguments: FormArguments,
}

impl FormRow {
    /// The field identifier, for rows that carry one.
    pub fn identifier(&self) -> Option<&Identifier> {
        self.id.identifier()
    }

    /// Character limit of an input row.
    pub fn limit(&self) -> Option<usize> {
        match self.kind {
            RowKind::Input { limit, .. } => Some(limit),
            _ => None,
        }
    }

    /// Activate the row, reporting its current value.
    ///
    /// Separators, descriptions and the loading row ignore activation.
    pub fn activate(&self) {
        if let Some(identifier) = self.identifier() {
            self.arguments.select(identifier.clone(), self.value.clone());
        }
    }

    /// Report `value` as the row's new value and signal a data update.
    pub fn choose(&self, value: Value) {
        if let Some(identifier) = self.identifier() {
            self.arguments.select(identifier.clone(), value);
            self.arguments.data_updated();
        }
    }

    /// Report edited text for an input row.
    pub fn edit(&self, text: impl Into<String>) {
        if matches!(self.kind, RowKind::Input { .. }) {
            self.choose(Value::text(text));
        }
    }
}

impl RowModel for FormRow {
    fn height(&self) -> f32 {
        self.height
    }
}

impl Entry for FormEntry {
    type Id = FormEntryId;
    type Row = FormRow;
    type Arguments = FormArguments;

    fn stable_id(&self) -> FormEntryId {
        match self {
            Self::Section { section, .. } => FormEntryId::Section(*section),
            Self::Desc { section, index, .. } => FormEntryId::Desc {
                section: *section,
                index: *index,
            },
            Self::Input { identifier, .. } => FormEntryId::Input(identifier.clone()),
            Self::General { identifier, .. } => FormEntryId::General(identifier.clone()),
            Self::Selector { identifier, .. } => FormEntryId::Selector(identifier.clone()),
            Self::DateSelector { identifier, .. } => FormEntryId::DateSelector(identifier.clone()),
            Self::Custom { identifier, .. } => FormEntryId::Custom(identifier.clone()),
            Self::Loading => FormEntryId::Loading,
        }
    }

    fn sort_key(&self) -> SortKey {
        match self {
            Self::Section { section, .. } => SortKey::section_separator(*section),
            Self::Desc { section, index, .. }
            | Self::Input { section, index, .. }
            | Self::General { section, index, .. }
            | Self::Selector { section, index, .. }
            | Self::DateSelector { section, index, .. }
            | Self::Custom { section, index, .. } => SortKey::new(*section, *index),
            Self::Loading => SortKey::new(0, 0),
        }
    }

    fn make_row(&self, ctx: &RowContext, arguments: &FormArguments) -> FormRow {
        let (kind, value, error, height) = match self {
            Self::Section { kind, .. } => (RowKind::Separator, Value::None, None, kind.height()),
            Self::Desc { text, .. } => (RowKind::Text(text.clone()), Value::None, None, DESC_HEIGHT),
            Self::Input {
                value,
                error,
                mode,
                placeholder,
                limit,
                ..
            } => (
                RowKind::Input {
                    mode: *mode,
                    placeholder: placeholder.clone(),
                    limit: *limit,
                },
                value.clone(),
                error.clone(),
                ROW_HEIGHT,
            ),
            Self::General {
                value, error, title, ..
            } => (
                RowKind::General {
                    title: title.clone(),
                },
                value.clone(),
                error.clone(),
                ROW_HEIGHT,
            ),
            Self::Selector {
                value,
                error,
                placeholder,
                options,
                ..
            } => (
                RowKind::Selector {
                    placeholder: placeholder.clone(),
                    options: options.clone(),
                },
                value.clone(),
                error.clone(),
                ROW_HEIGHT,
            ),
            Self::DateSelector {
                value,
                error,
                placeholder,
                ..
            } => (
                RowKind::DateSelector {
                    placeholder: placeholder.clone(),
                },
                value.clone(),
                error.clone(),
                ROW_HEIGHT,
            ),
            Self::Custom {
                value,
                fingerprint,
                height,
                ..
            } => (
                RowKind::Custom {
                    fingerprint: *fingerprint,
                },
                value.clone(),
                None,
                *height,
            ),
            Self::Loading => (RowKind::Loading, Value::None, None, LOADING_HEIGHT),
        };

        FormRow {
            id: self.stable_id(),
            kind,
            value,
            error,
            width: ctx.width,
            height,
            arguments: arguments.clone(),
        }
    }
}

/// Field values keyed by identifier.
pub type FormData = HashMap<Identifier, Value>;

/// Turns form data into a validation result.
pub type DataHook = Arc<dyn Fn(&FormData) -> Validation + Send + Sync>;

/// Optional form callbacks held by a controller.
#[derive(Clone, Default)]
pub struct DataHooks {
    /// Judges submitted data once every value fits its input limit.
    pub validate_data: Option<DataHook>,
    /// Reacts to [`FormAction::DataUpdated`] with the current data.
    pub update_data: Option<DataHook>,
}

impl fmt::Debug for DataHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHooks")
            .field("validate_data", &self.validate_data.is_some())
            .field("update_data", &self.update_data.is_some())
            .finish()
    }
}

/// Current value of every identified row.
pub fn collect_values<'a>(rows: impl IntoIterator<Item = &'a FormRow>) -> FormData {
    rows.into_iter()
        .filter_map(|row| row.identifier().map(|identifier| (identifier.clone(), row.value.clone())))
        .collect()
}

impl<S> ListControllerBuilder<S, FormEntry>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Judge data that passed the input limits.
    ///
    /// The result is handled like [`ListController::validate`].
    pub fn validate_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormData) -> Validation + Send + Sync + 'static,
    {
        self.data_hooks.validate_data = Some(Arc::new(hook));
        self
    }

    /// React to data updates reported by rows.
    pub fn update_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FormData) -> Validation + Send + Sync + 'static,
    {
        self.data_hooks.update_data = Some(Arc::new(hook));
        self
    }

    /// Call `hook` with the form data once the first rows are live.
    ///
    /// Runs with the live list locked; use the data it is handed instead of
    /// [`ListController::fetch_data`].
    pub fn did_load<F>(self, hook: F) -> Self
    where
        F: Fn(&FormData) + Send + Sync + 'static,
    {
        self.on_load(move |rows: &[FormRow]| hook(&collect_values(rows)))
    }
}

impl<S> ListController<S, FormEntry>
where
    S: Clone + PartialEq + Send + 'static,
{
    /// Values of every identified row currently in the live list.
    pub fn fetch_data(&self) -> FormData {
        let list = self.list();
        let list = list.lock();
        collect_values(list.iter())
    }

    /// Check every input row against its character limit, then hand the
    /// data to the `validate_data` hook.
    ///
    /// See [`validate_values`](Self::validate_values).
    pub fn validate_input(&self) -> bool {
        self.validate_values(self.fetch_data())
    }

    /// Check `data` against the limits of the input rows it names.
    ///
    /// Each overflowing input is reported with `Shake` and
    /// `InputLimitReached`, followed by one `ScrollTo` for the first of them
    /// in list order. When everything fits, `data` goes to the
    /// `validate_data` hook and its result through
    /// [`validate`](ListController::validate). Returns `true` when every
    /// value fits.
    pub fn validate_values(&self, data: FormData) -> bool {
        let overflows = {
            let list = self.list();
            let list = list.lock();
            check_input_limits(list.iter().filter_map(|row| {
                let identifier = row.identifier()?;
                let limit = row.limit()?;
                Some((identifier, data.get(identifier)?, limit))
            }))
        };

        let events = self.validation_events();
        for (identifier, overflow) in &overflows {
            events.emit(ValidationEvent::Shake {
                identifier: identifier.clone(),
                data: None,
            });
            events.emit(ValidationEvent::InputLimitReached {
                identifier: identifier.clone(),
                overflow: *overflow,
            });
        }
        if let Some((first, _)) = overflows.first() {
            events.emit(ValidationEvent::ScrollTo(first.clone()));
            return false;
        }

        if let Some(hook) = self.data_hooks().validate_data.clone() {
            self.validate(hook(&data));
        }
        true
    }

    /// Hand the current data to the `update_data` hook.
    pub fn update_values(&self) {
        if let Some(hook) = self.data_hooks().update_data.clone() {
            self.validate(hook(&self.fetch_data()));
        }
    }

    /// Route a row action: a selection is validated on its own, a data
    /// update refreshes through the `update_data` hook.
    pub fn handle_action(&self, action: FormAction) {
        match action {
            FormAction::Select(identifier, value) => {
                self.validate_values(FormData::from([(identifier, value)]));
            }
            FormAction::DataUpdated => self.update_values(),
        }
    }
}
