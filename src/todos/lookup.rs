use crate::error::ValidationError;

/// Smallest todo id the API serves.
pub const MIN_TODO_ID: u32 = 1;
/// Largest todo id the API serves.
pub const MAX_TODO_ID: u32 = 200;

/// Parses a typed todo id.
///
/// Surrounding whitespace is ignored. Anything that is not an integer in
/// `MIN_TODO_ID..=MAX_TODO_ID` is rejected.
///
/// # Errors
///
/// Returns [`ValidationError::NotAnInteger`] or
/// [`ValidationError::OutOfRange`].
///
/// # Example
///
/// ```
/// use todo_query::todos::parse_todo_id;
///
/// assert_eq!(parse_todo_id(" 42 "), Ok(42));
/// assert!(parse_todo_id("0").is_err());
/// assert!(parse_todo_id("abc").is_err());
/// ```
pub fn parse_todo_id(text: &str) -> Result<u32, ValidationError> {
    let trimmed = text.trim();
    let id: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::NotAnInteger(trimmed.to_string()))?;

    let out_of_range = ValidationError::OutOfRange {
        id,
        min: MIN_TODO_ID,
        max: MAX_TODO_ID,
    };
    if id < i64::from(MIN_TODO_ID) || id > i64::from(MAX_TODO_ID) {
        return Err(out_of_range);
    }
    u32::try_from(id).map_err(|_| out_of_range)
}

/// Inputs of the lookup view: the typed id and whether it was submitted.
///
/// Editing the id withdraws the request, so a new id is only fetched after
/// another [`submit`](Self::submit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoLookup {
    id_text: String,
    requested: bool,
}

impl Default for TodoLookup {
    fn default() -> Self {
        Self {
            id_text: MIN_TODO_ID.to_string(),
            requested: false,
        }
    }
}

impl TodoLookup {
    pub fn id_text(&self) -> &str {
        &self.id_text
    }

    pub fn set_id(&mut self, text: impl Into<String>) {
        self.id_text = text.into();
        self.requested = false;
    }

    pub fn submit(&mut self) {
        self.requested = true;
    }

    pub fn parsed_id(&self) -> Result<u32, ValidationError> {
        parse_todo_id(&self.id_text)
    }

    pub fn is_valid(&self) -> bool {
        self.parsed_id().is_ok()
    }

    pub const fn is_requested(&self) -> bool {
        self.requested
    }
}
