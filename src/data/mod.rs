pub mod church;
pub mod class;
pub mod lesson;
pub mod memory;
pub mod mongo;
pub mod operator;
pub mod person;
pub mod report;
pub mod store;

/// Trims a submitted text field, mapping blank input to `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|it| it.trim().to_string())
        .filter(|it| !it.is_empty())
}
