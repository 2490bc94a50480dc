use crate::error::StoreError;

/// Separates the project id from the data point id in composite keys.
/// ASCII Unit Separator, so ids may contain ':' and '/'.
pub const SEPARATOR: char = '\x1F';

/// Build the key for a per-point record.
/// Format: `{project}\x1F{point}`
pub fn point_key(project_id: &str, point_id: &str) -> Result<String, StoreError> {
    check(project_id)?;
    check(point_id)?;
    Ok(format!("{project_id}{SEPARATOR}{point_id}"))
}

/// Return the prefix shared by all per-point records of a project.
/// Format: `{project}\x1F`
pub fn project_prefix(project_id: &str) -> Result<String, StoreError> {
    check(project_id)?;
    Ok(format!("{project_id}{SEPARATOR}"))
}

fn check(component: &str) -> Result<(), StoreError> {
    if component.is_empty() || component.contains(SEPARATOR) {
        return Err(StoreError::InvalidKey(component.to_string()));
    }
    Ok(())
}
