//! Utility functions for the pick-up game service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Lower-case and de-duplicate class names, keeping first-seen order
pub fn normalize_classes<S: AsRef<str>>(classes: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(classes.len());
    for class in classes {
        let class = class.as_ref().trim().to_lowercase();
        if !class.is_empty() && !normalized.contains(&class) {
            normalized.push(class);
        }
    }
    normalized
}

/// Right-justify a label so list output lines up in monospace clients
pub fn rjust(text: &str, width: usize) -> String {
    format!("{:>width$}", text, width = width)
}
