//! Owner identity for lock records.

/// Default owner identity for this machine: `user@HOST`.
///
/// Stable across invocations on the same host, so a lock taken by one
/// `taglock` process can be renewed or released by a later one. Callers that
/// run several concurrent acquirers on one host must pass distinct owners.
pub fn default_owner_id() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
