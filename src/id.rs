//! ID generation utilities
//!
//! Job identifiers and scope keys.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a unique generation job ID
///
/// Format: `job-{timestamp_ms}-{random_hex}`
/// Example: `job-1738300800123-a1b2c3d4`
pub fn generate_job_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("job-{}-{:08x}", timestamp, random)
}

/// Derive a stable key for a scheduling scope.
///
/// Departments are sorted before hashing so the key does not depend on the
/// order the caller listed them in.
pub fn scope_key(departments: &[String], first_day: &str, last_day: &str) -> String {
    let mut sorted: Vec<&str> = departments.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(sorted.join(",").as_bytes());
    hasher.update(b"|");
    hasher.update(first_day.as_bytes());
    hasher.update(b"|");
    hasher.update(last_day.as_bytes());
    let digest = hasher.finalize();
    format!("scope-{}", &hex::encode(digest)[..16])
}
