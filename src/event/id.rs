// Identifier derivation for tests and runs

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the title digest
const TEST_ID_LEN: usize = 32;

/// Derive a stable test id from the test's full hierarchical title.
///
/// The same title always maps to the same id, in any process, which is what
/// lets events from different runs be aggregated per test.
pub fn test_id_for_title(full_title: &str) -> String {
    let digest = Sha256::digest(full_title.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(TEST_ID_LEN);
    id
}

/// Join ancestor titles and the test's own title the way runners build a full title
pub fn full_title<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate a new run id from the current time and a random suffix
pub fn generate_test_run_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::random();
    format!("{:x}{:08x}", millis, suffix)
}
