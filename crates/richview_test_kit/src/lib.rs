//! Fixture helpers shared by the integration tests of the workspace.

/// Reads a response fixture. Line endings are normalised to `\n` so that
/// fixtures behave the same on every checkout.
///
/// Panics when the file cannot be read.
pub async fn fixture(path: &str) -> String {
    let content = tokio::fs::read_to_string(path)
        .await
        .unwrap_or_else(|e| panic!("Cannot read fixture {path}: {e}"));
    content.replace("\r\n", "\n")
}

/// Reads a fixture relative to the calling crate's manifest directory.
///
/// ```ignore
/// let response = fixture!("tests/fixtures/report.md").await;
/// ```
#[macro_export]
macro_rules! fixture {
    ($path:expr) => {
        $crate::fixture(&format!("{}/{}", env!("CARGO_MANIFEST_DIR"), $path))
    };
}
