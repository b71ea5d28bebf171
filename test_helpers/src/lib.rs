//! Utilities shared by the workspace's test suites.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use observability_deps::tracing;
use parking_lot::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A test helper function for asserting floating point numbers are within the
/// machine epsilon because strict comparison of floating point numbers is
/// incorrect.
pub fn approximately_equal(f1: f64, f2: f64) -> bool {
    (f1 - f2).abs() < f64::EPSILON
}

static LOG_SETUP: Once = Once::new();

/// Enables debug logging if the `RUST_LOG` environment variable is set.
/// Usually, this is the first line of a test that wants log output.
pub fn maybe_start_logging() {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

/// Start logging for the current test, regardless of the environment.
pub fn start_logging() {
    // ensure the global logger is only initialized once
    LOG_SETUP.call_once(|| {
        tracing_log::LogTracer::init().expect("log forwarder installed once");
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("subscriber installed once");
    })
}

/// Extension trait to bound a future with a timeout, panicking with a
/// readable message instead of hanging the test run.
#[async_trait::async_trait]
pub trait FutureTimeout: Sized {
    type Output;

    /// Await the future, panicking if `duration` elapses first.
    async fn with_timeout_panic(self, duration: Duration) -> Self::Output;
}

#[async_trait::async_trait]
impl<F> FutureTimeout for F
where
    F: std::future::Future + Send,
{
    type Output = F::Output;

    async fn with_timeout_panic(self, duration: Duration) -> Self::Output {
        tokio::time::timeout(duration, self)
            .await
            .unwrap_or_else(|_| panic!("future did not complete within {duration:?}"))
    }
}

/// Return a temporary directory that is deleted when the handle drops.
pub fn tmp_dir() -> std::io::Result<tempfile::TempDir> {
    let _ = dotenvy::dotenv();

    let root = std::env::var_os("TEST_TMP_DIR").unwrap_or_else(|| std::env::temp_dir().into());
    tempfile::Builder::new()
        .prefix("mapreduce")
        .tempdir_in(root)
}
