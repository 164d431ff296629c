// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Test execution: logging setup, assertions and the setup/test/teardown cycle.

use anyhow::Result;
use chrono::Local;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::device::AndroidDevice;

/// A test assertion that did not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TestFailure(pub String);

/// Fail the running test with `message`.
pub fn fail(message: impl Into<String>) -> anyhow::Error {
    TestFailure(message.into()).into()
}

/// Fail the running test with `message` unless `condition` holds.
pub fn assert_true(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(fail(message))
    }
}

/// Timestamp in the format used to name per-test log artifacts.
pub fn log_file_timestamp() -> String {
    Local::now().format("%m-%d-%Y_%H-%M-%S-%3f").to_string()
}

/// Initialize logging for a test binary.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("snippet_bt_e2e=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

/// One test with per-test setup and teardown.
#[allow(async_fn_in_trait)]
pub trait TestCase {
    fn name(&self) -> &str;

    /// Preconditions for the test body.
    async fn setup_test(&mut self) -> Result<()>;

    /// The test body.
    async fn run(&mut self) -> Result<()>;

    /// Cleanup, run whatever happened before it.
    async fn teardown_test(&mut self) -> Result<()>;
}

/// Result of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    /// An assertion failed.
    Failed(String),
    /// Something other than an assertion went wrong.
    Error(String),
}

impl TestResult {
    fn from_error(e: &anyhow::Error) -> Self {
        match e.downcast_ref::<TestFailure>() {
            Some(failure) => Self::Failed(failure.0.clone()),
            None => Self::Error(format!("{:#}", e)),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Run setup, body and teardown of `test`.
///
/// Teardown always runs. The first failure wins; a teardown error after an
/// earlier failure is only logged.
pub async fn run_test<T: TestCase>(test: &mut T) -> TestResult {
    let name = test.name().to_string();
    info!("[Test] {} started at {}", name, log_file_timestamp());

    let body = match test.setup_test().await {
        Ok(()) => test.run().await,
        Err(e) => Err(e.context("setup_test failed")),
    };
    let teardown = test.teardown_test().await;

    let result = match (body, teardown) {
        (Ok(()), Ok(())) => TestResult::Passed,
        (Ok(()), Err(e)) => TestResult::from_error(&e.context("teardown_test failed")),
        (Err(e), Ok(())) => TestResult::from_error(&e),
        (Err(e), Err(teardown_err)) => {
            error!("[Test] {} teardown also failed: {:#}", name, teardown_err);
            TestResult::from_error(&e)
        }
    };

    match &result {
        TestResult::Passed => info!("[Test] {} PASS", name),
        TestResult::Failed(reason) => error!("[Test] {} FAIL: {}", name, reason),
        TestResult::Error(reason) => error!("[Test] {} ERROR: {}", name, reason),
    }
    result
}

/// Acquire the target device and load the configured snippet onto it.
pub async fn acquire_target(config: &Config) -> Result<AndroidDevice> {
    let mut device = AndroidDevice::acquire(&config.device).await?;
    device.set_debug_tag("target");
    device
        .load_snippet(
            &config.device.snippet_name,
            &config.device.snippet_package,
            config.rpc_timeout(),
        )
        .await?;
    Ok(device)
}

/// Process exit status for a set of results.
pub fn exit_code(results: &[TestResult]) -> ExitCode {
    if results.iter().all(TestResult::is_pass) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
