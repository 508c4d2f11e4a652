//! Test world for Cucumber scenarios

use cucumber::World;

use crate::common::{TestApp, TestResponse};

/// Test world that maintains state across scenario steps
#[derive(Debug, Default, World)]
pub struct TestWorld {
    /// Running application with its scratch command root
    pub app: Option<TestApp>,

    /// Body of the delivery about to be sent
    pub body: Vec<u8>,

    /// Response from last API call
    pub last_response: Option<TestResponse>,
}

impl TestWorld {
    /// The application started by a `Given` step
    pub fn app(&self) -> &TestApp {
        self.app.as_ref().expect("No application started")
    }

    /// The response recorded by a `When` step
    pub fn response(&self) -> &TestResponse {
        self.last_response.as_ref().expect("No response available")
    }
}
