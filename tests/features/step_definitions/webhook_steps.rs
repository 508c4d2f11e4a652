//! Webhook delivery steps

use std::time::Duration;

use cucumber::{given, then, when};

use crate::common::{push_body, sign, wait_for_file, TestApp};
use crate::features::support::TestWorld;

#[given("a running githooker")]
async fn running_githooker(world: &mut TestWorld) {
    world.app = Some(TestApp::new());
}

#[given(expr = "a running githooker with extensions {string}")]
async fn running_githooker_with_extensions(world: &mut TestWorld, extensions: String) {
    let extensions: Vec<&str> = extensions.split_whitespace().collect();
    world.app = Some(TestApp::with_extensions(&extensions));
}

#[given(expr = "a hook command at {string}")]
async fn hook_command(world: &mut TestWorld, path: String) {
    world.app().install_capture(&path);
}

#[given(expr = "a push to {string} on {string}")]
async fn push_delivery(world: &mut TestWorld, repository: String, git_ref: String) {
    world.body = push_body(&repository, &git_ref);
}

#[given(expr = "a delivery with body {string}")]
async fn raw_delivery(world: &mut TestWorld, body: String) {
    world.body = body.into_bytes();
}

#[when("the delivery is sent with a valid signature")]
async fn send_signed(world: &mut TestWorld) {
    let response = world.app().post_signed(world.body.clone()).await;
    world.last_response = Some(response);
}

#[when("the delivery is sent without a signature")]
async fn send_unsigned(world: &mut TestWorld) {
    let response = world
        .app()
        .post_with_signature(world.body.clone(), None)
        .await;
    world.last_response = Some(response);
}

#[when(expr = "the delivery is sent signed with secret {string}")]
async fn send_signed_with(world: &mut TestWorld, secret: String) {
    let signature = sign(&secret, &world.body);
    let response = world
        .app()
        .post_with_signature(world.body.clone(), Some(&signature))
        .await;
    world.last_response = Some(response);
}

#[when(expr = "the delivery is sent with signature header {string}")]
async fn send_with_header(world: &mut TestWorld, header: String) {
    let response = world
        .app()
        .post_with_signature(world.body.clone(), Some(&header))
        .await;
    world.last_response = Some(response);
}

#[then(expr = "the response status should be {int}")]
async fn response_status(world: &mut TestWorld, status: u16) {
    assert_eq!(world.response().status.as_u16(), status);
}

#[then(expr = "the response body should be {string}")]
async fn response_body(world: &mut TestWorld, body: String) {
    assert_eq!(world.response().text(), body);
}

#[then(expr = "the command {string} should receive the delivery")]
async fn command_received(world: &mut TestWorld, path: String) {
    let output = world.app().command_path(&format!("{}.out", path));
    let captured = wait_for_file(&output, Duration::from_secs(5))
        .await
        .unwrap_or_else(|| panic!("{} did not run", path));
    assert_eq!(captured, world.body);
}

#[then(expr = "the command {string} should not run")]
async fn command_not_run(world: &mut TestWorld, path: String) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    let output = world.app().command_path(&format!("{}.out", path));
    assert!(!output.exists(), "{} ran unexpectedly", path);
}
