//! Tier 4: Request contract
//!
//! Status codes and messages clients depend on.

use crate::test_utils::*;
use buildseq::{Command, Error, Executor, Method, Request};

fn status(executor: &Executor, request: Request) -> (u16, String) {
    let response = executor.execute(&request);
    (response.status, response.message)
}

#[test]
fn status_table() {
    let executor = ephemeral_executor();
    let a = commit(1);
    let b = commit(2);

    let post = |series: &str, c: &str| {
        Request::new(Method::Post)
            .with_series(series)
            .with_commit(c)
            .with_token(TOKEN)
    };
    let get = |series: &str, c: &str| {
        Request::new(Method::Get)
            .with_series(series)
            .with_commit(c)
            .with_token(TOKEN)
    };

    assert_eq!(
        status(&executor, post("1.4", &a)),
        (201, "Unknown series. New build number created.".into())
    );
    assert_eq!(
        status(&executor, post("1.4", &b)),
        (201, "Known series. New build number created.".into())
    );
    assert_eq!(
        status(&executor, post("1.4", &a)),
        (200, "Known series. Known commit hash.".into())
    );
    assert_eq!(status(&executor, get("1.4", &a)), (200, "Found".into()));
    assert_eq!(
        status(&executor, get("1.5", &a)),
        (404, "Unknown series!".into())
    );
    assert_eq!(
        status(&executor, get("1.4", &commit(3))),
        (404, "Unknown build!".into())
    );
    assert_eq!(
        status(&executor, post("14", &a)),
        (400, "Invalid parameter: series. Format: <major>.<minor>".into())
    );
    assert_eq!(status(&executor, post("1.4", "deadbeef")).0, 400);
    assert_eq!(
        status(
            &executor,
            Request::new(Method::Post).with_series("1.4").with_token(TOKEN)
        ),
        (405, "Invalid method".into())
    );
    assert_eq!(
        status(&executor, Request::new(Method::Get).with_token(TOKEN)).0,
        404
    );
    assert_eq!(
        status(&executor, post("1.4", &a).with_token("guess")),
        (401, "Unauthorized".into())
    );
}

#[test]
fn unauthorized_before_routing() {
    let executor = ephemeral_executor();
    // Even an unsupported method is answered 401 without a token
    let response = executor.execute(&Request::new(Method::Delete).with_series("1.0"));
    assert_eq!(response.status, 401);
}

#[test]
fn no_configured_tokens_rejects_everything() {
    let executor = Executor::new(Database::ephemeral()).unwrap();
    let response = allocate(&executor, "1.0", &commit(0));
    assert_eq!(response.status, 401);
    assert_eq!(executor.allocator().database().storage().series_count(), 0);
}

#[test]
fn multiple_tokens_accepted() {
    let config = BuildSeqConfig {
        authorized_digests: vec![hash_token("first"), hash_token(TOKEN)],
        ..BuildSeqConfig::default()
    };
    let executor = Executor::new(Database::ephemeral_with_config(config).unwrap()).unwrap();
    assert_eq!(allocate(&executor, "1.0", &commit(0)).status, 201);

    let other = Request::new(Method::Get)
        .with_series("1.0")
        .with_commit(commit(0))
        .with_token("first");
    assert_eq!(executor.execute(&other).status, 200);
}

#[test]
fn commands_bypass_routing() {
    let executor = ephemeral_executor();
    let command = Command::Allocate {
        series: "2.2".into(),
        commit: commit(5),
    };
    let response = executor.execute_command(Some(TOKEN), &command);
    assert_eq!(response.status, 201);
    assert_eq!(response.build_number, Some(1));
}

#[test]
fn error_statuses_are_stable() {
    assert_eq!(Error::Unauthorized.status(), 401);
    assert_eq!(Error::InvalidEndpoint.status(), 404);
    assert_eq!(
        Error::Overflow {
            series: "1.0".into()
        }
        .status(),
        422
    );
}

#[test]
fn json_body_round_trips() {
    let executor = ephemeral_executor();
    let response = allocate(&executor, "3.1", &commit(9));
    let json = response.to_json().unwrap();
    assert!(json.contains("\"build_number\":1"));
    assert!(json.contains("\"series\":\"3.1\""));
    let parsed: buildseq::Response = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, response);
}
