//! Child process behaviour, driven through `sh`
#![cfg(unix)]

use futures::StreamExt;
use harvest_backends::{CommandRunner, CommandRunnerConfig};
use harvest_core::{run_to_completion, RunnerError, TaskRequest, TaskRunner};
use std::time::Duration;

fn shell(script: &str) -> CommandRunner {
    // `sh -c <script> sh <generated args...>`: generated args land in $1..
    CommandRunner::new(
        CommandRunnerConfig::new()
            .with_program("sh")
            .with_leading_args(["-c", script, "sh"]),
    )
}

#[tokio::test]
async fn stdout_lines_become_chunks() {
    let runner = shell("echo first; echo; echo second");
    let output = run_to_completion(&runner, &TaskRequest::new("p"), None)
        .await
        .unwrap();
    assert_eq!(output.responses, vec!["first", "second"]);
}

#[tokio::test]
async fn prompt_reaches_the_process() {
    let runner = shell(r#"echo "$1=$2""#);
    let output = run_to_completion(&runner, &TaskRequest::new("hello"), None)
        .await
        .unwrap();
    assert_eq!(output.final_response(), Some("-p=hello"));
}

#[tokio::test]
async fn credential_passed_through_environment() {
    let runner = shell(r#"echo "key:$ANTHROPIC_API_KEY""#);
    let request = TaskRequest::new("p").with_api_key(Some("sk-child".into()));
    let output = run_to_completion(&runner, &request, None).await.unwrap();
    assert_eq!(output.final_response(), Some("key:sk-child"));
}

#[tokio::test]
async fn non_zero_exit_carries_stderr_tail() {
    let runner = shell("echo partial; echo 'quota exceeded' >&2; exit 3");
    let mut stream = runner.execute(&TaskRequest::new("p")).await.unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
    match stream.next().await.unwrap() {
        Err(RunnerError::Failed { status, message }) => {
            assert_eq!(status, Some(3));
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("unexpected item: {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let runner = CommandRunner::new(
        CommandRunnerConfig::new().with_program("harvest-test-no-such-binary"),
    );
    let err = run_to_completion(&runner, &TaskRequest::new("p"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Spawn { .. }));
}

#[tokio::test]
async fn timeout_cancels_task() {
    let runner = CommandRunner::new(
        CommandRunnerConfig::new()
            .with_program("sh")
            .with_leading_args(["-c", "sleep 5", "sh"])
            .with_timeout(Duration::from_millis(100)),
    );
    let err = run_to_completion(&runner, &TaskRequest::new("p"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Cancelled(_)));
}

#[tokio::test]
async fn timeout_covers_child_that_closed_stdout() {
    let runner = CommandRunner::new(
        CommandRunnerConfig::new()
            .with_program("sh")
            .with_leading_args(["-c", "echo ready; exec >&-; exec sleep 5", "sh"])
            .with_timeout(Duration::from_millis(200)),
    );
    let started = std::time::Instant::now();
    let err = run_to_completion(&runner, &TaskRequest::new("p"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Cancelled(_)));
    assert!(started.elapsed() < Duration::from_secs(4));
}
