use fedcoll::protocol::AllgatherRequest;
use fedcoll::{
    FedError, FederatedClient, FederatedMessage, FederatedService, RoundCoordinator, StatusCode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::helpers::{run_clients, start_server, start_server_with};

#[tokio::test]
async fn test_invalid_root_is_remote_invalid_argument() {
    let server = start_server(2).await;
    let mut client = server.connect(2, 0).await;

    let err = client.broadcast(b"x", 5).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Remote {
                code: StatusCode::InvalidArgument,
                ..
            }
        ),
        "got {err:?}"
    );
    // A rejected call does not consume a round.
    assert_eq!(client.sequence_number(), 0);
    assert_eq!(server.coordinator.snapshot().unwrap().arrived, 0);
}

#[tokio::test]
async fn test_call_timeout_when_peer_missing() {
    let server = start_server(2).await;
    let mut config = server.client_config(2, 1);
    config.call_timeout = Some(Duration::from_millis(200));
    let mut client = FederatedClient::connect(&config).await.unwrap();

    let err = client.allgather(&[1, 2]).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Timeout {
                operation: "allgather",
                timeout_ms: 200
            }
        ),
        "got {err:?}"
    );
    assert_eq!(client.sequence_number(), 0);
    assert!(client.is_interrupted());
}

#[tokio::test]
async fn test_timed_out_call_still_counts() {
    let server = start_server(2).await;
    let mut config = server.client_config(2, 1);
    config.call_timeout = Some(Duration::from_millis(200));
    let mut late = FederatedClient::connect(&config).await.unwrap();

    let err = late.allgather(&[7, 7]).await.unwrap_err();
    assert!(matches!(err, FedError::Timeout { .. }), "got {err:?}");

    // The retry is refused locally instead of landing in the round twice.
    let err = late.allgather(&[7, 7]).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Interrupted {
                operation: "allgather",
                sequence_number: 0
            }
        ),
        "got {err:?}"
    );

    // Another connection for the same rank cannot contribute again either.
    let mut duplicate = server.connect(2, 1).await;
    let err = duplicate.allgather(&[8, 8]).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Remote {
                code: StatusCode::FailedPrecondition,
                ..
            }
        ),
        "got {err:?}"
    );
    let snap = server.coordinator.snapshot().unwrap();
    assert_eq!((snap.sequence_number, snap.arrived), (0, 1));

    // The abandoned contribution is still part of the round.
    let mut rank0 = server.connect(2, 0).await;
    assert_eq!(rank0.allgather(&[1, 1]).await.unwrap(), vec![1, 1, 7, 7]);

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.coordinator.snapshot().unwrap().sequence_number < 1 {
        assert!(Instant::now() < deadline, "round never retired");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_stale_client_is_failed_precondition() {
    let server = start_server(2).await;
    let replies = run_clients(&server, 2, |mut client| async move {
        client.allgather(&[client.rank() as u8]).await.unwrap()
    })
    .await;
    assert_eq!(replies, vec![vec![0, 1], vec![0, 1]]);

    // A reconnecting rank starts over at sequence 0, which has retired.
    let mut restarted = server.connect(2, 1).await;
    let err = restarted.allgather(&[9]).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Remote {
                code: StatusCode::FailedPrecondition,
                ..
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_admission_timeout_maps_to_deadline_exceeded() {
    let coordinator = RoundCoordinator::new(2)
        .unwrap()
        .with_admission_timeout(Some(Duration::from_millis(50)));
    let service = FederatedService::new(Arc::new(coordinator));

    let reply = service
        .call(FederatedMessage::Allgather(AllgatherRequest {
            rank: 0,
            sequence_number: 3,
            send_buffer: vec![1],
        }))
        .await;
    match reply {
        FederatedMessage::Status { code, message } => {
            assert_eq!(StatusCode::from_u8(code), StatusCode::DeadlineExceeded);
            assert!(message.contains("round 3"), "got {message}");
        }
        other => panic!("expected status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_request_rejected() {
    let server = start_server_with(2, |config| config.max_message_bytes = 256).await;
    let mut client = server.connect(2, 0).await;

    let err = client.allgather(&[0u8; 4096]).await.unwrap_err();
    assert!(
        matches!(
            err,
            FedError::Remote {
                code: StatusCode::Internal,
                ..
            }
        ),
        "got {err:?}"
    );
    assert_eq!(server.coordinator.snapshot().unwrap().arrived, 0);
}
