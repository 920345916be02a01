use fedcoll::{DataType, ReduceOp};

use super::helpers::{run_clients, start_server};

#[tokio::test]
async fn test_allgather_3_clients() {
    let server = start_server(3).await;
    let replies = run_clients(&server, 3, |mut client| async move {
        let rank = client.rank() as u8;
        let reply = client.allgather(&[rank; 4]).await.unwrap();
        assert_eq!(client.sequence_number(), 1);
        client.close().await;
        reply
    })
    .await;

    let expected: Vec<u8> = (0..3u8).flat_map(|r| [r; 4]).collect();
    for reply in replies {
        assert_eq!(reply, expected);
    }
    assert_eq!(server.coordinator.snapshot().unwrap().sequence_number, 1);
}

#[tokio::test]
async fn test_allreduce_typed_4_clients() {
    let server = start_server(4).await;
    let replies = run_clients(&server, 4, |mut client| async move {
        let rank = client.rank();
        let sum = client
            .allreduce_typed(&[rank as f32 + 1.0; 8], ReduceOp::Sum)
            .await
            .unwrap();
        let max = client
            .allreduce_typed(&[rank as i64 * -3, rank as i64], ReduceOp::Max)
            .await
            .unwrap();
        (sum, max)
    })
    .await;

    for (sum, max) in replies {
        assert_eq!(sum, vec![10.0f32; 8]);
        assert_eq!(max, vec![0, 3]);
    }
}

#[tokio::test]
async fn test_broadcast_and_in_place() {
    let server = start_server(3).await;
    let replies = run_clients(&server, 3, |mut client| async move {
        let rank = client.rank();
        let payload = if rank == 2 { b"weights".to_vec() } else { b"ignored".to_vec() };
        let reply = client.broadcast(&payload, 2).await.unwrap();

        let mut buffer = [rank as u8; 6];
        client.broadcast_in_place(&mut buffer, 0).await.unwrap();
        (reply, buffer)
    })
    .await;

    for (reply, buffer) in replies {
        assert_eq!(reply, b"weights");
        assert_eq!(buffer, [0u8; 6]);
    }
}

#[tokio::test]
async fn test_allreduce_with_custom_reducer() {
    let server = start_server(3).await;
    let replies = run_clients(&server, 3, |mut client| async move {
        let mut flags = [1u8 << client.rank(), 0x80];
        client
            .allreduce_with(&mut flags, |dst, src| {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d |= s;
                }
            })
            .await
            .unwrap();
        flags
    })
    .await;

    for flags in replies {
        assert_eq!(flags, [0b111, 0x80]);
    }
}

#[tokio::test]
async fn test_many_rounds_over_quic() {
    let server = start_server(2).await;
    let replies = run_clients(&server, 2, |mut client| async move {
        let rank = client.rank();
        let mut totals = Vec::new();
        for round in 0..20u32 {
            let reply = client
                .allreduce_typed(&[round * 2 + rank], ReduceOp::Sum)
                .await
                .unwrap();
            totals.push(reply[0]);
        }
        totals
    })
    .await;

    let expected: Vec<u32> = (0..20u32).map(|r| r * 4 + 1).collect();
    for totals in replies {
        assert_eq!(totals, expected);
    }
    assert_eq!(server.coordinator.snapshot().unwrap().sequence_number, 20);
}

#[tokio::test]
async fn test_single_rank_shortcuts() {
    let server = start_server(1).await;
    let mut client = server.connect(1, 0).await;

    let values = fedcoll::reduce::encode_elements(&[7i32, 8]);
    assert_eq!(
        client.allreduce(&values, DataType::Int, ReduceOp::Sum).await.unwrap(),
        values
    );
    assert_eq!(client.broadcast(b"solo", 0).await.unwrap(), b"solo");
    assert_eq!(client.allgather(b"solo").await.unwrap(), b"solo");
    assert_eq!(client.sequence_number(), 3);
    assert_eq!(server.coordinator.snapshot().unwrap().sequence_number, 0);
}
