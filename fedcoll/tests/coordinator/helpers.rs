use fedcoll::{Rank, RoundCoordinator, SessionSnapshot};
use std::future::Future;
use std::time::{Duration, Instant};

/// Helper: run `f` once per rank, all calls polled concurrently.
/// Ranks start in `order`, spaced `stagger` apart.
/// Returns results indexed by rank.
pub async fn run_ranks_in_order<T, F, Fut>(order: &[Rank], stagger: Duration, f: F) -> Vec<T>
where
    F: Fn(Rank) -> Fut,
    Fut: Future<Output = T>,
{
    let calls = order.iter().enumerate().map(|(i, &rank)| {
        let call = f(rank);
        async move {
            tokio::time::sleep(stagger * i as u32).await;
            (rank, call.await)
        }
    });
    let mut results = futures::future::join_all(calls).await;
    results.sort_by_key(|(rank, _)| *rank);
    results.into_iter().map(|(_, t)| t).collect()
}

/// Helper: run `f` once per rank of `coordinator`, all ranks started together.
pub async fn run_ranks<T, F, Fut>(coordinator: &RoundCoordinator, f: F) -> Vec<T>
where
    F: Fn(Rank) -> Fut,
    Fut: Future<Output = T>,
{
    let order: Vec<Rank> = (0..coordinator.world_size()).collect();
    run_ranks_in_order(&order, Duration::ZERO, f).await
}

/// Every ordering of `0..n`.
pub fn permutations(n: u32) -> Vec<Vec<Rank>> {
    fn go(prefix: &mut Vec<Rank>, rest: &mut Vec<Rank>, out: &mut Vec<Vec<Rank>>) {
        if rest.is_empty() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..rest.len() {
            let r = rest.remove(i);
            prefix.push(r);
            go(prefix, rest, out);
            prefix.pop();
            rest.insert(i, r);
        }
    }
    let mut out = Vec::new();
    go(&mut Vec::new(), &mut (0..n).collect(), &mut out);
    out
}

/// Poll the session until `pred` holds, panicking after 5s.
pub async fn wait_for(coordinator: &RoundCoordinator, pred: impl Fn(&SessionSnapshot) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snap = coordinator.snapshot().unwrap();
        if pred(&snap) {
            return;
        }
        assert!(Instant::now() < deadline, "session never reached state: {snap:?}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
