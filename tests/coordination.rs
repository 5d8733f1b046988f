#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{routing, shared_vault, test_client, test_client_with, test_config};
use iroh_safe_client::{
    hash_content, ClientError, Data, Delivery, ImmutableData, ImmutableDataType, MessageId,
    NetworkError,
};

fn chunk(content: &[u8]) -> ImmutableData {
    ImmutableData::new(ImmutableDataType::Normal, content.to_vec())
}

#[test]
fn example_put_resolves_with_content_address() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"hello"));
    assert!(getter.poll().is_none());

    let id = getter.message_id().expect("request was sent");
    routing(&client).release(id);

    let expected = hash_content(b"hello");
    match getter.wait() {
        Ok(Data::Immutable(data)) => {
            assert_eq!(data.content(), b"hello");
            assert_eq!(data.name(), expected);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn responses_resolve_in_network_order_not_submission_order() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let first = client.put_immutable(chunk(b"A"));
    let second = client.put_immutable(chunk(b"B"));
    assert_eq!(
        routing(&client).held_ids(),
        vec![
            first.message_id().expect("id"),
            second.message_id().expect("id")
        ]
    );

    routing(&client).release(second.message_id().expect("id"));
    assert!(second.is_resolved());
    assert!(!first.is_resolved());
    assert_eq!(
        second.wait().map(|data| data.name()),
        Ok(hash_content(b"B"))
    );

    routing(&client).release(first.message_id().expect("id"));
    assert_eq!(first.wait().map(|data| data.name()), Ok(hash_content(b"A")));
}

#[test]
fn concurrent_waiters_see_one_identical_result() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"shared"));
    let waiters: Vec<_> = (0..16)
        .map(|_| {
            let getter = getter.clone();
            thread::spawn(move || getter.wait())
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    routing(&client).release(getter.message_id().expect("id"));

    let results: Vec<_> = waiters
        .into_iter()
        .map(|waiter| waiter.join().expect("waiter thread"))
        .collect();
    assert!(results.iter().all(|result| result == &results[0]));
    assert_eq!(results[0], Ok(Data::Immutable(chunk(b"shared"))));
}

#[test]
fn stray_responses_leave_live_handles_untouched() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"live"));
    let id = getter.message_id().expect("id");

    let stray = client
        .coordinator()
        .on_response(MessageId(id.0 + 1_000), Err(NetworkError::AccessDenied));
    assert_eq!(stray, Delivery::Unmatched);
    assert!(getter.poll().is_none());
    assert_eq!(client.snapshot().pending, 1);
    assert_eq!(client.snapshot().unmatched, 1);

    routing(&client).release(id);
    assert_eq!(getter.wait(), Ok(Data::Immutable(chunk(b"live"))));

    // Duplicate delivery after resolution changes nothing.
    routing(&client).deliver(id, Err(NetworkError::NoSuchData));
    assert_eq!(getter.wait(), Ok(Data::Immutable(chunk(b"live"))));
}

#[test]
fn unanswered_request_times_out_and_late_reply_is_discarded() {
    let vault = shared_vault();
    let config = test_config().with_request_timeout(Duration::from_millis(30));
    let client = test_client_with(&vault, config);
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"slow"));
    let id = getter.message_id().expect("id");
    assert_eq!(
        getter.wait_with_timeout(Duration::from_secs(5)),
        Err(ClientError::Timeout)
    );
    assert_eq!(client.snapshot().pending, 0);

    // The request still reached the network; its answer is simply unmatched.
    routing(&client).release(id);
    assert_eq!(getter.wait(), Err(ClientError::Timeout));
    let snapshot = client.snapshot();
    assert_eq!(snapshot.timed_out, 1);
    assert_eq!(snapshot.unmatched, 1);
}

#[test]
fn maximal_request_timeout_is_accepted() {
    let vault = shared_vault();
    let client = test_client_with(&vault, test_config().with_request_timeout(Duration::MAX));
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"no deadline"));
    thread::sleep(Duration::from_millis(30));
    assert!(getter.poll().is_none());
    assert_eq!(client.snapshot().timed_out, 0);

    routing(&client).release(getter.message_id().expect("request was sent"));
    assert!(matches!(getter.wait(), Ok(Data::Immutable(_))));
}

#[test]
fn dropping_a_handle_does_not_cancel_the_request() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let data = chunk(b"fire and forget");
    let id = client
        .put_immutable(data.clone())
        .message_id()
        .expect("id");
    assert_eq!(client.snapshot().pending, 1);

    routing(&client).release(id);
    assert_eq!(client.snapshot().resolved, 1);
    assert_eq!(client.snapshot().pending, 0);

    // The unobserved result still landed in the cache.
    let cached = client.get_immutable(data.name(), ImmutableDataType::Normal);
    assert_eq!(cached.message_id(), None);
    assert_eq!(cached.wait(), Ok(Data::Immutable(data)));
}

#[test]
fn many_threads_submit_concurrently() {
    let vault = shared_vault();
    let client = Arc::new(test_client(&vault));

    let workers: Vec<_> = (0..8u8)
        .map(|worker| {
            let client = client.clone();
            thread::spawn(move || {
                (0..25u8)
                    .map(|i| {
                        let content = vec![worker, i];
                        let getter = client.put_immutable(chunk(&content));
                        (content, getter)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for worker in workers {
        for (content, getter) in worker.join().expect("worker thread") {
            ids.push(getter.message_id().expect("id"));
            assert_eq!(
                getter.wait().map(|data| data.name()),
                Ok(hash_content(&content))
            );
        }
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(client.snapshot().resolved, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handles_can_be_awaited() {
    let vault = shared_vault();
    let client = test_client(&vault);
    routing(&client).hold(true);

    let getter = client.put_immutable(chunk(b"async"));
    let id = getter.message_id().expect("id");

    let waiter = {
        let getter = getter.clone();
        tokio::spawn(async move { getter.resolved().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    routing(&client).release(id);

    let outcome = waiter.await.expect("task");
    assert_eq!(outcome, Ok(Data::Immutable(chunk(b"async"))));
    assert_eq!(getter.poll(), Some(outcome));
}
