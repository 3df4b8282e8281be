//! End-to-end tests of the topic bus through the `MessageChannel` trait
//! object, the way the coordinator and workers hold it.

use std::collections::HashSet;
use std::sync::Arc;

use fleet_core::{Task, TaskResult};
use fleet_events::messages::{
    decode_dispatch, decode_result, encode_end_of_stream, encode_result, encode_task_list,
};
use fleet_events::{task_topic, DispatchMessage, MessageChannel, TopicBus, RESULTS_TOPIC};

// ---------------------------------------------------------------------------
// Test: concurrent publishers all reach the single results subscriber
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_share_results_topic() {
    let channel: Arc<dyn MessageChannel> = Arc::new(TopicBus::default());
    let mut results = channel.subscribe(RESULTS_TOPIC).await.unwrap();

    let mut handles = Vec::new();
    for worker_id in 1..=4u32 {
        let channel = Arc::clone(&channel);
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                let task = Task::new(format!("w{worker_id}-t{i}"), 1.0, [i64::from(i)]);
                let payload = encode_result(&TaskResult::new(worker_id, task, true)).unwrap();
                channel.publish(RESULTS_TOPIC, payload).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut names = HashSet::new();
    for _ in 0..100 {
        let result = decode_result(&results.recv().await.unwrap()).unwrap();
        names.insert(result.task_name);
    }
    assert_eq!(names.len(), 100);
    assert!(results.try_recv().is_none());
}

// ---------------------------------------------------------------------------
// Test: a list published before the worker subscribes is still delivered
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_worker_receives_list_then_sentinel() {
    let channel: Arc<dyn MessageChannel> = Arc::new(TopicBus::default());
    let tasks = vec![Task::new("A", 10.0, [1])];

    channel
        .publish(&task_topic(1), encode_task_list(&tasks).unwrap())
        .await
        .unwrap();
    channel.publish(&task_topic(1), encode_end_of_stream()).await.unwrap();

    let mut sub = channel.subscribe(&task_topic(1)).await.unwrap();
    assert_eq!(
        decode_dispatch(&sub.recv().await.unwrap()).unwrap(),
        DispatchMessage::Tasks(tasks)
    );
    assert_eq!(
        decode_dispatch(&sub.recv().await.unwrap()).unwrap(),
        DispatchMessage::EndOfStream
    );

    let mut other = channel.subscribe(&task_topic(2)).await.unwrap();
    assert!(other.try_recv().is_none());
}
