//! Queue-driven import through the public collaborator traits

mod common;

use async_trait::async_trait;
use cloudtrail_relay::{
    FetchError, NotificationQueue, ObjectStore, Pipeline, PollLoop, PollMode, QueueConsumer,
    QueueError, QueueMessage, RecordImporter, SourceResolver,
};
use common::{batch, event_ids, line_collector, stream_channel};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ScriptedQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
}

impl ScriptedQueue {
    fn push(&self, id: &str, message: serde_json::Value) {
        let body = json!({"Type": "Notification", "Message": message.to_string()}).to_string();
        self.pending.lock().unwrap().push_back(QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("rh-{id}"),
            body,
        });
    }
}

#[async_trait]
impl NotificationQueue for ScriptedQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let mut pending = self.pending.lock().unwrap();
        let count = max.min(pending.len());
        Ok(pending.drain(..count).collect())
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(message.message_id.clone());
        Ok(())
    }

    async fn release(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.pending.lock().unwrap().push_back(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct Bucket {
    objects: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl ObjectStore for Bucket {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn list_objects(&self, _bucket: &str, prefix: &str) -> Result<Vec<String>, FetchError> {
        let mut keys: Vec<String> = self
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[tokio::test]
async fn drains_queue_and_deletes_only_completed_messages() {
    let mut bucket = Bucket::default();
    bucket.objects.insert("a.json.gz".to_string(), batch(&["a1", "a2"]));
    bucket.objects.insert("b.json.gz".to_string(), batch(&["b1"]));

    let queue = Arc::new(ScriptedQueue::default());
    queue.push("m-1", json!({"s3Bucket": "trail", "s3ObjectKey": ["a.json.gz"]}));
    queue.push("m-2", json!({"s3Bucket": "trail", "s3ObjectKey": ["b.json.gz"]}));
    queue.push("m-3", json!({"s3Bucket": "trail", "s3ObjectKey": ["gone.json.gz"]}));
    queue.push("m-4", json!({"s3Bucket": "trail", "s3ObjectKey": ["b.json.gz"]}));

    let (address, collector) = line_collector().await;
    let pipeline = Pipeline::new(
        RecordImporter::new(stream_channel(&address)),
        SourceResolver::new(Arc::new(bucket)),
    );
    let consumer = QueueConsumer::new(queue.clone(), pipeline, false);

    let mut poll = PollLoop::new(consumer, PollMode::Unbounded { poll_interval: None }, 10);
    let summary = poll.run().await.unwrap();
    drop(poll);

    assert_eq!(summary.received, 4);
    assert_eq!(summary.completed, 2);
    assert_eq!(*queue.deleted.lock().unwrap(), vec!["m-1", "m-2"]);

    let lines = collector.await.unwrap();
    assert_eq!(event_ids(&lines), vec!["a1", "a2", "b1"]);
}
