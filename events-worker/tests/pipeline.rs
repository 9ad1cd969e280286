use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use envconfig::Envconfig;
use events_common::events::{EventContext, EventizeError, Eventizer, SourceKind};
use events_worker::config::Config;
use events_worker::elasticsearch::{EventSink, RecordSource};
use events_worker::error::{PipelineError, StoreError};
use events_worker::mappings::mapping_for;
use events_worker::pipeline::{Pipeline, RunSummary};
use events_worker::stages::{default_stages, Chain, StageResources};
use httpmock::prelude::*;
use serde_json::{json, Map, Value};

const GIT_RECORDS: &str = include_str!("../../events-common/tests/fixtures/git.json");

fn git_records() -> Vec<Value> {
    serde_json::from_str(GIT_RECORDS).unwrap()
}

struct MemorySource {
    batches: VecDeque<Vec<Value>>,
}

impl MemorySource {
    fn new(records: Vec<Value>, batch_size: usize) -> Self {
        Self {
            batches: records.chunks(batch_size).map(<[Value]>::to_vec).collect(),
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn next_batch(&mut self) -> Result<Option<Vec<Value>>, StoreError> {
        Ok(self.batches.pop_front())
    }
}

#[derive(Clone, Default)]
struct MemorySink {
    mapping: Arc<Mutex<Option<Value>>>,
    documents: Arc<Mutex<Vec<(u64, Map<String, Value>)>>>,
    reject_writes: bool,
}

#[async_trait]
impl EventSink for MemorySink {
    async fn recreate(&self, mapping: &Value) -> Result<(), StoreError> {
        *self.mapping.lock().unwrap() = Some(mapping.clone());
        self.documents.lock().unwrap().clear();
        Ok(())
    }

    async fn write(
        &self,
        documents: Vec<Map<String, Value>>,
        first_id: u64,
    ) -> Result<u64, StoreError> {
        if self.reject_writes {
            return Err(StoreError::BulkRejected {
                failed: documents.len(),
                total: documents.len(),
            });
        }
        let mut stored = self.documents.lock().unwrap();
        let mut next_id = first_id;
        for document in documents {
            stored.push((next_id, document));
            next_id += 1;
        }
        Ok(next_id)
    }
}

fn git_pipeline(
    sink: MemorySink,
    granularity: u32,
    batch_size: usize,
) -> Pipeline<MemorySource, MemorySink> {
    let resources = StageResources::default();
    let stages = default_stages(SourceKind::Git, granularity, &resources);
    Pipeline::new(
        MemorySource::new(git_records(), batch_size),
        sink,
        Eventizer::new(SourceKind::Git, Some(EventContext::default())),
        granularity,
        Chain::build(&stages, &resources).unwrap(),
        mapping_for(SourceKind::Git).unwrap(),
    )
}

#[tokio::test]
async fn test_file_level_run_numbers_rows_across_batches() {
    let sink = MemorySink::default();

    let summary = git_pipeline(sink.clone(), 2, 3).run().await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            records_read: 6,
            rows_written: 9,
            batches: 2,
        }
    );
    assert_eq!(
        sink.mapping.lock().unwrap().as_ref(),
        Some(&mapping_for(SourceKind::Git).unwrap())
    );

    let documents = sink.documents.lock().unwrap();
    let ids: Vec<u64> = documents.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, (1..=9).collect::<Vec<u64>>());
    assert!(documents
        .iter()
        .all(|(_, document)| document["filepath"] != json!("-")));

    assert_json_include!(
        actual: Value::Object(documents[0].1.clone()),
        expected: json!({
            "author_name": "Unknown",
            "author_bot": false,
            "eventtype": "COMMIT",
            "owner": "Eduardo Morais <companheiro.vermelho@zenwalk.org>",
            "repository": "https://github.com/chaoss/grimoirelab-perceval.git",
            "hash": "bc57a9209f096a130dcc5ba7089a8663f758a703",
            "fileaction": "FILE_A",
            "filepath": "bbb/bthing.py",
            "addedlines": 10,
            "filetype": "Code",
            "file_name": "bthing.py",
            "file_ext": "py",
            "file_dir_name": "/bbb/",
            "file_path_list": ["bbb", "bthing.py"]
        })
    );
}

#[tokio::test]
async fn test_commit_level_run_splits_author_addresses() {
    let sink = MemorySink::default();

    let summary = git_pipeline(sink.clone(), 1, 4).run().await.unwrap();

    assert_eq!(summary.rows_written, 6);
    let documents = sink.documents.lock().unwrap();
    assert_json_include!(
        actual: Value::Object(documents[1].1.clone()),
        expected: json!({
            "user": "Jane Roe",
            "email": "jane.roe@gmail.com",
            "domain": "gmail.com",
            "num_files": 2,
            "num_added_lines": 13
        })
    );
}

#[tokio::test]
async fn test_zero_granularity_fails_before_touching_the_sink() {
    let sink = MemorySink::default();

    let err = git_pipeline(sink.clone(), 0, 3).run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Eventize(EventizeError::InvalidGranularity(0))
    ));
    assert!(sink.mapping.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_write_aborts_the_run() {
    let sink = MemorySink {
        reject_writes: true,
        ..Default::default()
    };

    let err = git_pipeline(sink, 2, 3).run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Store(StoreError::BulkRejected { failed: 6, total: 6 })
    ));
}

#[tokio::test]
async fn test_malformed_record_aborts_the_run() {
    let sink = MemorySink::default();
    let resources = StageResources::default();
    let pipeline = Pipeline::new(
        MemorySource::new(vec![json!({"origin": "x", "data": {"commit": 1}})], 10),
        sink,
        Eventizer::new(SourceKind::Git, None),
        2,
        Chain::build(&[], &resources).unwrap(),
        json!({}),
    );

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Eventize(EventizeError::MalformedRecord { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_elasticsearch_run_from_config() {
    let server = MockServer::start();
    let records: Vec<Value> = git_records()
        .into_iter()
        .take(2)
        .map(|record| json!({"_source": record}))
        .collect();

    let delete_index = server.mock(|when, then| {
        when.method(DELETE).path("/git_events");
        then.status(404).json_body(json!({"error": "index_not_found_exception"}));
    });
    let create_index = server.mock(|when, then| {
        when.method(PUT).path("/git_events");
        then.status(200).json_body(json!({"acknowledged": true}));
    });
    let search = server.mock(|when, then| {
        when.method(POST).path("/git_raw/_search");
        then.status(200)
            .json_body(json!({"_scroll_id": "s1", "hits": {"hits": records}}));
    });
    let scroll = server.mock(|when, then| {
        when.method(POST).path("/_search/scroll");
        then.status(200)
            .json_body(json!({"_scroll_id": "s1", "hits": {"hits": []}}));
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/_search/scroll");
        then.status(200).json_body(json!({"succeeded": true}));
    });
    let bulk = server.mock(|when, then| {
        when.method(POST)
            .path("/_bulk")
            .body_contains(r#"{"index":{"_index":"git_events","_id":"3"}}"#)
            .body_contains("bbb/README");
        then.status(200).json_body(json!({"errors": false, "items": []}));
    });

    let env = [
        ("ES_SOURCE_URL", server.base_url()),
        ("ES_SOURCE_INDEX", "git_raw".to_string()),
        ("ES_DESTINATION_URL", server.base_url()),
        ("ES_DESTINATION_INDEX", "git_events".to_string()),
        ("SOURCE_KIND", "git".to_string()),
        ("GRANULARITY", "2".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let config = Config::init_from_hashmap(&env).unwrap();

    let summary = Pipeline::from_config(&config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            records_read: 2,
            rows_written: 3,
            batches: 1,
        }
    );
    assert_eq!(delete_index.hits(), 1);
    assert_eq!(create_index.hits(), 1);
    assert_eq!(search.hits(), 1);
    assert_eq!(scroll.hits(), 1);
    assert_eq!(bulk.hits(), 1);
}
