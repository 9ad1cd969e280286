//! Drives a full run: scroll raw records, eventize, enrich and bulk-write each batch.
use std::sync::Arc;
use std::time::Instant;

use events_common::enrich::Gender;
use events_common::events::{
    EventContext, EventizeError, Eventizer, IdentityResolver, ProjectLookup, SourceKind,
};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::elasticsearch::{
    build_client, ElasticsearchSink, ElasticsearchSource, Endpoint, EventSink, RecordSource,
};
use crate::error::{PipelineError, SetupError};
use crate::genderize::GenderizeClient;
use crate::identities::SnapshotResolver;
use crate::mappings::mapping_for;
use crate::projects::ProjectsMap;
use crate::stages::{default_stages, read_stages, Chain, StageResources};

/// Destination ids are consecutive over the whole run, starting here.
const FIRST_DOCUMENT_ID: u64 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records_read: usize,
    pub rows_written: u64,
    pub batches: usize,
}

pub struct Pipeline<S, K> {
    source: S,
    sink: K,
    eventizer: Eventizer,
    granularity: u32,
    chain: Chain,
    mapping: Value,
}

impl<S: RecordSource, K: EventSink> Pipeline<S, K> {
    pub fn new(
        source: S,
        sink: K,
        eventizer: Eventizer,
        granularity: u32,
        chain: Chain,
        mapping: Value,
    ) -> Self {
        Self {
            source,
            sink,
            eventizer,
            granularity,
            chain,
            mapping,
        }
    }

    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        if self.granularity == 0 {
            return Err(EventizeError::InvalidGranularity(self.granularity).into());
        }

        let kind = self.eventizer.kind();
        let labels = [("source", kind.as_str().to_string())];

        self.sink.recreate(&self.mapping).await?;
        info!(source = %kind, stages = ?self.chain.names(), "destination recreated, starting run");

        let mut summary = RunSummary::default();
        let mut next_id = FIRST_DOCUMENT_ID;
        while let Some(records) = self.source.next_batch().await? {
            let started = Instant::now();

            let table = self.eventizer.eventize(&records, self.granularity)?;
            let table = self.chain.apply(table).await?;
            let rows = table.len();
            next_id = self.sink.write(table.to_documents(), next_id).await?;

            summary.records_read += records.len();
            summary.rows_written += rows as u64;
            summary.batches += 1;

            metrics::counter!("events_records_read", &labels).increment(records.len() as u64);
            metrics::counter!("events_rows_written", &labels).increment(rows as u64);
            metrics::counter!("events_batches_total", &labels).increment(1);
            metrics::histogram!("events_batch_duration_seconds", &labels)
                .record(started.elapsed().as_secs_f64());

            info!(
                batch = summary.batches,
                records = records.len(),
                rows,
                "batch written"
            );
        }

        info!(
            records_read = summary.records_read,
            rows_written = summary.rows_written,
            batches = summary.batches,
            "run complete"
        );
        Ok(summary)
    }
}

impl Pipeline<ElasticsearchSource, ElasticsearchSink> {
    /// Wire the Elasticsearch source and sink and every configured collaborator.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let client = build_client(config.request_timeout.0)?;
        let es = &config.elasticsearch;

        let source = ElasticsearchSource::new(
            client.clone(),
            Endpoint::parse(&es.source_url)?,
            es.source_index.as_str(),
            config.batch_size,
            config.scroll_keepalive.as_str(),
        );
        let sink = ElasticsearchSink::new(
            client.clone(),
            Endpoint::parse(&es.destination_url)?,
            es.destination_index.as_str(),
        );

        let projects = config
            .projects_file
            .as_deref()
            .map(ProjectsMap::from_file)
            .transpose()?
            .map(Arc::new);
        let mut context = EventContext::default();
        if let Some(path) = &config.identities_file {
            let resolver: Arc<dyn IdentityResolver> = Arc::new(SnapshotResolver::from_file(path)?);
            context.resolver = Some(resolver);
        }
        if let Some(projects) = &projects {
            let lookup: Arc<dyn ProjectLookup> = projects.clone();
            context.projects = Some(lookup);
        }

        let resources = StageResources {
            gender: gender_from_config(config, client)?,
            projects,
            uuids_file: config.uuids_file.as_ref().map(Into::into),
        };
        let stages = match &config.pipeline_file {
            Some(path) => read_stages(path)?,
            None => default_stages(config.source_kind, config.granularity, &resources),
        };
        let chain = Chain::build(&stages, &resources)?;

        Ok(Self::new(
            source,
            sink,
            Eventizer::new(config.source_kind, Some(context)),
            config.granularity,
            chain,
            mapping_for(config.source_kind)?,
        ))
    }
}

fn gender_from_config(
    config: &Config,
    client: reqwest::Client,
) -> Result<Option<Arc<Gender>>, SetupError> {
    let settings = &config.genderize;
    if !settings.enabled {
        return Ok(None);
    }
    if config.source_kind != SourceKind::Gerrit && config.pipeline_file.is_none() {
        info!(source = %config.source_kind, "gender lookups enabled but unused by the default chain");
    }

    let url = Url::parse(&settings.url).map_err(SetupError::GenderizeUrl)?;
    let lookup = GenderizeClient::new(client, url, settings.api_key.clone());
    let gender = Gender::with_capacity(Arc::new(lookup), settings.cache_capacity);

    if let Some(path) = &settings.cache_file {
        let seeded = gender
            .seed_from_file(path)
            .map_err(|source| SetupError::Read {
                path: path.clone(),
                source,
            })?;
        info!(names = seeded, "seeded gender cache");
    }

    Ok(Some(Arc::new(gender)))
}
