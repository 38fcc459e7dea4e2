/*!
# Overview
s3purge-rs empties Amazon S3 buckets completely and then deletes them.
Every object version and every delete marker under the given targets is
listed and removed with the batch DeleteObjects API, after which each
touched bucket is deleted once.

## Features
- **Parallel listing**: a brace-expandable prefix pattern splits a bucket
  into many independent scopes, each listed concurrently
- **Parallel deletion**: a pool of workers drains a bounded queue of
  batches of up to 1000 identifiers
- **Transient retry**: per-item `InternalError` responses are resubmitted
  until they succeed; any other error stops the run
- **Fail fast**: the first fatal error cancels every listing and worker
  and no bucket is deleted
- **Dry run**: list and count without deleting anything
- **Library-first**: the `s3purge` CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
s3purge-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use std::sync::Arc;

use s3purge_rs::config::Config;
use s3purge_rs::config::args::parse_from_args;
use s3purge_rs::{PurgeCounters, PurgePipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec!["s3purge", "my-bucket", "--prefix", "{0..9}", "--dry-run"];

    let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
    let counters = Arc::new(PurgeCounters::new());
    let cancellation_token = create_pipeline_cancellation_token();

    let mut pipeline = PurgePipeline::new(config, cancellation_token, counters.clone()).await;
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
    println!("{}", counters.snapshot());
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod config;
pub mod deleter;
pub mod enumerator;
pub mod pipeline;
pub mod scope;
pub mod stage;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use pipeline::PurgePipeline;
pub use types::error::{S3purgeError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{PurgeCounters, PurgeMetrics, PurgeStats, Scope};
