//! Collector: drives one collection run end to end

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::progress::{ProgressReporter, ProgressSink};
use super::CollectError;
use crate::config::CollectorConfig;
use crate::fetcher::{CredentialProvider, RawReportPage, ReportFetcher, ReportRequest};
use crate::metrics::WindowMetrics;
use crate::output::RecordSink;
use crate::scheduler::WorkerScheduler;
use crate::shutdown::SharedShutdown;
use crate::window::{DailyWindows, TimeWindow};

/// Everything a window task needs besides its window
struct WindowContext {
    token: String,
    fetcher: Arc<dyn ReportFetcher>,
    sink: Arc<dyn RecordSink>,
    page_size: u32,
    order_by: u8,
}

/// Collects daily usage reports into a [`RecordSink`]
pub struct Collector {
    credentials: Arc<dyn CredentialProvider>,
    fetcher: Arc<dyn ReportFetcher>,
    sink: Arc<dyn RecordSink>,
    anchor: Option<DateTime<Utc>>,
}

impl Collector {
    /// Create a collector from its collaborators
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        fetcher: Arc<dyn ReportFetcher>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            credentials,
            fetcher,
            sink,
            anchor: None,
        }
    }

    /// Count windows back from `anchor` instead of the current time
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Collect the configured number of daily windows
    ///
    /// Returns after every submitted window finished, with the first window
    /// error if any failed. Progress reaches `1.0` only when the run
    /// succeeds.
    pub async fn execute(
        &self,
        config: &CollectorConfig,
        progress: &dyn ProgressSink,
        shutdown: SharedShutdown,
    ) -> Result<(), CollectError> {
        let span = info_span!(
            "collect",
            windows = config.number_of_windows_to_collect,
            pool_size = config.pool_size,
            rate_limit = config.rate_limit_per_second,
        );
        let mut reporter = ProgressReporter::new(progress);

        let result = self
            .run(config, &mut reporter, shutdown)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            reporter.failed();
            match e {
                CollectError::Cancelled => warn!("Collection cancelled"),
                e => error!(error = %e, stage = e.stage(), "Collection failed"),
            }
        }
        result
    }

    async fn run(
        &self,
        config: &CollectorConfig,
        reporter: &mut ProgressReporter<'_>,
        shutdown: SharedShutdown,
    ) -> Result<(), CollectError> {
        reporter.started();
        config.validate()?;

        if shutdown.is_cancelled() {
            return Err(CollectError::Cancelled);
        }
        let token = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(CollectError::Cancelled),
            token = self.credentials.access_token() => token?,
        };
        reporter.credential_acquired();

        self.sink.clear().await.map_err(CollectError::PreClear)?;
        reporter.prior_data_cleared();

        let anchor = self.anchor.unwrap_or_else(Utc::now);
        let windows = DailyWindows::new(config.number_of_windows_to_collect, anchor);
        let total = windows.len();
        info!(total, "Collecting daily windows");
        reporter.windows_ready(total);

        let scheduler = WorkerScheduler::<CollectError>::new(
            config.pool_size,
            config.rate_limit_per_second,
            shutdown,
        )?;
        let context = Arc::new(WindowContext {
            token,
            fetcher: self.fetcher.clone(),
            sink: self.sink.clone(),
            page_size: config.page_size,
            order_by: config.order_by,
        });

        for window in windows {
            reporter.dispatching_window();
            scheduler
                .submit(collect_window(window, context.clone()))
                .await?;
        }

        reporter.draining();
        scheduler.wait_until_finish().await?;
        reporter.done();
        info!(total, "Collection finished");
        Ok(())
    }
}

async fn collect_window(window: TimeWindow, context: Arc<WindowContext>) -> Result<(), CollectError> {
    let span = info_span!("window", start = %window.start.format("%Y-%m-%d"));
    async move {
        let metrics = WindowMetrics::start(window.start);
        match fetch_and_store(&window, &context).await {
            Ok(records) => {
                metrics.record_success(records);
                Ok(())
            }
            Err(e) => {
                metrics.record_failure(e.stage());
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

/// One fetch, decode and save for `window`; returns the number of records stored
async fn fetch_and_store(window: &TimeWindow, context: &WindowContext) -> Result<usize, CollectError> {
    let window_start = window.start;
    let request = ReportRequest::for_window(window, context.page_size, context.order_by);

    let body = context
        .fetcher
        .fetch(&request, &context.token)
        .await
        .map_err(|source| CollectError::Fetch {
            window_start,
            source,
        })?;

    let page = RawReportPage::decode(&body).map_err(|source| CollectError::Decode {
        window_start,
        source,
    })?;
    if !page.is_success() {
        return Err(CollectError::Api {
            window_start,
            code: page.code,
            msg: page.msg,
        });
    }

    let records = page.into_records(window_start);
    let count = records.len();
    context
        .sink
        .save_records(records)
        .await
        .map_err(|source| CollectError::Sink {
            window_start,
            source,
        })?;

    debug!(window = %window, records = count, "Window stored");
    Ok(count)
}
