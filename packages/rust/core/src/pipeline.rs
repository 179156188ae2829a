//! End-to-end sync run: catalog → prices → reconcile → publish.
//!
//! A [`Pipeline`] moves through [`Phase`]s strictly in order. Any fatal error
//! moves it to [`Phase::Failed`] and the remaining phases never run, so a
//! partially built table is never published.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use caddis_shared::{PriceListId, Result, SyncConfig, SyncError, TableSink, published_formats};
use caddis_source::{SourceClient, SourceSettings};

use crate::reconcile;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    FetchCatalog,
    FetchPrices,
    Reconcile,
    Publish,
    Done,
    Failed,
}

impl Phase {
    /// Human-readable label for progress output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "Initializing",
            Self::FetchCatalog => "Fetching article catalog",
            Self::FetchPrices => "Fetching price lists",
            Self::Reconcile => "Reconciling articles and prices",
            Self::Publish => "Publishing table",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::FetchCatalog => "fetch_catalog",
            Self::FetchPrices => "fetch_prices",
            Self::Reconcile => "reconcile",
            Self::Publish => "publish",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: Phase);
    /// Called once when the run completes.
    fn done(&self, report: &RunReport);
    /// Called once when the run fails; `at` is the phase that failed.
    fn failed(&self, at: Phase, error: &SyncError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: Phase) {}
    fn done(&self, _report: &RunReport) {}
    fn failed(&self, _at: Phase, _error: &SyncError) {}
}

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// Per-run settings for the driver.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Destination sheet (tab) name.
    pub sheet_name: String,
    /// Price lists to fetch, in published order.
    pub price_lists: Vec<PriceListId>,
}

impl From<&SyncConfig> for RunOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            sheet_name: config.sheet_name.clone(),
            price_lists: config.price_lists.clone(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Active articles extracted.
    pub articles: usize,
    /// Price entries extracted across all lists.
    pub price_entries: usize,
    /// Lists that stopped early on an error, with the error message.
    pub failed_lists: Vec<(PriceListId, String)>,
    /// Data rows in the table (header excluded).
    pub rows: usize,
    /// SHA-256 of the table contents.
    pub fingerprint: String,
    /// Whether the table was written to the sink.
    pub published: bool,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One sync run over an authenticated source and a destination sink.
///
/// Without a sink the run is a dry run: the table is built and
/// fingerprinted, and [`Phase::Publish`] is skipped.
pub struct Pipeline<'a> {
    source: &'a SourceClient,
    sink: Option<&'a dyn TableSink>,
    options: RunOptions,
    progress: &'a dyn ProgressReporter,
    run_id: Uuid,
    phase: Phase,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a SourceClient,
        sink: Option<&'a dyn TableSink>,
        options: RunOptions,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            source,
            sink,
            options,
            progress,
            run_id: Uuid::now_v7(),
            phase: Phase::Init,
        }
    }

    /// Current driver state.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Execute the run. A pipeline runs at most once.
    #[instrument(skip_all, fields(run_id = %self.run_id, sink = self.sink_name()))]
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.phase != Phase::Init {
            return Err(SyncError::config(format!(
                "pipeline {} already ran (phase {})",
                self.run_id, self.phase
            )));
        }

        match self.execute().await {
            Ok(report) => {
                self.enter(Phase::Done);
                info!(
                    rows = report.rows,
                    articles = report.articles,
                    price_entries = report.price_entries,
                    failed_lists = report.failed_lists.len(),
                    published = report.published,
                    fingerprint = %report.fingerprint,
                    elapsed_ms = report.elapsed.as_millis(),
                    "sync run complete"
                );
                self.progress.done(&report);
                Ok(report)
            }
            Err(e) => {
                let at = self.phase;
                self.phase = Phase::Failed;
                error!(phase = %at, error = %e, "sync run failed");
                self.progress.failed(at, &e);
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        info!(
            lists = self.options.price_lists.len(),
            sheet = %self.options.sheet_name,
            dry_run = self.sink.is_none(),
            "starting sync run"
        );

        self.enter(Phase::FetchCatalog);
        let catalog = self.source.fetch_articles().await?;

        self.enter(Phase::FetchPrices);
        let prices = self.source.fetch_prices(&self.options.price_lists).await;

        self.enter(Phase::Reconcile);
        let table = reconcile::combine(&catalog.articles, &prices.entries);
        let fingerprint = table.fingerprint();
        info!(rows = table.row_count(), columns = table.column_count(), "table built");

        let published = match self.sink {
            Some(sink) => {
                self.enter(Phase::Publish);
                let sheet = self.options.sheet_name.as_str();
                sink.replace(sheet, &table).await?;
                if let Err(e) = sink.apply_formats(sheet, &published_formats()).await {
                    warn!(sheet, error = %e, "table published but column formats were not applied");
                }
                true
            }
            None => {
                info!("dry run: skipping publish");
                false
            }
        };

        Ok(RunReport {
            run_id: self.run_id,
            started_at,
            articles: catalog.articles.len(),
            price_entries: prices.entries.len(),
            failed_lists: prices.failed_lists,
            rows: table.row_count(),
            fingerprint,
            published,
            elapsed: start.elapsed(),
        })
    }

    fn sink_name(&self) -> &str {
        self.sink.map_or("none", |sink| sink.name())
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        info!(phase = %phase, "entering phase");
        self.progress.phase(phase);
    }
}

/// Log in to the source and run one pipeline against `sink`.
///
/// Login happens before the first phase; an authentication failure is
/// reported as a failure in [`Phase::Init`]. `None` for `sink` is a dry run.
pub async fn run_sync(
    config: &SyncConfig,
    sink: Option<&dyn TableSink>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    progress.phase(Phase::Init);
    let settings = SourceSettings::from(config);
    let source = match SourceClient::login(&settings, &config.username, &config.password).await {
        Ok(source) => source,
        Err(e) => {
            error!(phase = %Phase::Init, error = %e, "sync run failed");
            progress.failed(Phase::Init, &e);
            return Err(e);
        }
    };

    Pipeline::new(&source, sink, RunOptions::from(config), progress)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use caddis_shared::{Cell, ColumnFormat, Table};

    use super::*;

    /// Sink that keeps every published table in memory.
    #[derive(Default)]
    struct MemorySink {
        tables: Mutex<Vec<(String, Table)>>,
        formats: Mutex<Vec<ColumnFormat>>,
        fail_replace: bool,
        fail_formats: bool,
    }

    #[async_trait]
    impl TableSink for MemorySink {
        async fn replace(&self, sheet: &str, table: &Table) -> Result<()> {
            if self.fail_replace {
                return Err(SyncError::Sink("quota exceeded".into()));
            }
            self.tables
                .lock()
                .unwrap()
                .push((sheet.to_string(), table.clone()));
            Ok(())
        }

        async fn apply_formats(&self, _sheet: &str, formats: &[ColumnFormat]) -> Result<()> {
            if self.fail_formats {
                return Err(SyncError::Sink("formatting rejected".into()));
            }
            self.formats.lock().unwrap().extend_from_slice(formats);
            Ok(())
        }

        fn name(&self) -> &str {
            "memory"
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<Phase>>,
        failed_at: Mutex<Option<Phase>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
        fn done(&self, _report: &RunReport) {}
        fn failed(&self, at: Phase, _error: &SyncError) {
            *self.failed_at.lock().unwrap() = Some(at);
        }
    }

    fn source(server: &MockServer) -> SourceClient {
        let settings = SourceSettings {
            base_url: Url::parse(&server.uri()).unwrap(),
            request_timeout: Duration::from_secs(5),
            page_delay: Duration::ZERO,
        };
        SourceClient::with_token(&settings, "test-token").unwrap()
    }

    fn options(lists: &[u32]) -> RunOptions {
        RunOptions {
            sheet_name: "Caddis Data".into(),
            price_lists: lists
                .iter()
                .map(|id| PriceListId::lookup(*id).unwrap())
                .collect(),
        }
    }

    async fn mount(
        server: &MockServer,
        route: &str,
        params: &[(&str, &str)],
        status: u16,
        body: serde_json::Value,
    ) {
        let mut mock = Mock::given(method("GET")).and(path(route));
        for (key, value) in params {
            mock = mock.and(query_param(*key, *value));
        }
        mock.respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Two active articles, one inactive, prices on lists 1 and 2.
    async fn upstream() -> MockServer {
        let server = MockServer::start().await;
        mount(
            &server,
            "/v1/articulos",
            &[("pagina", "1")],
            200,
            json!({"body": [
                {"id": 1, "sku": "B2", "nombre": "Boya", "tipo": "Producto", "marca": "Caddis", "grupo": "Náutica"},
                {"id": 2, "sku": "A1", "nombre": "Ancla", "tipo": "Producto", "marca": "Caddis", "grupo": "Náutica"},
                {"id": 3, "sku": "Z9", "nombre": "Vieja", "estado": "INACTIVO"}
            ]}),
        )
        .await;
        mount(&server, "/v1/articulos", &[("pagina", "2")], 404, json!({})).await;

        mount(
            &server,
            "/v1/articulos/precios",
            &[("lista", "1"), ("pagina", "1")],
            200,
            json!({"body": {"articulos": [
                {"sku": "A1", "precio_unitario": 100, "iva_tasa": 0.105},
                {"sku": "Z9", "precio_unitario": 5, "iva_tasa": 0.21},
                {"sku": "GHOST", "precio_unitario": 1, "iva_tasa": 0.21}
            ]}}),
        )
        .await;
        mount(
            &server,
            "/v1/articulos/precios",
            &[("lista", "1"), ("pagina", "2")],
            404,
            json!({}),
        )
        .await;
        mount(
            &server,
            "/v1/articulos/precios",
            &[("lista", "2"), ("pagina", "1")],
            200,
            json!({"body": {"articulos": [{"sku": "B2", "precio_unitario": "10", "iva_tasa": "0.21"}]}}),
        )
        .await;
        mount(
            &server,
            "/v1/articulos/precios",
            &[("lista", "2"), ("pagina", "2")],
            200,
            json!({"body": {"articulos": []}}),
        )
        .await;
        server
    }

    #[tokio::test]
    async fn full_run_publishes_sorted_table_with_formats() {
        let server = upstream().await;
        let source = source(&server);
        let sink = MemorySink::default();
        let progress = RecordingProgress::default();

        let mut pipeline = Pipeline::new(&source, Some(&sink), options(&[1, 2]), &progress);
        let report = pipeline.run().await.unwrap();

        assert_eq!(pipeline.phase(), Phase::Done);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                Phase::FetchCatalog,
                Phase::FetchPrices,
                Phase::Reconcile,
                Phase::Publish,
                Phase::Done
            ]
        );
        assert_eq!(report.articles, 2);
        assert_eq!(report.price_entries, 4);
        assert_eq!(report.rows, 2);
        assert!(report.published);
        assert_eq!(report.run_id, pipeline.run_id());

        let tables = sink.tables.lock().unwrap();
        assert_eq!(tables.len(), 1);
        let (sheet, table) = &tables[0];
        assert_eq!(sheet, "Caddis Data");
        assert_eq!(table.column_count(), 30);
        assert_eq!(table.rows[0][0], Cell::text("A1"));
        assert_eq!(table.rows[0][5], Cell::text("10,5"));
        assert_eq!(table.rows[0][6], Cell::Number("110.50".parse().unwrap()));
        assert_eq!(table.rows[1][0], Cell::text("B2"));
        assert_eq!(table.rows[1][5], Cell::text(""));
        assert_eq!(table.rows[1][7], Cell::Number("12.10".parse().unwrap()));
        assert_eq!(report.fingerprint, table.fingerprint());

        assert_eq!(*sink.formats.lock().unwrap(), published_formats());
    }

    #[tokio::test]
    async fn repeated_runs_produce_identical_tables() {
        let server = upstream().await;
        let source = source(&server);

        let sink = MemorySink::default();

        let first = Pipeline::new(&source, Some(&sink), options(&[1, 2]), &SilentProgress)
            .run()
            .await
            .unwrap();
        let second = Pipeline::new(&source, Some(&sink), options(&[1, 2]), &SilentProgress)
            .run()
            .await
            .unwrap();

        let tables = sink.tables.lock().unwrap();
        assert_eq!(tables[0].1, tables[1].1);

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn dry_run_skips_publish() {
        let server = upstream().await;
        let source = source(&server);
        let progress = RecordingProgress::default();

        let report = Pipeline::new(&source, None, options(&[1]), &progress)
            .run()
            .await
            .unwrap();

        assert!(!report.published);
        assert_eq!(report.rows, 2);
        assert!(!progress.phases.lock().unwrap().contains(&Phase::Publish));
    }

    #[tokio::test]
    async fn catalog_failure_fails_run_without_publishing() {
        let server = MockServer::start().await;
        mount(&server, "/v1/articulos", &[("pagina", "1")], 500, json!({})).await;
        let source = source(&server);
        let sink = MemorySink::default();
        let progress = RecordingProgress::default();

        let mut pipeline = Pipeline::new(&source, Some(&sink), options(&[1]), &progress);
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, SyncError::Http { status: 500, .. }));
        assert_eq!(pipeline.phase(), Phase::Failed);
        assert_eq!(*progress.failed_at.lock().unwrap(), Some(Phase::FetchCatalog));
        assert!(sink.tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_publishes_header_only() {
        let server = MockServer::start().await;
        mount(&server, "/v1/articulos", &[("pagina", "1")], 404, json!({})).await;
        mount(&server, "/v1/articulos/precios", &[("pagina", "1")], 404, json!({})).await;
        let source = source(&server);
        let sink = MemorySink::default();

        let report = Pipeline::new(&source, Some(&sink), options(&[1, 2]), &SilentProgress)
            .run()
            .await
            .unwrap();

        assert_eq!(report.rows, 0);
        let tables = sink.tables.lock().unwrap();
        assert_eq!(tables[0].1.header, Table::published_header());
        assert!(tables[0].1.rows.is_empty());
    }

    #[tokio::test]
    async fn sink_replace_failure_is_fatal() {
        let server = upstream().await;
        let source = source(&server);
        let sink = MemorySink {
            fail_replace: true,
            ..Default::default()
        };
        let progress = RecordingProgress::default();

        let mut pipeline = Pipeline::new(&source, Some(&sink), options(&[1]), &progress);
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, SyncError::Sink(_)));
        assert_eq!(pipeline.phase(), Phase::Failed);
        assert_eq!(*progress.failed_at.lock().unwrap(), Some(Phase::Publish));
    }

    #[tokio::test]
    async fn format_failure_only_warns() {
        let server = upstream().await;
        let source = source(&server);
        let sink = MemorySink {
            fail_formats: true,
            ..Default::default()
        };

        let mut pipeline = Pipeline::new(&source, Some(&sink), options(&[1]), &SilentProgress);
        let report = pipeline.run().await.unwrap();

        assert!(report.published);
        assert_eq!(pipeline.phase(), Phase::Done);
        assert_eq!(sink.tables.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_price_list_is_reported_not_fatal() {
        let server = upstream().await;
        mount(
            &server,
            "/v1/articulos/precios",
            &[("lista", "3"), ("pagina", "1")],
            502,
            json!({}),
        )
        .await;
        let source = source(&server);
        let sink = MemorySink::default();

        let report = Pipeline::new(&source, Some(&sink), options(&[1, 3]), &SilentProgress)
            .run()
            .await
            .unwrap();

        assert_eq!(report.failed_lists.len(), 1);
        assert_eq!(report.failed_lists[0].0.get(), 3);
        assert_eq!(report.rows, 2);
    }

    #[tokio::test]
    async fn pipeline_runs_once() {
        let server = upstream().await;
        let source = source(&server);

        let mut pipeline = Pipeline::new(&source, None, options(&[1]), &SilentProgress);
        pipeline.run().await.unwrap();
        assert!(pipeline.run().await.is_err());
        assert_eq!(pipeline.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn run_sync_reports_login_failure_in_init() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/login"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let config = SyncConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            username: "robot".into(),
            password: "pw".into(),
            request_timeout: Duration::from_secs(5),
            page_delay: Duration::ZERO,
            price_lists: vec![PriceListId::lookup(1).unwrap()],
            spreadsheet_id: "sheet-id".into(),
            sheet_name: "Caddis Data".into(),
            sheets_api_base: Url::parse("https://sheets.googleapis.com").unwrap(),
            access_token_env: "GOOGLE_OAUTH_ACCESS_TOKEN".into(),
        };
        let progress = RecordingProgress::default();

        let err = run_sync(&config, Some(&MemorySink::default()), &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Authentication(_)));
        assert_eq!(*progress.failed_at.lock().unwrap(), Some(Phase::Init));
    }
}
