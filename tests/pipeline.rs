//! Integration tests for the request handler, pipeline and batch orchestrator.
//!
//! Every collaborator is an in-memory mock: no network (apart from an
//! unroutable loopback URL), no model, no pdfium.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use docenrich::backend::{html, markdown};
use docenrich::{
    handle_value, process_batch_stream, BatchProgressCallback, BoxError, Collaborators,
    ConversionInput, DescriptionLanguage, DocumentConverter, DocumentFormat, Element,
    ElementBody, FigureInput, ImageCaptioner, Pipeline, PipelineConfig, Response, SourceSpec,
    Span, TableGrid, Translator,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Mock collaborators ───────────────────────────────────────────────────

/// Parses text and HTML for real; returns a fixed body for anything else.
struct MockConverter {
    fixed: ElementBody,
    calls: AtomicUsize,
}

impl MockConverter {
    fn new(fixed: ElementBody) -> Arc<Self> {
        Arc::new(Self {
            fixed,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DocumentConverter for MockConverter {
    fn model_id(&self) -> &str {
        "mock-converter"
    }

    async fn convert(&self, input: ConversionInput<'_>) -> Result<ElementBody, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = String::from_utf8_lossy(&tokio::fs::read(input.path).await?).into_owned();
        Ok(match input.format {
            DocumentFormat::Txt => markdown::parse(&text, None),
            DocumentFormat::Html => html::parse(&text),
            _ => self.fixed.clone(),
        })
    }
}

struct BrokenConverter;

#[async_trait]
impl DocumentConverter for BrokenConverter {
    fn model_id(&self) -> &str {
        "broken"
    }

    async fn convert(&self, _input: ConversionInput<'_>) -> Result<ElementBody, BoxError> {
        Err("layout model crashed".into())
    }
}

struct SlowConverter;

#[async_trait]
impl DocumentConverter for SlowConverter {
    fn model_id(&self) -> &str {
        "slow"
    }

    async fn convert(&self, _input: ConversionInput<'_>) -> Result<ElementBody, BoxError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(ElementBody::default())
    }
}

struct EchoCaptioner;

#[async_trait]
impl ImageCaptioner for EchoCaptioner {
    fn model_id(&self) -> &str {
        "mock-captioner"
    }

    async fn caption(&self, figure: FigureInput<'_>) -> Result<String, BoxError> {
        Ok(format!("A figure showing {}", figure.caption.unwrap_or("nothing")))
    }
}

struct PrefixTranslator;

#[async_trait]
impl Translator for PrefixTranslator {
    fn model_id(&self) -> &str {
        "mock-translator"
    }

    async fn translate(
        &self,
        text: &str,
        _from: DescriptionLanguage,
        to: DescriptionLanguage,
    ) -> Result<String, BoxError> {
        Ok(format!("[{}] {}", to.code(), text))
    }
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    batch_success: AtomicUsize,
}

impl BatchProgressCallback for CountingCallback {
    fn on_document_start(&self, _index: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, _index: usize, _total: usize, _content_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_error(&self, _index: usize, _total: usize, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _total: usize, success_count: usize) {
        self.batch_success.store(success_count, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Two captioned figures, a formula and a table, in that order.
fn rich_body() -> ElementBody {
    ElementBody::new(vec![
        Element::heading(1, "Quarterly report"),
        Element::figure("page-1", Some("Revenue by region".into())),
        Element::paragraph("Revenue grew strongly this quarter."),
        Element::formula("$$E = mc^2$$", Span::new(0, 12)),
        Element::figure("page-2", Some("Headcount".into())),
        Element::Table(
            TableGrid::new(vec![
                vec!["Year".into(), "Sales".into()],
                vec!["2023".into(), "1200".into()],
            ])
            .with_headers(true),
        ),
    ])
}

/// `RUST_LOG=docenrich=debug cargo test` shows pipeline logs.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> PipelineConfig {
    init_tracing();
    PipelineConfig::builder()
        .max_batch_size(5)
        .request_timeout_secs(30)
        .download_timeout_secs(5)
        .build()
        .unwrap()
}

fn full_pipeline(converter: Arc<dyn DocumentConverter>) -> Pipeline {
    Pipeline::new(
        config(),
        Collaborators::new(converter)
            .with_captioner(Arc::new(EchoCaptioner))
            .with_translator(Arc::new(PrefixTranslator)),
    )
}

fn b64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

async fn run(pipeline: &Pipeline, request: Value) -> Value {
    let response = handle_value(pipeline, request).await;
    serde_json::to_value(&response).unwrap()
}

fn pdf_request(extra: Value) -> Value {
    let mut request = json!({
        "document_base64": b64("%PDF-1.4 fake"),
        "filename": "report.pdf",
    });
    if let (Some(obj), Some(extra)) = (request.as_object_mut(), extra.as_object()) {
        obj.extend(extra.clone());
    }
    request
}

// ── Single documents ─────────────────────────────────────────────────────

#[tokio::test]
async fn plain_text_document_with_content_enhancement() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let out = run(
        &pipeline,
        json!({"input": {
            "document_base64": b64("Hello world"),
            "filename": "hello.txt",
            "enhance_content": true
        }}),
    )
    .await;

    assert_eq!(out["success"], true);
    assert_eq!(out["content"], "Hello world\n");
    assert_eq!(out["output_format"], "markdown");
    assert_eq!(out["source"], "base64");
    assert_eq!(out["filename"], "hello.txt");
    assert!(out.get("source_url").is_none());
    assert_eq!(out["content_enhancement"]["statistics"]["word_count"], 2);
    assert_eq!(out["content_enhancement"]["content_type"], "document");
    assert_eq!(out["content_enhancement"]["language_detected"], "unknown");
    assert_eq!(
        out["enhanced_features"],
        json!(["content_enhancement", "structure_analysis"])
    );
    assert_eq!(out["metadata"]["features_used"], out["enhanced_features"]);
    assert_eq!(out["metadata"]["file_path"], "hello.txt");
    for key in ["image_descriptions", "formula_enrichments", "table_analysis"] {
        assert!(out.get(key).is_none(), "{key} should be omitted");
    }
}

#[tokio::test]
async fn image_descriptions_without_formula_enrichment() {
    let pipeline = full_pipeline(MockConverter::new(rich_body()));
    let out = run(
        &pipeline,
        pdf_request(json!({
            "include_image_descriptions": true,
            "include_formula_enrichment": false
        })),
    )
    .await;

    assert_eq!(out["success"], true);
    let descriptions = out["image_descriptions"].as_array().unwrap();
    assert_eq!(descriptions.len(), 2);
    assert_eq!(descriptions[0]["index"], 1);
    assert_eq!(
        descriptions[0]["description_en"],
        "A figure showing Revenue by region"
    );
    assert_eq!(
        descriptions[0]["description_fr"],
        "[fr] A figure showing Revenue by region"
    );
    assert_eq!(descriptions[1]["index"], 4);
    assert!(out.get("formula_enrichments").is_none());

    let features = out["enhanced_features"].as_array().unwrap();
    assert!(features.contains(&json!("image_descriptions")));
    assert!(!features.contains(&json!("formula_enrichment")));
}

#[tokio::test]
async fn every_feature_enabled() {
    let pipeline = full_pipeline(MockConverter::new(rich_body()));
    let out = run(
        &pipeline,
        pdf_request(json!({
            "include_images": true,
            "include_tables": true,
            "include_image_descriptions": true,
            "include_formula_enrichment": true,
            "enhance_content": true
        })),
    )
    .await;

    assert_eq!(
        out["enhanced_features"],
        json!([
            "image_descriptions",
            "formula_enrichment",
            "table_analysis",
            "content_enhancement",
            "structure_analysis"
        ])
    );

    let formula = &out["formula_enrichments"][0];
    assert_eq!(formula["index"], 3);
    assert_eq!(formula["formula_type"], "equation");
    assert_eq!(formula["canonical_latex"], "$E = mc^2$");

    let table = &out["table_analysis"][0];
    assert_eq!(table["index"], 5);
    assert_eq!(table["rows"], 2);
    assert_eq!(table["cols"], 2);
    assert_eq!(table["has_headers"], true);

    assert_eq!(
        out["content_enhancement"]["content_type"],
        "document_with_formulas"
    );
    assert!(out["content"].as_str().unwrap().contains("![Revenue by region](page-1)"));
    assert!(out.get("enrichment_gaps").is_none());
}

#[tokio::test]
async fn image_descriptions_omitted_without_captioner() {
    let pipeline = Pipeline::new(config(), Collaborators::new(MockConverter::new(rich_body())));
    let out = run(
        &pipeline,
        pdf_request(json!({"include_image_descriptions": true})),
    )
    .await;

    assert_eq!(out["success"], true);
    assert!(out.get("image_descriptions").is_none());
    assert_eq!(out["enhanced_features"], json!(["structure_analysis"]));
}

#[tokio::test]
async fn structure_preserves_element_order() {
    let pipeline = full_pipeline(MockConverter::new(rich_body()));
    let out = run(&pipeline, pdf_request(json!({}))).await;

    let structure = &out["document_structure"];
    assert_eq!(structure["headings"][0]["index"], 0);
    assert_eq!(structure["headings"][0]["level"], 1);
    let figures: Vec<u64> = structure["figures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["index"].as_u64().unwrap())
        .collect();
    assert_eq!(figures, vec![1, 4]);
    assert_eq!(structure["formulas"][0]["index"], 3);
    assert_eq!(structure["formulas"][0]["text"], "E = mc^2");
    assert_eq!(structure["tables"][0]["index"], 5);
    assert_eq!(out["metadata"]["element_count"], 6);
}

#[tokio::test]
async fn html_output_dialect() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let source = "<html><body><h2>Menu</h2><ul><li>Soup</li></ul></body></html>";
    let out = run(
        &pipeline,
        json!({
            "document_base64": b64(source),
            "filename": "menu.html",
            "output_format": "html"
        }),
    )
    .await;

    let content = out["content"].as_str().unwrap();
    assert!(content.starts_with("<!DOCTYPE html>"));
    assert!(content.contains("<h2>Menu</h2>"));
    assert!(content.contains("<li>Soup"));
    assert_eq!(out["output_format"], "html");
}

#[tokio::test]
async fn table_analysis_from_markdown_text() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let text = "# Sales\n\n| Year | Sales |\n| --- | --- |\n| 2023 | 1200 |\n| 2024 | 1500 |\n";
    let out = run(
        &pipeline,
        json!({
            "document_base64": b64(text),
            "filename": "sales.txt",
            "include_tables": true
        }),
    )
    .await;

    let table = &out["table_analysis"][0];
    assert_eq!(table["index"], 1);
    assert_eq!(table["rows"], 3);
    assert_eq!(table["type"], "data_table");
    assert_eq!(table["summary"], "Tableau de 3 lignes et 2 colonnes");
    assert_eq!(table["summary_en"], "Table with 3 rows and 2 columns");
}

#[tokio::test]
async fn headers_inferred_for_tables_without_header_markup() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let sources = [
        (
            "sales.html",
            "<table><tr><td>Year</td><td>Sales</td></tr>\
             <tr><td>2022</td><td>1000</td></tr>\
             <tr><td>2023</td><td>1200</td></tr></table>",
        ),
        ("sales.txt", "| Year | Sales |\n| 2022 | 1000 |\n| 2023 | 1200 |\n"),
    ];

    for (filename, source) in sources {
        let out = run(
            &pipeline,
            json!({
                "document_base64": b64(source),
                "filename": filename,
                "include_tables": true
            }),
        )
        .await;

        let table = &out["table_analysis"][0];
        assert_eq!(table["has_headers"], true, "{filename}");
        assert_eq!(table["rows"], 3, "{filename}");
        assert_eq!(table["type"], "data_table", "{filename}");
    }
}

#[tokio::test]
async fn rendering_and_readability_are_deterministic() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let request = json!({
        "document_base64": b64("The cat sat on the mat. It was a sunny day and the cat was happy."),
        "filename": "cat.txt",
        "enhance_content": true
    });
    let first = run(&pipeline, request.clone()).await;
    let second = run(&pipeline, request).await;

    assert_eq!(first["content"], second["content"]);
    let score = first["content_enhancement"]["readability_score"]
        .as_f64()
        .unwrap();
    assert_eq!(
        Some(score),
        second["content_enhancement"]["readability_score"].as_f64()
    );
    assert!((0.0..=100.0).contains(&score));
}

// ── Errors ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn model_info_skips_resolution_and_conversion() {
    let converter = MockConverter::new(ElementBody::default());
    let pipeline = full_pipeline(converter.clone());
    let out = run(&pipeline, json!({"input": {"get_model_info": true}})).await;

    assert_eq!(out["success"], true);
    assert!(out.get("content").is_none());
    assert_eq!(out["model_info"]["conversion_model"], "mock-converter");
    assert_eq!(out["model_info"]["caption_model"], "mock-captioner");
    assert_eq!(out["model_info"]["formula_model"], "template");
    assert_eq!(out["model_info"]["supported_ocr_languages"]["fra"], "French");
    assert_eq!(out["supported_formats"]["output"], json!(["markdown", "html"]));
    assert!(out["available_features"]
        .as_array()
        .unwrap()
        .contains(&json!("image_descriptions")));
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_info_reports_missing_captioner() {
    let pipeline = Pipeline::new(
        config(),
        Collaborators::new(MockConverter::new(ElementBody::default())),
    );
    let info = pipeline.model_info();
    assert_eq!(info.model_info.features["image_descriptions"], false);
    assert!(!info
        .available_features
        .contains(&"image_descriptions".to_string()));
    assert!(info.model_info.caption_model.is_none());
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let out = run(&pipeline, json!({"input": {}})).await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "InvalidInput");
    assert_eq!(out["error"], "Invalid input: No input data provided");
}

#[tokio::test]
async fn both_sources_is_invalid_input() {
    let converter = MockConverter::new(ElementBody::default());
    let pipeline = full_pipeline(converter.clone());
    let out = run(
        &pipeline,
        json!({"document_url": "https://example.org/a.pdf", "document_base64": b64("x")}),
    )
    .await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "InvalidInput");
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_output_format_fails_before_conversion() {
    let converter = MockConverter::new(ElementBody::default());
    let pipeline = full_pipeline(converter.clone());
    let out = run(
        &pipeline,
        json!({"document_base64": b64("Hello"), "filename": "a.txt", "output_format": "latex"}),
    )
    .await;
    assert_eq!(out["kind"], "InvalidInput");
    assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_extension() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let out = run(
        &pipeline,
        json!({"document_base64": b64("MZ binary"), "filename": "setup.exe"}),
    )
    .await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "UnsupportedFormat");
}

#[tokio::test]
async fn invalid_base64_payload() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let out = run(
        &pipeline,
        json!({"document_base64": "not base64 at all!!", "filename": "a.txt"}),
    )
    .await;
    assert_eq!(out["kind"], "InvalidInput");
}

#[tokio::test]
async fn converter_failure_is_conversion_failed() {
    let pipeline = full_pipeline(Arc::new(BrokenConverter));
    let out = run(&pipeline, pdf_request(json!({}))).await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "ConversionFailed");
    assert!(out["error"].as_str().unwrap().contains("layout model crashed"));
}

#[tokio::test]
async fn slow_document_times_out() {
    let config = PipelineConfig::builder()
        .request_timeout_secs(1)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config, Collaborators::new(Arc::new(SlowConverter)));
    let out = run(&pipeline, pdf_request(json!({}))).await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "Timeout");
}

// ── Batches ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_isolates_invalid_items() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let out = run(
        &pipeline,
        json!({
            "documents": [
                {"base64": b64("First document"), "filename": "one.txt"},
                {"filename": "nothing.txt"},
                {"base64": b64("Third document"), "filename": "three.txt"}
            ],
            "enhance_content": true
        }),
    )
    .await;

    let results = out["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(out["success"], false);
    assert_eq!(out["total_documents"], 3);
    assert_eq!(out["successful_conversions"], 2);
    assert_eq!(out["failed_conversions"], 1);

    assert_eq!(results[0]["index"], 0);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["result"]["content"], "First document\n");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error"]["kind"], "InvalidInput");
    assert_eq!(results[1]["error"]["index"], 1);
    assert_eq!(results[2]["result"]["filename"], "three.txt");
    assert!(results[2]["result"]["content_enhancement"].is_object());
}

#[tokio::test]
async fn batch_with_unreachable_url() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let response = handle_value(
        &pipeline,
        json!({
            "documents": [
                {"url": "http://127.0.0.1:9/missing.pdf"},
                {"base64": b64("Still fine"), "filename": "ok.txt"}
            ]
        }),
    )
    .await;

    let Response::Batch(batch) = response else {
        panic!("expected a batch response");
    };
    assert_eq!(batch.results.len(), 2);
    let failure = batch.results[0].error().unwrap();
    assert_eq!(failure.kind, docenrich::ErrorKind::ConversionFailed);
    let ok = batch.results[1].result().unwrap();
    assert_eq!(ok.content, "Still fine\n");
    assert_eq!(batch.successful_conversions, 1);
}

#[tokio::test]
async fn batch_over_limit_is_rejected() {
    let pipeline = full_pipeline(MockConverter::new(ElementBody::default()));
    let docs: Vec<Value> = (0..6)
        .map(|i| json!({"base64": b64("x"), "filename": format!("{i}.txt")}))
        .collect();
    let out = run(&pipeline, json!({ "documents": docs })).await;
    assert_eq!(out["success"], false);
    assert_eq!(out["kind"], "InvalidInput");
}

#[tokio::test]
async fn batch_progress_callbacks() {
    let cb = Arc::new(CountingCallback::default());
    let config = PipelineConfig::builder()
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let pipeline = Pipeline::new(
        config,
        Collaborators::new(MockConverter::new(ElementBody::default())),
    );
    let entries = vec![
        Ok(SourceSpec::inline(b64("a"), Some("a.txt".into()))),
        Ok(SourceSpec::inline(b64("b"), Some("b.exe".into()))),
    ];
    let result = pipeline
        .process_batch(entries, &Default::default())
        .await;

    assert_eq!(result.successful_conversions, 1);
    assert_eq!(cb.started.load(Ordering::SeqCst), 2);
    assert_eq!(cb.completed.load(Ordering::SeqCst), 1);
    assert_eq!(cb.failed.load(Ordering::SeqCst), 1);
    assert_eq!(cb.batch_success.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn streaming_batch_yields_items_in_order() {
    let pipeline = Arc::new(full_pipeline(MockConverter::new(ElementBody::default())));
    let entries = vec![
        Ok(SourceSpec::inline(b64("one"), Some("1.txt".into()))),
        Err(docenrich::EnrichError::invalid_input("missing source")),
        Ok(SourceSpec::inline(b64("three"), Some("3.txt".into()))),
    ];
    let items: Vec<_> = process_batch_stream(pipeline, entries, Default::default())
        .collect()
        .await;

    assert_eq!(items.len(), 3);
    let indices: Vec<usize> = items.iter().map(|i| i.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(items[0].is_ok());
    assert!(!items[1].is_ok());
    assert_eq!(items[2].result().unwrap().content, "three\n");
}
