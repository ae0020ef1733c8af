pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers as evaluation;
use crate::extraction::handlers as extraction;
use crate::extraction::validation::MAX_PDF_BYTES;
use crate::state::AppState;

/// Room for one file per form slot plus multipart overhead.
pub const MAX_UPLOAD_BODY_BYTES: usize = 3 * MAX_PDF_BYTES as usize + 1024 * 1024;

/// Largest batch upload, in maximum-size files. Bodies beyond this get a 413
/// for the whole request.
pub const MAX_BATCH_FILES: usize = 10;
pub const MAX_BATCH_BODY_BYTES: usize = MAX_BATCH_FILES * MAX_PDF_BYTES as usize + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/evaluations", post(evaluation::handle_evaluate))
        .route(
            "/api/v1/evaluations/form",
            post(evaluation::handle_evaluate_form),
        )
        .route("/api/v1/extractions", post(extraction::handle_extract))
        .route(
            "/api/v1/extractions/batch",
            post(extraction::handle_extract_batch)
                .layer(DefaultBodyLimit::max(MAX_BATCH_BODY_BYTES)),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::evaluation::Evaluator;
    use crate::extraction::extractor::PageTextParser;
    use crate::extraction::{ExtractionMode, PdfExtractor};
    use crate::llm_client::{LlmError, TextModel};

    const BOUNDARY: &str = "markwise-test-boundary";

    const GRADE_REPLY: &str = r#"{"score": 10, "feedback": "Correct.", "mistakes": [], "strengths": ["Accurate"],
        "idealAnswerCorrection": {"isIncorrect": true, "suggestedCorrection": "Paris", "explanation": "London is in the UK."},
        "teacherAlert": "Ideal answer is wrong."}"#;

    struct RecordingModel {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TextModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(GRADE_REPLY.to_string())
        }
    }

    /// Treats the uploaded bytes as UTF-8 text split on form feeds.
    struct FormFeedPages;

    impl PageTextParser for FormFeedPages {
        fn parse_pages(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>> {
            Ok(String::from_utf8(bytes.to_vec())?
                .split('\x0c')
                .map(String::from)
                .collect())
        }
    }

    fn app() -> (Router, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let state = AppState {
            evaluator: Evaluator::new(Arc::new(RecordingModel {
                prompts: Arc::clone(&prompts),
            })),
            extractor: PdfExtractor::with_parser(ExtractionMode::Parser, Arc::new(FormFeedPages)),
        };
        (build_router(state), prompts)
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File {
            name: &'a str,
            file_name: &'a str,
            content_type: &'a str,
            data: &'a [u8],
        },
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, value: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "markwise-api");
    }

    #[tokio::test]
    async fn test_evaluate_json() {
        let (app, prompts) = app();
        let request = json_request(
            "/api/v1/evaluations",
            json!({
                "question": "Capital of France?",
                "idealAnswer": "London",
                "studentAnswer": "Paris",
                "useAdvancedRubric": false
            }),
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 10.0);
        assert_eq!(body["idealAnswerCorrection"]["isIncorrect"], true);
        assert_eq!(body["idealAnswerCorrection"]["suggestedCorrection"], "Paris");
        assert_eq!(body["rubric"], "standard");
        assert!(body["evaluationId"].is_string());
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_json_blank_field() {
        let (app, prompts) = app();
        let request = json_request(
            "/api/v1/evaluations",
            json!({"question": "Q", "idealAnswer": " ", "studentAnswer": "A"}),
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_form_with_pdf_slot() {
        let (app, prompts) = app();
        let request = multipart_request(
            "/api/v1/evaluations/form",
            &[
                Part::Text("question", "Capital of France?"),
                Part::File {
                    name: "ideal_answer",
                    file_name: "key.pdf",
                    content_type: "application/pdf",
                    data: b"The capital\x0cis London",
                },
                Part::Text("student_answer", "Paris"),
                Part::Text("use_advanced_rubric", "on"),
            ],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rubric"], "advanced");
        let prompts = prompts.lock().unwrap();
        assert!(prompts[0].contains("\"Ideal Answer\": The capital\n\nis London"));
    }

    #[tokio::test]
    async fn test_evaluate_form_reports_every_bad_slot() {
        let (app, prompts) = app();
        let request = multipart_request(
            "/api/v1/evaluations/form",
            &[
                Part::Text("ideal_answer", "London"),
                Part::File {
                    name: "student_answer",
                    file_name: "answer.png",
                    content_type: "image/png",
                    data: b"\x89PNG",
                },
            ],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields = body["error"]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["field"], "question");
        assert_eq!(fields[1]["field"], "student_answer");
        assert!(fields[1]["message"]
            .as_str()
            .unwrap()
            .contains("Invalid PDF file: answer.png"));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_single_file() {
        let (app, _) = app();
        let request = multipart_request(
            "/api/v1/extractions",
            &[Part::File {
                name: "file",
                file_name: "notes.pdf",
                content_type: "application/pdf",
                data: b"page one\x0cpage two",
            }],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "page one\n\npage two");
        assert_eq!(body["source"], "parsed");
        assert_eq!(body["page_count"], 2);
    }

    #[tokio::test]
    async fn test_large_upload_is_spooled_and_extracted() {
        let (app, _) = app();
        let data = vec![b'a'; 2 * 1024 * 1024];
        let request = multipart_request(
            "/api/v1/extractions",
            &[Part::File {
                name: "file",
                file_name: "scan.pdf",
                content_type: "application/pdf",
                data: &data,
            }],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"].as_str().unwrap().len(), data.len());
    }

    #[tokio::test]
    async fn test_batch_accepts_body_beyond_form_limit() {
        let (app, _) = app();
        let data = vec![b'x'; 8 * 1024 * 1024];
        let names = ["a.bin", "b.bin", "c.bin", "d.bin"];
        let parts: Vec<Part<'_>> = names
            .iter()
            .map(|name| Part::File {
                name: "files",
                file_name: *name,
                content_type: "application/octet-stream",
                data: &data,
            })
            .collect();
        let request = multipart_request("/api/v1/extractions/batch", &parts);

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[3], "Invalid PDF file: d.bin");
    }

    #[tokio::test]
    async fn test_form_body_over_limit_is_rejected() {
        let (app, prompts) = app();
        let data = vec![b'x'; MAX_UPLOAD_BODY_BYTES + 1];
        let request = multipart_request(
            "/api/v1/evaluations/form",
            &[Part::File {
                name: "student_answer",
                file_name: "huge.pdf",
                content_type: "application/pdf",
                data: &data,
            }],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_rejects_non_pdf() {
        let (app, _) = app();
        let request = multipart_request(
            "/api/v1/extractions",
            &[Part::File {
                name: "file",
                file_name: "notes.txt",
                content_type: "text/plain",
                data: b"hello",
            }],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FILE");
    }

    #[tokio::test]
    async fn test_extract_without_file_field() {
        let (app, _) = app();
        let request = multipart_request("/api/v1/extractions", &[Part::Text("other", "x")]);
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_extraction_one_entry_per_file() {
        let (app, _) = app();
        let request = multipart_request(
            "/api/v1/extractions/batch",
            &[
                Part::File {
                    name: "files",
                    file_name: "a.pdf",
                    content_type: "application/pdf",
                    data: b"alpha",
                },
                Part::File {
                    name: "files",
                    file_name: "b.docx",
                    content_type: "application/msword",
                    data: b"beta",
                },
                Part::File {
                    name: "files",
                    file_name: "c.pdf",
                    content_type: "application/pdf",
                    data: b"\xff\xfe not utf8",
                },
            ],
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], "alpha");
        assert_eq!(results[1], "Invalid PDF file: b.docx");
        assert!(results[2]
            .as_str()
            .unwrap()
            .starts_with("Error extracting from c.pdf"));
    }
}
