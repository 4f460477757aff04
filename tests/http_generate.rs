use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use stereogramaxo::{
    application::{
        generator::{GeneratorRunner, InvocationError, InvocationResult},
        pipeline::GenerationService,
    },
    infra::{
        http::{HttpState, build_router},
        outputs::OutputDirectory,
        staging::StagingArea,
    },
};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "stereogramaxo-test-boundary";
const BODY_LIMIT: usize = 64 * 1024;

/// Answers every run with a fixed exit code and stdout, recording the arguments.
struct FakeGenerator {
    exit_code: i32,
    stdout: String,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeGenerator {
    fn answering(exit_code: i32, stdout: &str) -> Arc<Self> {
        Arc::new(Self {
            exit_code,
            stdout: stdout.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl GeneratorRunner for FakeGenerator {
    async fn run(&self, args: Vec<OsString>) -> Result<InvocationResult, InvocationError> {
        self.calls.lock().expect("calls lock").push(
            args.iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
        );
        Ok(InvocationResult::new(Some(self.exit_code), self.stdout.clone()))
    }
}

struct TestApp {
    _dir: TempDir,
    router: Router,
    staging_root: PathBuf,
    output_root: PathBuf,
}

fn app(generator: Arc<FakeGenerator>) -> TestApp {
    let dir = TempDir::new().expect("temp dir");
    let staging = StagingArea::new(dir.path().join("staging")).expect("staging");
    let output = OutputDirectory::new(dir.path().join("out"), "out").expect("output");
    let staging_root = staging.root().to_path_buf();
    let output_root = output.directory().to_path_buf();

    let service = GenerationService::new(Arc::new(staging), generator, output);
    let router = build_router(
        HttpState {
            generation: Arc::new(service),
        },
        BODY_LIMIT,
    );

    TestApp {
        _dir: dir,
        router,
        staging_root,
        output_root,
    }
}

enum Part<'a> {
    Field(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, payload) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(payload);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_generate(router: &Router, parts: &[Part<'_>]) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    router.clone().oneshot(request).await.expect("response")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn staged_files(root: &Path) -> usize {
    std::fs::read_dir(root).expect("read staging").count()
}

#[tokio::test]
async fn text_depthmap_with_dots_returns_prefixed_url() {
    let generator = FakeGenerator::answering(0, "{\"text\":\"img123.png\",\"code\":200}\n");
    let app = app(generator.clone());

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "text"),
            Part::Field("depthmap_text", "Hola"),
            Part::Field("pattern_switches", "dots"),
            Part::Field("force_depth", "on"),
            Part::Field("forced_depth", "80"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "text": "out/img123.png", "code": 200 })
    );

    let output = app.output_root.to_string_lossy().into_owned();
    assert_eq!(
        generator.calls(),
        [vec![
            "--text=Hola".to_string(),
            "--dots".into(),
            "-w".into(),
            "--forcedepth".into(),
            "0.8".into(),
            "-o".into(),
            output,
        ]]
    );
}

#[tokio::test]
async fn uploaded_files_are_staged_and_passed_by_path() {
    let generator = FakeGenerator::answering(0, r#"{"text":"result.png","code":200}"#);
    let app = app(generator.clone());

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "file"),
            Part::Field("pattern_switches", "file"),
            Part::File("depthmap_file", "shark depth.png", b"depth bytes"),
            Part::File("pattern_file", "tile.jpg", b"pattern bytes"),
            Part::Field("blur", "4"),
            Part::Field("view_mode", "c"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let args = &calls[0];
    assert_eq!(args[0], "-d");
    assert_eq!(args[2], "-p");
    assert_eq!(&args[4..7], ["-b", "4", "-c"]);

    let depth = PathBuf::from(&args[1]);
    let pattern = PathBuf::from(&args[3]);
    assert_eq!(depth.parent(), Some(app.staging_root.as_path()));
    assert_eq!(pattern.parent(), Some(app.staging_root.as_path()));
    assert_eq!(std::fs::read(&depth).expect("depth staged"), b"depth bytes");
    assert_eq!(
        std::fs::read(&pattern).expect("pattern staged"),
        b"pattern bytes"
    );
}

#[tokio::test]
async fn validation_failures_are_client_errors() {
    let cases: Vec<(Vec<Part<'_>>, &str)> = vec![
        (
            vec![Part::Field("dm_switches", "text")],
            "You must select a depthmap and pattern mode",
        ),
        (
            vec![
                Part::Field("dm_switches", "text"),
                Part::Field("pattern_switches", "dots"),
            ],
            "You must input some text for a text depthmap",
        ),
        (
            vec![
                Part::Field("dm_switches", "text"),
                Part::Field("depthmap_text", "Hola"),
                Part::Field("pattern_switches", "dots"),
                Part::Field("blur", "abc"),
            ],
            "Invalid blur value",
        ),
        (
            vec![
                Part::Field("dm_switches", "text"),
                Part::Field("depthmap_text", "two\nlines"),
                Part::Field("pattern_switches", "dots"),
            ],
            "Depthmap text contains unsupported characters",
        ),
        (
            vec![
                Part::Field("dm_switches", "file"),
                Part::Field("pattern_switches", "dots"),
                Part::File("depthmap_file", "notes.txt", b"not an image"),
            ],
            "Unsupported image type for depthmap_file",
        ),
    ];

    for (parts, message) in cases {
        let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
        let app = app(generator.clone());

        let response = post_generate(&app.router, &parts).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{message}");
        assert_eq!(json_body(response).await, json!({ "error": message }));
        assert!(generator.calls().is_empty());
        assert_eq!(staged_files(&app.staging_root), 0, "{message}");
    }
}

#[tokio::test]
async fn empty_file_part_counts_as_missing_upload() {
    let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
    let app = app(generator);

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "file"),
            Part::Field("pattern_switches", "dots"),
            Part::File("depthmap_file", "", b""),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "You must attach an image for an image depthmap" })
    );
}

#[tokio::test]
async fn exit_126_is_reported_as_permission_issue() {
    let generator = FakeGenerator::answering(126, "");
    let app = app(generator);

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "text"),
            Part::Field("depthmap_text", "Hola"),
            Part::Field("pattern_switches", "dots"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "permission issue on server" })
    );
}

#[tokio::test]
async fn unreadable_generator_output_is_a_generic_server_error() {
    let generator = FakeGenerator::answering(0, "Traceback (most recent call last):");
    let app = app(generator);

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "text"),
            Part::Field("depthmap_text", "Hola"),
            Part::Field("pattern_switches", "dots"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "unknown server error" })
    );
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
    let app = app(generator.clone());
    let payload = vec![0_u8; BODY_LIMIT * 2];

    let response = post_generate(
        &app.router,
        &[
            Part::Field("dm_switches", "file"),
            Part::Field("pattern_switches", "dots"),
            Part::File("depthmap_file", "huge.png", &payload),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "request body too large" })
    );
    assert!(generator.calls().is_empty());
    assert_eq!(staged_files(&app.staging_root), 0);
}

#[tokio::test]
async fn non_multipart_body_is_malformed() {
    let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
    let app = app(generator);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"dm_switches":"text"}"#))
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "malformed multipart request" })
    );
}

#[tokio::test]
async fn generated_images_are_served_from_the_public_path() {
    let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
    let app = app(generator);
    std::fs::write(app.output_root.join("img123.png"), b"png bytes").expect("write output");
    std::fs::write(app.output_root.join(".hidden.png"), b"secret").expect("write hidden");

    let response = get(&app.router, "/out/img123.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("image/png")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&bytes[..], b"png bytes");

    for uri in ["/out/missing.png", "/out/.hidden.png", "/out/..%2Fsecret.png"] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn health_check_has_no_content() {
    let generator = FakeGenerator::answering(0, r#"{"text":"x.png"}"#);
    let app = app(generator);

    let response = get(&app.router, "/_health").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
