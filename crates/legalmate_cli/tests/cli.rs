use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;

const CORPUS: &str = r#"[
  {"question": "How do I lodge a VCAT application?", "answer": "File form X with VCAT.", "source": "https://vcat.vic.gov.au"},
  {"question": "Can my landlord keep my bond?", "answer": "Only with your agreement or a VCAT order.", "source": "https://www.consumer.vic.gov.au/bonds"}
]"#;

fn bin() -> Command {
    let path = assert_cmd::cargo::cargo_bin!("legalmate");
    let mut cmd = Command::new(path);
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("LEGALMATE_CORPUS")
        .env_remove("LEGALMATE_MODEL_PATH")
        .env_remove("LEGALMATE_TOKENIZER_PATH")
        .env_remove("LEGALMATE_ENDPOINT")
        .env_remove("LEGALMATE_TIMEOUT_SECS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_corpus(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("legal_faqs.json");
    std::fs::write(&path, body).unwrap();
    path
}

fn corpus_arg(path: &Path) -> String {
    path.display().to_string()
}

fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return;
            }
        }
    }
}

/// Serves a single canned HTTP response and returns the endpoint URL.
fn provider_stub(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
    });
    url
}

#[test]
fn search_reports_corpus_route_for_known_question() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["search", "--question", "How do I lodge a VCAT application?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("decision=FromCorpus"))
        .stdout(predicate::str::contains("entry=0 score=1.0000"));
}

#[test]
fn search_on_empty_corpus_reports_no_match() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, "[]");

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["search", "--question", "anything"])
        .assert()
        .success()
        .stdout(predicate::str::contains("decision=no_match"));
}

#[test]
fn search_rejects_zero_top_k() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["search", "--question", "How do I lodge a VCAT application?", "--top-k", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--top-k"))
        .stdout(predicate::str::contains("no_match").not());
}

#[test]
fn ask_rejects_zero_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str(), "--timeout-secs", "0"])
        .args(["ask", "--question", "What's the weather in Melbourne?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout-secs"));
}

#[test]
fn ask_without_api_key_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["ask", "--question", "How do I lodge a VCAT application?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key not found"));
}

#[test]
fn missing_corpus_is_fatal() {
    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", "/nonexistent/legal_faqs.json"])
        .args(["ask", "--question", "q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("open corpus"));
}

#[test]
fn invalid_record_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(
        &dir,
        r#"[{"question": "q", "answer": "a", "source": "not a url"}]"#,
    );

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["ask", "--question", "q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("corpus record 0"));
}

#[test]
fn ask_answers_known_question_from_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["--endpoint", "http://127.0.0.1:9/unused"])
        .args(["ask", "--question", "How do I lodge a VCAT application?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("File form X with VCAT."))
        .stdout(predicate::str::contains("https://vcat.vic.gov.au"));
}

#[test]
fn ask_json_reports_route() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    let assert = bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["ask", "--json", "--question", "Can my landlord keep my bond?"])
        .assert()
        .success();

    let json: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["route"]["kind"], "corpus");
    assert_eq!(json["route"]["entry_index"], 1);
}

#[test]
fn unrelated_question_uses_generated_answer() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);
    let endpoint = provider_stub(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"I only cover Victorian consumer law."}}]}"#,
    );

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str(), "--endpoint", endpoint.as_str()])
        .args(["ask", "--question", "What's the weather in Melbourne?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("I only cover Victorian consumer law."))
        .stdout(predicate::str::contains("may not reflect official legal guidance"));
}

#[test]
fn rate_limited_provider_yields_apology() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);
    let endpoint = provider_stub(
        "429 Too Many Requests",
        r#"{"error":{"message":"Rate limit reached"}}"#,
    );

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str(), "--endpoint", endpoint.as_str()])
        .args(["ask", "--question", "What's the weather in Melbourne?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("too many requests"));
}

#[test]
fn unreachable_provider_yields_generic_apology() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);
    // bind then drop so nothing is listening on the port
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["--endpoint", format!("http://127.0.0.1:{port}/v1/chat/completions").as_str()])
        .args(["ask", "--question", "What's the weather in Melbourne?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Please try again later."));
}

#[test]
fn chat_reads_queries_until_exit() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);

    bin()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["--corpus", corpus_arg(&corpus).as_str(), "chat"])
        .write_stdin("How do I lodge a VCAT application?\nCan my landlord keep my bond?\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("does not constitute legal advice"))
        .stdout(predicate::str::contains("File form X with VCAT."))
        .stdout(predicate::str::contains("Only with your agreement"));
}

#[test]
fn eval_exit_code_follows_pass_rate() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_corpus(&dir, CORPUS);
    let cases = dir.path().join("cases.json");
    std::fs::write(
        &cases,
        r#"[
          {"case_id": "lodge", "question": "How do I lodge a VCAT application?", "expected_route": "from_corpus", "expected_entry": 0},
          {"case_id": "weather", "question": "What's the weather in Melbourne?", "expected_route": "from_fallback"}
        ]"#,
    )
    .unwrap();

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str()])
        .args(["eval", "--cases", cases.display().to_string().as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("passed=2"))
        .stdout(predicate::str::contains("meets_threshold=true"));

    bin()
        .args(["--corpus", corpus_arg(&corpus).as_str(), "--threshold", "1.0"])
        .args(["eval", "--cases", cases.display().to_string().as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("below required"));
}
