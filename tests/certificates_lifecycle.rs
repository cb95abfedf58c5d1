use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(config_dir: &PathBuf) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_educored");
    let mut child = Command::new(exe)
        .env("CONFIG_DIR", config_dir)
        .env("EDUCORE_TIME_SOURCE", "system")
        .env("LOG_LEVEL", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn educored");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn login(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    email: &str,
    password: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        &format!("login-{}", email),
        "auth.login",
        json!({ "email": email, "password": password }),
    );
    assert_eq!(result.get("authenticated").and_then(|v| v.as_bool()), Some(true));
    result
        .pointer("/user/id")
        .and_then(|v| v.as_str())
        .expect("user id")
        .to_string()
}

/// Opens a fresh data directory and creates one teacher and two students.
fn seed_school(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, data_dir: &PathBuf) {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );
    login(stdin, reader, "admin@educore.local", "admin");
    let accounts = [
        json!({
            "name": "Mr. Keating",
            "email": "keating@school.test",
            "password": "carpe",
            "role": "teacher",
            "subjects": ["English"],
            "taughtClasses": ["5a"]
        }),
        json!({
            "name": "Todd",
            "email": "todd@school.test",
            "password": "todd",
            "role": "student",
            "classId": "5a"
        }),
        json!({
            "name": "Neil",
            "email": "neil@school.test",
            "password": "neil",
            "role": "student",
            "classId": "6b"
        }),
    ];
    for (i, account) in accounts.into_iter().enumerate() {
        request_ok(stdin, reader, &format!("seed-{}", i), "users.create", account);
    }
}

#[test]
fn certificate_create_upload_approve_flow() {
    let config_dir = temp_dir("educore-cert-config");
    let data_dir = temp_dir("educore-cert-data");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    seed_school(&mut stdin, &mut reader, &data_dir);

    let todd = login(&mut stdin, &mut reader, "todd@school.test", "todd");
    let keating = login(&mut stdin, &mut reader, "keating@school.test", "carpe");

    let backwards = request(
        &mut stdin,
        &mut reader,
        "1",
        "certificates.create",
        json!({ "userId": todd, "startDate": "2024-03-10", "endDate": "2024-03-01" }),
    );
    assert_eq!(error_code(&backwards), "invalid");

    let for_teacher = request(
        &mut stdin,
        &mut reader,
        "2",
        "certificates.create",
        json!({ "userId": keating, "startDate": "2024-03-01", "endDate": "2024-03-02" }),
    );
    assert_eq!(error_code(&for_teacher), "invalid");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "certificates.create",
        json!({ "userId": todd, "startDate": "2024-03-01", "endDate": "2024-03-03" }),
    );
    let cert_id = created
        .pointer("/certificate/id")
        .and_then(|v| v.as_str())
        .expect("certificate id")
        .to_string();
    assert_eq!(
        created.pointer("/certificate/filePath").and_then(|v| v.as_str()),
        Some("-")
    );
    assert_eq!(
        created.pointer("/certificate/approvedStatus").and_then(|v| v.as_bool()),
        Some(false)
    );

    let premature = request(
        &mut stdin,
        &mut reader,
        "4",
        "certificates.approve",
        json!({ "certificateId": cert_id }),
    );
    assert_eq!(error_code(&premature), "invalid");

    // Other students cannot see the certificate at all.
    login(&mut stdin, &mut reader, "neil@school.test", "neil");
    let hidden = request(
        &mut stdin,
        &mut reader,
        "5",
        "certificates.upload",
        json!({ "certificateId": cert_id, "filePath": "/tmp/x.pdf", "certificateType": "medical" }),
    );
    assert_eq!(error_code(&hidden), "not_found");
    let neil_list = request_ok(&mut stdin, &mut reader, "6", "certificates.list", json!({}));
    assert_eq!(
        neil_list.get("certificates").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    login(&mut stdin, &mut reader, "todd@school.test", "todd");
    let uploaded = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "certificates.upload",
        json!({
            "certificateId": cert_id,
            "filePath": "/tmp/doctor-note.pdf",
            "certificateType": "medical"
        }),
    );
    assert_eq!(
        uploaded.pointer("/certificate/certificateType").and_then(|v| v.as_str()),
        Some("medical")
    );

    login(&mut stdin, &mut reader, "keating@school.test", "carpe");
    let pending = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "certificates.list",
        json!({ "approved": false }),
    );
    assert_eq!(
        pending.get("certificates").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
    let approved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "certificates.approve",
        json!({ "certificateId": cert_id }),
    );
    assert_eq!(
        approved.pointer("/certificate/approvedStatus").and_then(|v| v.as_bool()),
        Some(true)
    );

    // Approval is final for the student's document.
    login(&mut stdin, &mut reader, "todd@school.test", "todd");
    let replace = request(
        &mut stdin,
        &mut reader,
        "10",
        "certificates.upload",
        json!({
            "certificateId": cert_id,
            "filePath": "/tmp/other.pdf",
            "certificateType": "medical"
        }),
    );
    assert_eq!(error_code(&replace), "invalid");
    let own = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "certificates.get",
        json!({ "certificateId": cert_id }),
    );
    assert_eq!(
        own.pointer("/certificate/filePath").and_then(|v| v.as_str()),
        Some("/tmp/doctor-note.pdf")
    );
    let no_delete = request(
        &mut stdin,
        &mut reader,
        "12",
        "certificates.delete",
        json!({ "certificateId": cert_id }),
    );
    assert_eq!(error_code(&no_delete), "forbidden");

    login(&mut stdin, &mut reader, "keating@school.test", "carpe");
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "certificates.delete",
        json!({ "certificateId": cert_id }),
    );
    assert_eq!(deleted.get("deleted").and_then(|v| v.as_bool()), Some(true));
    let remaining = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "certificates.list",
        json!({ "userId": todd }),
    );
    assert_eq!(
        remaining.get("certificates").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
}
