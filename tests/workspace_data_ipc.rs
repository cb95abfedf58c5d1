use serde_json::json;
use sha2::{Digest, Sha256};
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

#[test]
fn preferences_work_before_sign_in_and_persist() {
    let config_dir = temp_dir("educore-prefs-config");
    let data_dir = temp_dir("educore-prefs-data");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );

    let prefs = request_ok(&mut stdin, &mut reader, "2", "preferences.get", json!({}));
    assert_eq!(
        prefs.pointer("/preferences/language").and_then(|v| v.as_str()),
        Some("en")
    );
    assert_eq!(
        prefs.pointer("/preferences/darkMode").and_then(|v| v.as_bool()),
        Some(false)
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "preferences.update",
        json!({ "patch": { "rememberedEmail": "todd@school.test", "darkMode": true } }),
    );
    let prefs = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "preferences.update",
        json!({ "patch": { "language": "it" } }),
    );
    assert_eq!(
        prefs.pointer("/preferences/rememberedEmail").and_then(|v| v.as_str()),
        Some("todd@school.test")
    );
    assert_eq!(
        prefs.pointer("/preferences/language").and_then(|v| v.as_str()),
        Some("it")
    );
    assert_eq!(
        prefs.pointer("/preferences/darkMode").and_then(|v| v.as_bool()),
        Some(true)
    );

    let missing = request(&mut stdin, &mut reader, "5", "preferences.update", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();

    // A new process sees the stored values; null forgets the e-mail.
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );
    let prefs = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "preferences.update",
        json!({ "patch": { "rememberedEmail": null } }),
    );
    assert!(prefs
        .pointer("/preferences/rememberedEmail")
        .map(|v| v.is_null())
        .unwrap_or(true));
    assert_eq!(
        prefs.pointer("/preferences/language").and_then(|v| v.as_str()),
        Some("it")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn corrupt_store_files_read_as_empty() {
    let config_dir = temp_dir("educore-corrupt-config");
    let data_dir = temp_dir("educore-corrupt-data");
    std::fs::write(data_dir.join("homeworks.json"), "{ this is not json").expect("corrupt");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "admin@educore.local", "password": "admin" }),
    );
    let list = request_ok(&mut stdin, &mut reader, "3", "homework.list", json!({}));
    assert_eq!(
        list.get("homeworks").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn backup_export_and_import_over_ipc() {
    let config_dir = temp_dir("educore-backup-config");
    let data_dir = temp_dir("educore-backup-data");
    let bundle = temp_dir("educore-backup-out").join("school.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "admin@educore.local", "password": "admin" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({ "name": "Todd", "email": "todd@school.test", "password": "todd", "classId": "5a" }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("educore-data-v1")
    );
    assert!(bundle.is_file());

    let todd = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "users.list",
        json!({ "role": "student" }),
    );
    let todd_id = todd
        .pointer("/users/0/id")
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "users.delete",
        json!({ "userId": todd_id }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert!(imported
        .get("restored")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().any(|n| n.as_str() == Some("users.json")))
        .unwrap_or(false));

    // Import ends the session.
    let signed_out = request(&mut stdin, &mut reader, "8", "users.list", json!({}));
    assert_eq!(error_code(&signed_out), "not_signed_in");

    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "auth.login",
        json!({ "email": "admin@educore.local", "password": "admin" }),
    );
    let students = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "users.list",
        json!({ "role": "student" }),
    );
    assert_eq!(
        students.get("users").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "11",
        "backup.import",
        json!({ "inPath": data_dir.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing), "backup_failed");

    drop(stdin);
    let _ = child.wait();
}

fn write_bundle(path: &PathBuf, file: &str, bytes: &[u8]) {
    let sum: String = Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    let out = std::fs::File::create(path).expect("create bundle");
    let mut zip = zip::ZipWriter::new(out);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest");
    let manifest = json!({ "format": "educore-data-v1", "sha256": { file: sum } });
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file(format!("data/{}", file), opts)
        .expect("data entry");
    zip.write_all(bytes).expect("write data");
    zip.finish().expect("finish");
}

#[test]
fn backup_with_wrong_record_shape_is_refused() {
    let config_dir = temp_dir("educore-shape-config");
    let data_dir = temp_dir("educore-shape-data");
    let bundle = temp_dir("educore-shape-out").join("users-object.zip");
    write_bundle(&bundle, "users.json", b"{}");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&config_dir);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": data_dir.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "admin@educore.local", "password": "admin" }),
    );
    let refused = request(
        &mut stdin,
        &mut reader,
        "3",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(error_code(&refused), "backup_failed");

    // Nothing was replaced and the admin is still signed in.
    let users = request_ok(&mut stdin, &mut reader, "4", "users.list", json!({}));
    assert_eq!(
        users.get("users").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
}
