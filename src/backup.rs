//! Zip bundles of a data directory.
//!
//! A bundle holds `manifest.json` plus one `data/<file>` entry per store
//! file. The manifest records a SHA-256 per entry; imports refuse bundles
//! whose entries do not match.

use anyhow::{anyhow, bail, Context};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT_V1: &str = "educore-data-v1";

/// Files that make up a data directory, in bundle order.
pub const DATA_FILES: &[&str] = &[
    "users.json",
    "homeworks.json",
    "certificates.json",
    "login_logs.json",
    "preference.json",
];

const MANIFEST: &str = "manifest.json";

fn entry_name(file: &str) -> String {
    format!("data/{}", file)
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format: String,
    pub restored: Vec<String>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn put_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, opts)
        .with_context(|| format!("cannot add {} to bundle", name))?;
    zip.write_all(bytes)
        .with_context(|| format!("cannot write {} into bundle", name))
}

fn take_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle has no {}", name))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("cannot extract {}", name))?;
    Ok(bytes)
}

/// Writes every present store file of `data_dir` into a new bundle at
/// `out_path`. Missing files are skipped; an empty directory is an error.
pub fn export_data_bundle(data_dir: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let mut present = Vec::new();
    for &file in DATA_FILES {
        let src = data_dir.join(file);
        if src.is_file() {
            let bytes = std::fs::read(&src)
                .with_context(|| format!("cannot read {}", src.display()))?;
            present.push((file, bytes));
        }
    }
    if present.is_empty() {
        bail!("no data files found in {}", data_dir.display());
    }

    let sums: serde_json::Map<String, serde_json::Value> = present
        .iter()
        .map(|(file, bytes)| (file.to_string(), sha256_hex(bytes).into()))
        .collect();
    let manifest = serde_json::json!({
        "format": BUNDLE_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "createdAt": chrono::Utc::now().to_rfc3339(),
        "sha256": sums,
    });

    if let Some(dir) = out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let out = File::create(out_path)
        .with_context(|| format!("cannot create bundle {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out);

    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
    put_entry(&mut zip, MANIFEST, &manifest_bytes)?;
    for (file, bytes) in &present {
        put_entry(&mut zip, &entry_name(file), bytes)?;
    }
    zip.finish().context("cannot finish bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: present.len() + 1,
    })
}

/// Restores the data files of a bundle into `data_dir`. Every entry is read,
/// checksummed and passed to `check` before any file is replaced.
pub fn import_data_bundle(
    in_path: &Path,
    data_dir: &Path,
    check: impl Fn(&str, &[u8]) -> anyhow::Result<()>,
) -> anyhow::Result<ImportSummary> {
    let input = File::open(in_path)
        .with_context(|| format!("cannot open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(input).context("not a zip bundle")?;

    let manifest_bytes = take_entry(&mut archive, MANIFEST)?;
    let manifest: serde_json::Value =
        serde_json::from_slice(&manifest_bytes).context("manifest.json is not valid JSON")?;
    let format = manifest["format"].as_str().unwrap_or_default();
    if format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {:?}", format);
    }
    let sums = manifest["sha256"]
        .as_object()
        .ok_or_else(|| anyhow!("manifest.json has no checksums"))?;

    let mut verified = Vec::new();
    for &file in DATA_FILES {
        let Some(expected) = sums.get(file).and_then(|v| v.as_str()) else {
            continue;
        };
        let bytes = take_entry(&mut archive, &entry_name(file))?;
        if sha256_hex(&bytes) != expected {
            bail!("checksum mismatch for {}", file);
        }
        check(file, &bytes).with_context(|| format!("{} in bundle is not valid", file))?;
        verified.push((file, bytes));
    }
    if verified.is_empty() {
        bail!("bundle contains no data files");
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("cannot create {}", data_dir.display()))?;
    for (file, bytes) in &verified {
        let staged = data_dir.join(format!("{}.importing", file));
        std::fs::write(&staged, bytes)
            .with_context(|| format!("cannot write {}", staged.display()))?;
        std::fs::rename(&staged, data_dir.join(file))
            .with_context(|| format!("cannot replace {}", file))?;
    }

    Ok(ImportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        restored: verified.into_iter().map(|(f, _)| f.to_string()).collect(),
    })
}
