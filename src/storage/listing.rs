//! Directory listing producer
//!
//! LIST streams whatever a `ListingProducer` renders for a directory. The
//! default producer renders `ls -l` style lines.

use chrono::{DateTime, Local};
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Renders the listing text sent over the data connection for LIST.
pub trait ListingProducer: Send + Sync {
    fn produce_listing(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// `ls -l` style listing of a directory (or of a single file).
#[derive(Debug, Default, Clone)]
pub struct DirectoryLister;

impl ListingProducer for DirectoryLister {
    fn produce_listing(&self, path: &Path) -> io::Result<Vec<u8>> {
        let metadata = fs::metadata(path)?;
        let mut listing = String::new();

        if !metadata.is_dir() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            listing.push_str(&format_entry(&name, &metadata));
            return Ok(listing.into_bytes());
        }

        let mut entries: Vec<(String, Metadata)> = fs::read_dir(path)?
            .flatten()
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                Some((entry.file_name().to_string_lossy().to_string(), metadata))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, metadata) in &entries {
            listing.push_str(&format_entry(name, metadata));
        }
        Ok(listing.into_bytes())
    }
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

fn permission_string(metadata: &Metadata) -> String {
    let mode = mode_bits(metadata);
    let kind = if metadata.is_dir() {
        'd'
    } else if metadata.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

fn format_entry(name: &str, metadata: &Metadata) -> String {
    let modified = metadata
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());

    format!(
        "{} 1 ftp ftp {:>12} {} {}\r\n",
        permission_string(metadata),
        metadata.len(),
        modified.format("%b %d %H:%M"),
        name
    )
}
