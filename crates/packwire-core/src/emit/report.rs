//! Bundle size report.

use super::compress::gzip;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;

/// Report file written next to the build output.
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStat {
    pub name: String,
    pub size: u64,
    pub gzip_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    pub hash: String,
    /// Largest first.
    pub assets: Vec<AssetStat>,
}

impl BundleReport {
    /// Measure every asset except gzip sidecars.
    pub fn measure(hash: &str, assets: &BTreeMap<String, Vec<u8>>) -> io::Result<Self> {
        let mut stats = Vec::with_capacity(assets.len());
        for (name, content) in assets {
            if name.ends_with(".gz") {
                continue;
            }
            stats.push(AssetStat {
                name: name.clone(),
                size: content.len() as u64,
                gzip_size: gzip(content)?.len() as u64,
            });
        }
        stats.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));

        Ok(Self {
            hash: hash.to_string(),
            assets: stats,
        })
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }

    /// Plain-text table: name, size, gzip size.
    #[must_use]
    pub fn table(&self) -> String {
        let width = self
            .assets
            .iter()
            .map(|a| a.name.len())
            .max()
            .unwrap_or(0)
            .max("Asset".len());

        let mut out = format!("{:<width$}  {:>10}  {:>10}\n", "Asset", "Size", "Gzipped");
        for asset in &self.assets {
            out.push_str(&format!(
                "{:<width$}  {:>10}  {:>10}\n",
                asset.name,
                format_size(asset.size),
                format_size(asset.gzip_size)
            ));
        }
        out
    }
}

/// Human-readable byte count.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.2} KiB", b / KIB)
    } else {
        format!("{:.2} MiB", b / (KIB * KIB))
    }
}
