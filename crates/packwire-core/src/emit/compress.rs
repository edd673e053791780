//! Gzip sidecars for large text assets.

use crate::pipeline::CompressionOptions;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Gzip `data` at the highest level.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Render a sidecar template: `[path]` is the asset name without its query,
/// `[query]` the query including `?` (or nothing).
pub fn sidecar_name(template: &str, asset: &str) -> String {
    let (path, query) = match asset.find('?') {
        Some(at) => asset.split_at(at),
        None => (asset, ""),
    };
    template.replace("[path]", path).replace("[query]", query)
}

/// Sidecars for every asset the options select.
///
/// An asset qualifies when its name matches `options.test`, it is strictly
/// larger than `options.threshold`, and the compressed size is at most
/// `options.min_ratio` of the original.
pub fn compress_assets(
    assets: &BTreeMap<String, Vec<u8>>,
    options: &CompressionOptions,
) -> io::Result<Vec<(String, Vec<u8>)>> {
    let mut sidecars = Vec::new();

    for (name, content) in assets {
        if !options.test.is_match(name) || content.len() as u64 <= options.threshold {
            continue;
        }

        let compressed = gzip(content)?;
        let ratio = compressed.len() as f64 / content.len() as f64;
        if ratio > options.min_ratio {
            tracing::debug!(asset = %name, ratio, "gzip not worth it");
            continue;
        }

        sidecars.push((sidecar_name(&options.asset, name), compressed));
    }

    Ok(sidecars)
}
