// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persisted artifacts
//!
//! - Community summaries: pretty JSON array, the hand-off to querying
//! - Knowledge graph: GML with a `label` on every edge
//! - Text units: JSON array or JSON Lines of `{id, text}`
//!
//! Every write goes to a temp file first and is renamed into place.

use crate::error::{GraphRagError, Result};
use crate::knowledge_graph::entities::{CommunitySummaryRecord, TextUnit};
use crate::knowledge_graph::graph::KnowledgeGraph;
use std::fmt::Write as _;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through `write` into a temp file, then rename over `path`
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    let result = write(&mut writer).and_then(|_| writer.flush().map_err(GraphRagError::from));
    drop(writer);

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Save community summaries
pub fn save_summaries(path: &Path, records: &[CommunitySummaryRecord]) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, records)?;
        writer.write_all(b"\n")?;
        Ok(())
    })?;

    info!(path = %path.display(), records = records.len(), "Saved community summaries");
    Ok(())
}

/// Load community summaries. Missing, unreadable, or empty input is fatal.
pub fn load_summaries(path: &Path) -> Result<Vec<CommunitySummaryRecord>> {
    if !path.exists() {
        return Err(GraphRagError::MissingInput(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let records: Vec<CommunitySummaryRecord> =
        serde_json::from_str(&content).map_err(|e| GraphRagError::InvalidArtifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if records.is_empty() {
        return Err(GraphRagError::EmptySummaries(path.to_path_buf()));
    }

    info!(path = %path.display(), records = records.len(), "Loaded community summaries");
    Ok(records)
}

/// Escape a GML string: quotes, ampersands, control and non-ASCII
/// characters become HTML character references
fn escape_gml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let _ = write!(out, "&#{};", c as u32);
            }
        }
    }
    out
}

/// Render the graph as GML
pub fn render_gml(graph: &KnowledgeGraph) -> String {
    let mut out = String::from("graph [\n");

    for (id, name) in graph.nodes().iter().enumerate() {
        let _ = write!(
            out,
            "  node [\n    id {}\n    label \"{}\"\n  ]\n",
            id,
            escape_gml(name)
        );
    }

    for edge in graph.edges() {
        let (source, target) = edge.endpoints;
        let _ = write!(
            out,
            "  edge [\n    source {}\n    target {}\n    label \"{}\"\n  ]\n",
            source,
            target,
            escape_gml(&edge.label())
        );
    }

    out.push_str("]\n");
    out
}

/// Write the graph as GML
pub fn save_graph_gml(path: &Path, graph: &KnowledgeGraph) -> Result<()> {
    let gml = render_gml(graph);
    write_atomic(path, |writer| {
        writer.write_all(gml.as_bytes())?;
        Ok(())
    })?;

    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Saved knowledge graph"
    );
    Ok(())
}

/// Load text units from a JSON array or JSON Lines file
pub fn load_text_units(path: &Path) -> Result<Vec<TextUnit>> {
    if !path.exists() {
        return Err(GraphRagError::MissingInput(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let invalid = |reason: String| GraphRagError::InvalidArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let units: Vec<TextUnit> = if content.trim_start().starts_with('[') {
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?
    } else {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .map_err(|e| invalid(format!("line {}: {}", index + 1, e)))
            })
            .collect::<Result<_>>()?
    };

    if units.is_empty() {
        return Err(GraphRagError::EmptyInput(format!(
            "no text units in {}",
            path.display()
        )));
    }

    info!(path = %path.display(), units = units.len(), "Loaded text units");
    Ok(units)
}
