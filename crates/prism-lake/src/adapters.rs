//! Frames → typed indexer models.
//!
//! Community-level filtering follows the indexer's rules: only nodes at
//! `level <= community_level` count, a node without a community belongs to
//! `-1`, and an entity that appears at several levels keeps its highest
//! community id.

use std::collections::{BTreeMap, HashMap, HashSet};

use prism_core::Frame;
use prism_core::entities::{Attributes, CommunityReport, Covariate, Entity, Relationship, TextUnit};
use prism_core::frame::{value_to_f64, value_to_i64, value_to_string};
use serde_json::Value;

use crate::LakeError;

const CLAIM_ATTRIBUTES: [&str; 5] = ["object_id", "status", "start_date", "end_date", "description"];

// ── Column helpers ──────────────────────────────────────────────────────

fn require(frame: &Frame, table: &str, column: &str) -> Result<usize, LakeError> {
    frame
        .column_index(column)
        .ok_or_else(|| LakeError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

fn cell<'a>(frame: &'a Frame, row: usize, col: Option<usize>) -> &'a Value {
    col.and_then(|c| frame.rows()[row].get(c))
        .unwrap_or(&Value::Null)
}

fn text(frame: &Frame, row: usize, col: Option<usize>) -> Option<String> {
    value_to_string(cell(frame, row, col))
}

/// JSON list → strings. A bare scalar becomes a one-element list.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
        Value::Null => Vec::new(),
        other => value_to_string(other).into_iter().collect(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn embedding(value: &Value) -> Option<Vec<f32>> {
    let Value::Array(items) = value else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Community id as the indexer renders it: integral values without a
/// fraction, null as `-1`.
fn community_key(value: &Value) -> String {
    match value {
        Value::Null => "-1".to_string(),
        other => value_to_i64(other).map_or_else(
            || value_to_string(other).unwrap_or_default(),
            |n| n.to_string(),
        ),
    }
}

fn within_level(frame: &Frame, row: usize, level_col: usize, level: u32) -> bool {
    value_to_i64(&frame.rows()[row][level_col]).is_some_and(|l| l <= i64::from(level))
}

/// `title → max community` over nodes at or below `level`.
fn max_community_by_title(
    nodes: &Frame,
    level: u32,
) -> Result<BTreeMap<String, i64>, LakeError> {
    let level_col = require(nodes, "nodes", "level")?;
    let title_col = require(nodes, "nodes", "title")?;
    let community_col = nodes.column_index("community");

    let mut best: BTreeMap<String, i64> = BTreeMap::new();
    for row in 0..nodes.len() {
        if !within_level(nodes, row, level_col, level) {
            continue;
        }
        let Some(title) = text(nodes, row, Some(title_col)) else {
            continue;
        };
        let community = value_to_i64(cell(nodes, row, community_col)).unwrap_or(-1);
        best.entry(title)
            .and_modify(|c| *c = (*c).max(community))
            .or_insert(community);
    }
    Ok(best)
}

// ── Reports ─────────────────────────────────────────────────────────────

/// Reports at or below `level` whose community still owns at least one
/// entity after level filtering.
///
/// # Errors
///
/// Returns [`LakeError::MissingColumn`] when a required column is absent.
pub fn read_indexer_reports(
    reports: &Frame,
    nodes: &Frame,
    level: u32,
) -> Result<Vec<CommunityReport>, LakeError> {
    if reports.is_empty() || nodes.is_empty() {
        return Ok(Vec::new());
    }
    let communities: HashSet<String> = max_community_by_title(nodes, level)?
        .into_values()
        .map(|c| c.to_string())
        .collect();

    let community_col = require(reports, "community_reports", "community")?;
    let level_col = require(reports, "community_reports", "level")?;
    let title_col = require(reports, "community_reports", "title")?;
    let content_col = require(reports, "community_reports", "full_content")?;
    let summary_col = reports.column_index("summary");
    let rank_col = reports.column_index("rank");

    let mut out = Vec::new();
    for row in 0..reports.len() {
        if !within_level(reports, row, level_col, level) {
            continue;
        }
        let community = community_key(cell(reports, row, Some(community_col)));
        if !communities.contains(&community) {
            continue;
        }
        out.push(CommunityReport {
            id: community.clone(),
            short_id: community.clone(),
            title: text(reports, row, Some(title_col)).unwrap_or_default(),
            community_id: community,
            summary: text(reports, row, summary_col).unwrap_or_default(),
            full_content: text(reports, row, Some(content_col)).unwrap_or_default(),
            rank: value_to_f64(cell(reports, row, rank_col)).unwrap_or(0.0),
            attributes: Attributes::new(),
        });
    }
    Ok(out)
}

// ── Entities ────────────────────────────────────────────────────────────

/// Entities at or below `level`, joined with their descriptions and
/// embeddings by name. Sorted by name, one entity per name.
///
/// # Errors
///
/// Returns [`LakeError::MissingColumn`] when a required column is absent.
pub fn read_indexer_entities(
    nodes: &Frame,
    entities: &Frame,
    level: u32,
) -> Result<Vec<Entity>, LakeError> {
    if nodes.is_empty() || entities.is_empty() {
        return Ok(Vec::new());
    }
    let level_col = require(nodes, "nodes", "level")?;
    let title_col = require(nodes, "nodes", "title")?;
    let degree_col = require(nodes, "nodes", "degree")?;
    let community_col = nodes.column_index("community");

    // (name, rank) → max community, ordered like a group-by.
    let mut grouped: BTreeMap<(String, i64), i64> = BTreeMap::new();
    for row in 0..nodes.len() {
        if !within_level(nodes, row, level_col, level) {
            continue;
        }
        let Some(name) = text(nodes, row, Some(title_col)) else {
            continue;
        };
        let rank = value_to_i64(cell(nodes, row, Some(degree_col))).unwrap_or(0);
        let community = value_to_i64(cell(nodes, row, community_col)).unwrap_or(-1);
        grouped
            .entry((name, rank))
            .and_modify(|c| *c = (*c).max(community))
            .or_insert(community);
    }

    let name_col = entities
        .column_index("name")
        .or_else(|| entities.column_index("title"))
        .ok_or_else(|| LakeError::MissingColumn {
            table: "entities".to_string(),
            column: "name".to_string(),
        })?;
    let id_col = require(entities, "entities", "id")?;
    let short_id_col = entities.column_index("human_readable_id");
    let type_col = entities.column_index("type");
    let description_col = entities.column_index("description");
    let embedding_col = entities.column_index("description_embedding");
    let text_units_col = entities.column_index("text_unit_ids");

    let mut first_row_by_name: HashMap<String, usize> = HashMap::new();
    for row in 0..entities.len() {
        if let Some(name) = text(entities, row, Some(name_col)) {
            first_row_by_name.entry(name).or_insert(row);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for ((name, rank), community) in grouped {
        let Some(&row) = first_row_by_name.get(&name) else {
            continue;
        };
        if !seen.insert(name.clone()) {
            continue;
        }
        out.push(Entity {
            id: text(entities, row, Some(id_col)).unwrap_or_default(),
            short_id: text(entities, row, short_id_col),
            title: name,
            entity_type: text(entities, row, type_col),
            description: text(entities, row, description_col),
            description_embedding: embedding(cell(entities, row, embedding_col)),
            community_ids: vec![community.to_string()],
            text_unit_ids: string_list(cell(entities, row, text_units_col)),
            rank,
            attributes: Attributes::new(),
        });
    }
    Ok(out)
}

// ── Relationships, text units, claims ───────────────────────────────────

/// # Errors
///
/// Returns [`LakeError::MissingColumn`] without `source` or `target`.
pub fn read_indexer_relationships(relationships: &Frame) -> Result<Vec<Relationship>, LakeError> {
    if relationships.is_empty() {
        return Ok(Vec::new());
    }
    let source_col = require(relationships, "relationships", "source")?;
    let target_col = require(relationships, "relationships", "target")?;
    let id_col = relationships.column_index("id");
    let short_id_col = relationships.column_index("human_readable_id");
    let weight_col = relationships.column_index("weight");
    let description_col = relationships.column_index("description");
    let text_units_col = relationships.column_index("text_unit_ids");
    let rank_col = relationships.column_index("rank");

    Ok((0..relationships.len())
        .map(|row| {
            let rank = value_to_i64(cell(relationships, row, rank_col)).unwrap_or(0);
            let mut attributes = Attributes::new();
            attributes.insert("rank".to_string(), Value::from(rank));
            Relationship {
                id: text(relationships, row, id_col).unwrap_or_else(|| row.to_string()),
                short_id: text(relationships, row, short_id_col),
                source: text(relationships, row, Some(source_col)).unwrap_or_default(),
                target: text(relationships, row, Some(target_col)).unwrap_or_default(),
                weight: value_to_f64(cell(relationships, row, weight_col)).unwrap_or(1.0),
                description: text(relationships, row, description_col),
                text_unit_ids: string_list(cell(relationships, row, text_units_col)),
                rank,
                attributes,
            }
        })
        .collect())
}

/// Text units; `short_id` is the row position.
///
/// # Errors
///
/// Returns [`LakeError::MissingColumn`] without `id` or `text`.
pub fn read_indexer_text_units(text_units: &Frame) -> Result<Vec<TextUnit>, LakeError> {
    if text_units.is_empty() {
        return Ok(Vec::new());
    }
    let id_col = require(text_units, "text_units", "id")?;
    let text_col = require(text_units, "text_units", "text")?;
    let entities_col = text_units.column_index("entity_ids");
    let relationships_col = text_units.column_index("relationship_ids");
    let tokens_col = text_units.column_index("n_tokens");
    let documents_col = text_units.column_index("document_ids");

    Ok((0..text_units.len())
        .map(|row| TextUnit {
            id: text(text_units, row, Some(id_col)).unwrap_or_default(),
            short_id: row.to_string(),
            text: text(text_units, row, Some(text_col)).unwrap_or_default(),
            entity_ids: string_list(cell(text_units, row, entities_col)),
            relationship_ids: string_list(cell(text_units, row, relationships_col)),
            n_tokens: value_to_i64(cell(text_units, row, tokens_col)),
            document_ids: string_list(cell(text_units, row, documents_col)),
        })
        .collect())
}

/// Claims.
///
/// # Errors
///
/// Returns [`LakeError::MissingColumn`] without `id` or `subject_id`.
pub fn read_indexer_covariates(covariates: &Frame) -> Result<Vec<Covariate>, LakeError> {
    if covariates.is_empty() {
        return Ok(Vec::new());
    }
    let id_col = require(covariates, "covariates", "id")?;
    let subject_col = require(covariates, "covariates", "subject_id")?;
    let short_id_col = covariates.column_index("human_readable_id");
    let type_col = covariates.column_index("covariate_type");
    let attribute_cols: Vec<(&str, usize)> = CLAIM_ATTRIBUTES
        .iter()
        .filter_map(|c| covariates.column_index(c).map(|i| (*c, i)))
        .collect();

    Ok((0..covariates.len())
        .map(|row| {
            let attributes: Attributes = attribute_cols
                .iter()
                .map(|(name, col)| ((*name).to_string(), cell(covariates, row, Some(*col)).clone()))
                .collect();
            Covariate {
                id: text(covariates, row, Some(id_col)).unwrap_or_default(),
                short_id: text(covariates, row, short_id_col),
                subject_id: text(covariates, row, Some(subject_col)).unwrap_or_default(),
                covariate_type: text(covariates, row, type_col)
                    .unwrap_or_else(|| "claim".to_string()),
                text_unit_ids: Vec::new(),
                attributes,
            }
        })
        .collect())
}
