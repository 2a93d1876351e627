//! Entity-anchored mixed context for local search.
//!
//! The query is embedded and matched against entity description
//! embeddings. The matched entities then pull in, each within its share of
//! the token budget: the community reports they belong to, their own
//! descriptions, the relationships around them, their claims, and the text
//! units they were extracted from.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use prism_core::Frame;
use prism_core::entities::{CommunityReport, Covariate, Entity, Relationship, TextUnit};
use prism_core::responses::ChatTurn;
use prism_lake::EntityVectorStore;
use prism_llm::{TextEmbedder, TokenEncoder};
use serde_json::{Value, json};

use super::{ContextResult, Section};
use crate::error::SearchError;

/// Budget split and selection limits.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalContextParams {
    pub text_unit_prop: f64,
    pub community_prop: f64,
    pub conversation_history_max_turns: usize,
    pub top_k_mapped_entities: usize,
    pub top_k_relationships: usize,
    pub include_entity_rank: bool,
    pub include_relationship_weight: bool,
    pub include_community_rank: bool,
    pub max_tokens: usize,
}

impl Default for LocalContextParams {
    fn default() -> Self {
        Self {
            text_unit_prop: 0.5,
            community_prop: 0.1,
            conversation_history_max_turns: 5,
            top_k_mapped_entities: 10,
            top_k_relationships: 10,
            include_entity_rank: false,
            include_relationship_weight: false,
            include_community_rank: false,
            max_tokens: 3000,
        }
    }
}

/// Vector hits fetched per requested entity.
const OVERSAMPLE_SCALER: usize = 2;

const CLAIM_COLUMNS: [&str; 5] = ["object_id", "status", "start_date", "end_date", "description"];

/// Inputs of the local context, owned by one query.
pub struct LocalContext<E> {
    pub reports: Vec<CommunityReport>,
    pub text_units: Vec<TextUnit>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// `None` when the index has no covariate table.
    pub claims: Option<Vec<Covariate>>,
    pub vector_store: EntityVectorStore,
    pub embedder: E,
    pub encoder: Arc<TokenEncoder>,
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn share(max_tokens: usize, prop: f64) -> usize {
    (max_tokens as f64 * prop).max(0.0) as usize
}

impl<E: TextEmbedder> LocalContext<E> {
    /// Build the context for `query`, given the prior turns of the chat.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the query cannot be embedded or the vector
    /// search fails.
    pub async fn build_context(
        &self,
        query: &str,
        history: &[ChatTurn],
        params: &LocalContextParams,
    ) -> Result<ContextResult, SearchError> {
        let skip = history.len().saturating_sub(params.conversation_history_max_turns);
        let prior_questions: Vec<&str> = history[skip..].iter().map(|t| t.user.as_str()).collect();

        let embed_text = if prior_questions.is_empty() {
            query.to_string()
        } else {
            format!("{query}\n{}", prior_questions.join("\n"))
        };
        let selected = self.map_query_to_entities(&embed_text, params).await?;
        tracing::debug!(matched = selected.len(), "mapped query to entities");

        let mut sections: Vec<String> = Vec::new();
        let mut data: BTreeMap<String, Frame> = BTreeMap::new();
        let mut max_tokens = params.max_tokens;

        if !prior_questions.is_empty() {
            let mut section =
                Section::new(&self.encoder, "Conversation History", &["turn", "content"]);
            for question in &prior_questions {
                if !section.push_within(vec![json!("user"), json!(question)], max_tokens) {
                    break;
                }
            }
            let (text, tokens, _) = section.finish();
            max_tokens = max_tokens.saturating_sub(tokens);
            sections.push(text);
        }

        let community_tokens = share(max_tokens, params.community_prop);
        let (text, frame) = self.community_section(&selected, community_tokens, params);
        push_section(&mut sections, &mut data, "reports", text, frame);

        let local_prop = 1.0 - params.community_prop - params.text_unit_prop;
        let local_tokens = share(max_tokens, local_prop);
        for (name, text, frame) in self.local_sections(&selected, local_tokens, params) {
            push_section(&mut sections, &mut data, name, text, frame);
        }

        let text_unit_tokens = share(max_tokens, params.text_unit_prop);
        let (text, frame) = self.source_section(&selected, text_unit_tokens);
        push_section(&mut sections, &mut data, "sources", text, frame);

        Ok(ContextResult {
            text: sections.join("\n\n"),
            data,
        })
    }

    /// Entities closest to `query` by description embedding, closest first.
    /// An empty query falls back to the highest-ranked entities.
    async fn map_query_to_entities(
        &self,
        query: &str,
        params: &LocalContextParams,
    ) -> Result<Vec<&Entity>, SearchError> {
        let k = params.top_k_mapped_entities;
        if query.trim().is_empty() {
            let mut ranked: Vec<&Entity> = self.entities.iter().collect();
            ranked.sort_by(|a, b| b.rank.cmp(&a.rank));
            ranked.truncate(k);
            return Ok(ranked);
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self
            .vector_store
            .similarity_search_by_vector(&vector, k * OVERSAMPLE_SCALER)
            .await?;

        let by_id: HashMap<&str, &Entity> =
            self.entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut seen = HashSet::new();
        Ok(hits
            .iter()
            .filter_map(|hit| by_id.get(hit.id.as_str()).copied())
            .filter(|e| seen.insert(e.id.as_str()))
            .collect())
    }

    fn community_section(
        &self,
        selected: &[&Entity],
        max_tokens: usize,
        params: &LocalContextParams,
    ) -> (String, Frame) {
        let mut matches: HashMap<&str, usize> = HashMap::new();
        for entity in selected {
            for community in &entity.community_ids {
                *matches.entry(community.as_str()).or_default() += 1;
            }
        }
        let mut candidates: Vec<(&CommunityReport, usize)> = self
            .reports
            .iter()
            .filter_map(|r| matches.get(r.community_id.as_str()).map(|n| (r, *n)))
            .collect();
        candidates.sort_by(|(ra, na), (rb, nb)| nb.cmp(na).then_with(|| rb.rank.total_cmp(&ra.rank)));

        let mut header = vec!["id", "title", "content"];
        if params.include_community_rank {
            header.push("rank");
        }
        let mut section = Section::new(&self.encoder, "Reports", &header);
        for (report, _) in candidates {
            let mut cells = vec![
                json!(report.short_id),
                json!(report.title),
                json!(report.full_content),
            ];
            if params.include_community_rank {
                cells.push(json!(report.rank));
            }
            if !section.push_within(cells, max_tokens) {
                break;
            }
        }
        let (text, _, frame) = section.finish();
        (text, frame)
    }

    /// Entities, relationships and claims, growing the entity set one at a
    /// time and keeping the largest prefix that fits `max_tokens`.
    fn local_sections(
        &self,
        selected: &[&Entity],
        max_tokens: usize,
        params: &LocalContextParams,
    ) -> Vec<(&'static str, String, Frame)> {
        let mut best: Vec<(&'static str, String, Frame)> = Vec::new();
        for n in 1..=selected.len() {
            let current = &selected[..n];
            let (entity_text, entity_tokens, entity_frame) =
                self.entity_section(current, max_tokens, params);
            let (rel_text, rel_tokens, rel_frame) =
                self.relationship_section(current, max_tokens, params);
            let mut total = entity_tokens + rel_tokens;
            let mut parts = vec![
                ("entities", entity_text, entity_frame),
                ("relationships", rel_text, rel_frame),
            ];
            if let Some(claims) = &self.claims {
                let (claim_text, claim_tokens, claim_frame) =
                    self.claim_section(current, claims, max_tokens);
                total += claim_tokens;
                parts.push(("claims", claim_text, claim_frame));
            }
            if total > max_tokens {
                tracing::debug!(entities = n, total, max_tokens, "local context budget reached");
                break;
            }
            best = parts;
        }
        best
    }

    fn entity_section(
        &self,
        entities: &[&Entity],
        max_tokens: usize,
        params: &LocalContextParams,
    ) -> (String, usize, Frame) {
        let mut header = vec!["id", "entity", "description"];
        if params.include_entity_rank {
            header.push("number of relationships");
        }
        let mut section = Section::new(&self.encoder, "Entities", &header);
        for entity in entities {
            let mut cells = vec![
                json!(entity.short_id.clone().unwrap_or_default()),
                json!(entity.title),
                json!(entity.description.clone().unwrap_or_default()),
            ];
            if params.include_entity_rank {
                cells.push(json!(entity.rank));
            }
            if !section.push_within(cells, max_tokens) {
                break;
            }
        }
        section.finish()
    }

    fn relationship_section(
        &self,
        entities: &[&Entity],
        max_tokens: usize,
        params: &LocalContextParams,
    ) -> (String, usize, Frame) {
        let mut header = vec!["id", "source", "target", "description"];
        if params.include_relationship_weight {
            header.push("weight");
        }
        let mut section = Section::new(&self.encoder, "Relationships", &header);
        for rel in filter_relationships(entities, &self.relationships, params.top_k_relationships) {
            let mut cells = vec![
                json!(rel.short_id.clone().unwrap_or_default()),
                json!(rel.source),
                json!(rel.target),
                json!(rel.description.clone().unwrap_or_default()),
            ];
            if params.include_relationship_weight {
                cells.push(json!(rel.weight));
            }
            if !section.push_within(cells, max_tokens) {
                break;
            }
        }
        section.finish()
    }

    fn claim_section(
        &self,
        entities: &[&Entity],
        claims: &[Covariate],
        max_tokens: usize,
    ) -> (String, usize, Frame) {
        let names: HashSet<&str> = entities.iter().map(|e| e.title.as_str()).collect();
        let mut header = vec!["id", "entity"];
        header.extend(CLAIM_COLUMNS);
        let mut section = Section::new(&self.encoder, "Claims", &header);
        for claim in claims.iter().filter(|c| names.contains(c.subject_id.as_str())) {
            let mut cells = vec![
                json!(claim.short_id.clone().unwrap_or_default()),
                json!(claim.subject_id),
            ];
            cells.extend(
                CLAIM_COLUMNS
                    .iter()
                    .map(|c| claim.attributes.get(*c).cloned().unwrap_or(Value::Null)),
            );
            if !section.push_within(cells, max_tokens) {
                break;
            }
        }
        section.finish()
    }

    fn source_section(&self, selected: &[&Entity], max_tokens: usize) -> (String, Frame) {
        let mut section = Section::new(&self.encoder, "Sources", &["id", "text"]);
        for unit in rank_text_units(selected, &self.text_units, &self.relationships) {
            if !section.push_within(vec![json!(unit.short_id), json!(unit.text)], max_tokens) {
                break;
            }
        }
        let (text, _, frame) = section.finish();
        (text, frame)
    }
}

fn push_section(
    sections: &mut Vec<String>,
    data: &mut BTreeMap<String, Frame>,
    name: &str,
    text: String,
    frame: Frame,
) {
    if !frame.is_empty() {
        sections.push(text);
    }
    data.insert(name.to_string(), frame);
}

/// Relationships among the selected entities first (by rank), then those
/// reaching outside the set, ordered by how many selected entities the
/// outside endpoint links to, capped at `top_k` per selected entity.
pub(crate) fn filter_relationships<'a>(
    selected: &[&Entity],
    relationships: &'a [Relationship],
    top_k: usize,
) -> Vec<&'a Relationship> {
    let names: HashSet<&str> = selected.iter().map(|e| e.title.as_str()).collect();

    let mut in_network: Vec<&Relationship> = relationships
        .iter()
        .filter(|r| names.contains(r.source.as_str()) && names.contains(r.target.as_str()))
        .collect();
    in_network.sort_by(|a, b| b.rank.cmp(&a.rank));

    let mut out_network: Vec<&Relationship> = relationships
        .iter()
        .filter(|r| names.contains(r.source.as_str()) != names.contains(r.target.as_str()))
        .collect();
    out_network.sort_by(|a, b| b.rank.cmp(&a.rank));
    if out_network.len() <= 1 {
        in_network.extend(out_network);
        return in_network;
    }

    let mut links: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in out_network.iter().copied() {
        let (inside, outside) = endpoints(&names, r);
        links.entry(outside).or_default().insert(inside);
    }
    let link_count = |r: &Relationship| {
        let (_, outside) = endpoints(&names, r);
        links.get(outside).map_or(0, HashSet::len)
    };
    out_network.sort_by(|a, b| {
        link_count(b)
            .cmp(&link_count(a))
            .then_with(|| b.rank.cmp(&a.rank))
    });

    let budget = top_k * selected.len();
    out_network.truncate(budget);
    in_network.extend(out_network);
    in_network
}

/// `(inside, outside)` endpoint names of a relationship crossing the
/// selection boundary.
fn endpoints<'r>(names: &HashSet<&str>, r: &'r Relationship) -> (&'r str, &'r str) {
    if names.contains(r.source.as_str()) {
        (r.source.as_str(), r.target.as_str())
    } else {
        (r.target.as_str(), r.source.as_str())
    }
}

/// Text units of the selected entities: by entity order, then by how many
/// of that entity's relationships cite the unit.
pub(crate) fn rank_text_units<'a>(
    selected: &[&Entity],
    text_units: &'a [TextUnit],
    relationships: &[Relationship],
) -> Vec<&'a TextUnit> {
    let by_id: HashMap<&str, &TextUnit> = text_units.iter().map(|u| (u.id.as_str(), u)).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ranked: Vec<(&TextUnit, usize, usize)> = Vec::new();

    for (order, entity) in selected.iter().enumerate() {
        let own: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.source == entity.title || r.target == entity.title)
            .collect();
        for unit_id in &entity.text_unit_ids {
            let Some(unit) = by_id.get(unit_id.as_str()) else {
                continue;
            };
            if !seen.insert(unit.id.as_str()) {
                continue;
            }
            let cited = if unit.relationship_ids.is_empty() {
                own.iter().filter(|r| r.text_unit_ids.contains(&unit.id)).count()
            } else {
                own.iter().filter(|r| unit.relationship_ids.contains(&r.id)).count()
            };
            ranked.push((unit, order, cited));
        }
    }
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| b.2.cmp(&a.2)));
    ranked.into_iter().map(|(unit, _, _)| unit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity(title: &str, units: &[&str]) -> Entity {
        Entity {
            id: title.to_lowercase(),
            title: title.into(),
            text_unit_ids: units.iter().map(ToString::to_string).collect(),
            ..Entity::default()
        }
    }

    fn rel(id: &str, source: &str, target: &str, rank: i64, units: &[&str]) -> Relationship {
        Relationship {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            rank,
            text_unit_ids: units.iter().map(ToString::to_string).collect(),
            ..Relationship::default()
        }
    }

    fn unit(id: &str) -> TextUnit {
        TextUnit {
            id: id.into(),
            short_id: id.into(),
            text: format!("text of {id}"),
            ..TextUnit::default()
        }
    }

    fn ids(rels: &[&Relationship]) -> Vec<String> {
        rels.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn in_network_relationships_come_first() {
        let a = entity("A", &[]);
        let b = entity("B", &[]);
        let rels = vec![
            rel("out-1", "A", "X", 9, &[]),
            rel("in-1", "A", "B", 1, &[]),
            rel("out-2", "B", "Y", 5, &[]),
            rel("in-2", "B", "A", 3, &[]),
            rel("none", "X", "Y", 99, &[]),
        ];
        let picked = filter_relationships(&[&a, &b], &rels, 10);
        assert_eq!(ids(&picked), vec!["in-2", "in-1", "out-1", "out-2"]);
    }

    #[test]
    fn shared_outside_entities_rank_higher() {
        let a = entity("A", &[]);
        let b = entity("B", &[]);
        let rels = vec![
            rel("a-x", "A", "X", 9, &[]),
            rel("a-hub", "A", "HUB", 1, &[]),
            rel("hub-b", "HUB", "B", 1, &[]),
        ];
        let picked = filter_relationships(&[&a, &b], &rels, 10);
        assert_eq!(ids(&picked), vec!["a-hub", "hub-b", "a-x"]);
    }

    #[test]
    fn out_network_is_capped_per_entity() {
        let a = entity("A", &[]);
        let rels = vec![
            rel("1", "A", "X", 3, &[]),
            rel("2", "A", "Y", 2, &[]),
            rel("3", "A", "Z", 1, &[]),
        ];
        let picked = filter_relationships(&[&a], &rels, 2);
        assert_eq!(ids(&picked), vec!["1", "2"]);
    }

    #[test]
    fn text_units_follow_entity_order_then_citations() {
        let a = entity("A", &["t1", "t2", "missing"]);
        let b = entity("B", &["t2", "t3"]);
        let rels = vec![rel("r1", "A", "B", 1, &["t2"]), rel("r2", "A", "C", 1, &["t2"])];
        let units = vec![unit("t1"), unit("t2"), unit("t3")];
        let ranked: Vec<&str> = rank_text_units(&[&a, &b], &units, &rels)
            .iter()
            .map(|u| u.id.as_str())
            .collect();
        assert_eq!(ranked, vec!["t2", "t1", "t3"]);
    }

    #[test]
    fn budget_share_rounds_down() {
        assert_eq!(share(3000, 0.1), 300);
        assert_eq!(share(3000, 0.5), 1500);
        assert_eq!(share(3000, 1.0 - 0.1 - 0.5), 1200);
    }
}
