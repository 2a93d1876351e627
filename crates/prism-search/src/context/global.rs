//! Community report batches for the map step of global search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use prism_core::Frame;
use prism_core::entities::{CommunityReport, Entity};
use prism_llm::TokenEncoder;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};

use super::{COLUMN_DELIMITER, table_row};

/// How report batches are assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalContextParams {
    /// Use the short summary instead of the full report text.
    pub use_community_summary: bool,
    pub shuffle_data: bool,
    pub random_state: u64,
    pub include_community_rank: bool,
    pub min_community_rank: f64,
    pub include_community_weight: bool,
    pub normalize_community_weight: bool,
    /// Token budget of each batch.
    pub max_tokens: usize,
    pub context_name: String,
}

impl Default for GlobalContextParams {
    fn default() -> Self {
        Self {
            use_community_summary: false,
            shuffle_data: true,
            random_state: 86,
            include_community_rank: true,
            min_community_rank: 0.0,
            include_community_weight: true,
            normalize_community_weight: true,
            max_tokens: 2000,
            context_name: "Reports".to_string(),
        }
    }
}

const WEIGHT_COLUMN: &str = "occurrence weight";
const RANK_COLUMN: &str = "rank";

/// Batched report tables: one text per map call, plus every row in one
/// frame for citation lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportBatches {
    pub batches: Vec<String>,
    pub reports: Frame,
}

/// Community reports and the entities used to weight them.
pub struct GlobalContext {
    pub reports: Vec<CommunityReport>,
    pub entities: Vec<Entity>,
    pub encoder: Arc<TokenEncoder>,
}

struct ReportRow {
    weight: f64,
    rank: f64,
    cells: Vec<Value>,
    tokens: usize,
}

impl GlobalContext {
    #[must_use]
    pub const fn new(
        reports: Vec<CommunityReport>,
        entities: Vec<Entity>,
        encoder: Arc<TokenEncoder>,
    ) -> Self {
        Self {
            reports,
            entities,
            encoder,
        }
    }

    /// Split the reports into token-bounded batches.
    #[must_use]
    pub fn build_context(&self, params: &GlobalContextParams) -> ReportBatches {
        let weights = if params.include_community_weight {
            community_weights(&self.reports, &self.entities, params.normalize_community_weight)
        } else {
            HashMap::new()
        };

        let mut selected: Vec<&CommunityReport> = self
            .reports
            .iter()
            .filter(|r| r.rank >= params.min_community_rank)
            .collect();
        if selected.is_empty() {
            return ReportBatches::default();
        }
        if params.shuffle_data {
            let mut rng = StdRng::seed_from_u64(params.random_state);
            selected.shuffle(&mut rng);
        }

        let header = header(params);
        let preamble = format!(
            "-----{}-----\n{}\n",
            params.context_name,
            header.join(COLUMN_DELIMITER)
        );
        let preamble_tokens = self.encoder.count(&preamble);

        let mut out = ReportBatches {
            batches: Vec::new(),
            reports: Frame::with_columns(header.iter().copied()),
        };
        let mut batch: Vec<ReportRow> = Vec::new();
        let mut batch_tokens = preamble_tokens;

        for report in selected {
            let row = self.report_row(report, params, &weights);
            if batch_tokens + row.tokens > params.max_tokens && !batch.is_empty() {
                cut_batch(&mut batch, &preamble, &mut out);
                batch_tokens = preamble_tokens;
            }
            batch_tokens += row.tokens;
            batch.push(row);
        }
        cut_batch(&mut batch, &preamble, &mut out);

        tracing::debug!(
            reports = out.reports.len(),
            batches = out.batches.len(),
            "built global context"
        );
        out
    }

    fn report_row(
        &self,
        report: &CommunityReport,
        params: &GlobalContextParams,
        weights: &HashMap<&str, f64>,
    ) -> ReportRow {
        let weight = weights.get(report.community_id.as_str()).copied().unwrap_or(0.0);
        let content = if params.use_community_summary {
            &report.summary
        } else {
            &report.full_content
        };

        let mut cells = vec![json!(report.short_id), json!(report.title)];
        if params.include_community_weight {
            cells.push(json!(weight));
        }
        cells.push(json!(content));
        if params.include_community_rank {
            cells.push(json!(report.rank));
        }
        let tokens = self.encoder.count(&table_row(&cells));
        ReportRow {
            weight,
            rank: report.rank,
            cells,
            tokens,
        }
    }
}

fn header(params: &GlobalContextParams) -> Vec<&'static str> {
    let mut header = vec!["id", "title"];
    if params.include_community_weight {
        header.push(WEIGHT_COLUMN);
    }
    header.push(if params.use_community_summary {
        "summary"
    } else {
        "content"
    });
    if params.include_community_rank {
        header.push(RANK_COLUMN);
    }
    header
}

/// Close the current batch: order by weight then rank, both descending.
fn cut_batch(batch: &mut Vec<ReportRow>, preamble: &str, out: &mut ReportBatches) {
    if batch.is_empty() {
        return;
    }
    batch.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| b.rank.total_cmp(&a.rank))
    });
    let mut text = preamble.to_string();
    for row in batch.drain(..) {
        text.push_str(&table_row(&row.cells));
        // Widths match the header by construction.
        let _ = out.reports.push_row(row.cells);
    }
    out.batches.push(text);
}

/// Number of distinct text units mentioning each community's entities,
/// optionally scaled so the largest is 1.
fn community_weights<'a>(
    reports: &'a [CommunityReport],
    entities: &[Entity],
    normalize: bool,
) -> HashMap<&'a str, f64> {
    let mut units: HashMap<&str, HashSet<&str>> = HashMap::new();
    for entity in entities {
        for community in &entity.community_ids {
            units
                .entry(community.as_str())
                .or_default()
                .extend(entity.text_unit_ids.iter().map(String::as_str));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mut weights: HashMap<&str, f64> = reports
        .iter()
        .map(|r| {
            let count = units.get(r.community_id.as_str()).map_or(0, HashSet::len);
            (r.community_id.as_str(), count as f64)
        })
        .collect();

    if normalize {
        let max = weights.values().copied().fold(0.0_f64, f64::max);
        if max > 0.0 {
            for w in weights.values_mut() {
                *w /= max;
            }
        }
    }
    weights
}
