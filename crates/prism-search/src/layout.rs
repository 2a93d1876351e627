//! Fruchterman-Reingold spring layout.
//!
//! Nodes repel each other with force `k²/d` and edges pull their endpoints
//! together with force `d²/k`, where `k = sqrt(1/n)`. Each step moves nodes
//! by at most the current temperature, which cools linearly to zero. The
//! result is centred on the origin and scaled into `[-1, 1]`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustworkx_core::petgraph::graph::UnGraph;
use rustworkx_core::petgraph::visit::EdgeRef;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringLayout {
    pub iterations: usize,
    /// Stop early once the mean node movement falls below this.
    pub threshold: f64,
    pub seed: u64,
}

impl Default for SpringLayout {
    fn default() -> Self {
        Self {
            iterations: 50,
            threshold: 1e-4,
            seed: 7,
        }
    }
}

const MIN_DISTANCE: f64 = 0.01;

impl SpringLayout {
    /// `[x, y]` for every node, indexed like the graph's nodes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn positions<N, E>(&self, graph: &UnGraph<N, E>) -> Vec<[f64; 2]> {
        let n = graph.node_count();
        match n {
            0 => return Vec::new(),
            1 => return vec![[0.0, 0.0]],
            _ => {}
        }

        let mut adjacency = vec![vec![0.0_f64; n]; n];
        for edge in graph.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            adjacency[a][b] = 1.0;
            adjacency[b][a] = 1.0;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut pos: Vec<[f64; 2]> = (0..n).map(|_| [rng.random(), rng.random()]).collect();

        let k = (1.0 / n as f64).sqrt();
        let mut t = 0.1 * spread(&pos);
        let dt = t / (self.iterations as f64 + 1.0);

        for _ in 0..self.iterations {
            let mut moved = 0.0;
            let mut next = pos.clone();
            for i in 0..n {
                let mut disp = [0.0, 0.0];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let delta = [pos[i][0] - pos[j][0], pos[i][1] - pos[j][1]];
                    let distance = delta[0].hypot(delta[1]).max(MIN_DISTANCE);
                    let force = k * k / (distance * distance) - adjacency[i][j] * distance / k;
                    disp[0] += delta[0] * force;
                    disp[1] += delta[1] * force;
                }
                let length = disp[0].hypot(disp[1]);
                let length = if length < MIN_DISTANCE { 0.1 } else { length };
                let step = [disp[0] * t / length, disp[1] * t / length];
                next[i] = [pos[i][0] + step[0], pos[i][1] + step[1]];
                moved += step[0].hypot(step[1]);
            }
            pos = next;
            t -= dt;
            if moved / (n as f64) < self.threshold {
                break;
            }
        }
        rescale(pos)
    }
}

fn spread(pos: &[[f64; 2]]) -> f64 {
    let range = |axis: usize| {
        let (lo, hi) = pos
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[axis]), hi.max(p[axis]))
            });
        hi - lo
    };
    range(0).max(range(1))
}

/// Centre on the origin and scale so the largest coordinate is 1.
#[allow(clippy::cast_precision_loss)]
fn rescale(mut pos: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    let n = pos.len() as f64;
    let mean = pos
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0] / n, acc[1] + p[1] / n]);
    let mut lim: f64 = 0.0;
    for p in &mut pos {
        p[0] -= mean[0];
        p[1] -= mean[1];
        lim = lim.max(p[0].abs()).max(p[1].abs());
    }
    if lim > 0.0 {
        for p in &mut pos {
            p[0] /= lim;
            p[1] /= lim;
        }
    }
    pos
}
