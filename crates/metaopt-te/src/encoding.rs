//! Encoding results and extracted solutions.

use std::collections::BTreeMap;

use metaopt_core::{NodePair, Path};
use metaopt_solver::{Polynomial, SolverCapability, VariableHandle};
use serde::{Deserialize, Serialize};

use crate::error::EncodingResult;

/// What an encoder produced for one `encode` call.
///
/// Every quantity is a polynomial over the owning solver's variables, so
/// decomposers can add offsets (pinning) or sum sub-encodings (POP) without
/// creating new variables. The handles are only meaningful while that
/// solver is alive.
#[derive(Debug, Clone)]
pub struct FlowEncoding<V> {
    /// Total demand met
    pub objective: Polynomial<V>,
    pub demands: BTreeMap<NodePair, Polynomial<V>>,
    /// Flow carried per pair
    pub flows: BTreeMap<NodePair, Polynomial<V>>,
    pub path_flows: BTreeMap<Path, Polynomial<V>>,
}

impl<V: VariableHandle> FlowEncoding<V> {
    pub fn new(objective: Polynomial<V>) -> Self {
        Self {
            objective,
            demands: BTreeMap::new(),
            flows: BTreeMap::new(),
            path_flows: BTreeMap::new(),
        }
    }

    /// Evaluate every recorded quantity under a backend solution.
    pub fn extract<S>(&self, solver: &S, solution: &S::Solution) -> EncodingResult<OptimizationSolution>
    where
        S: SolverCapability<Var = V>,
    {
        let eval = |p: &Polynomial<V>| solver.evaluate(solution, p);
        Ok(OptimizationSolution {
            total_demand_met: eval(&self.objective)?,
            demands: self
                .demands
                .iter()
                .map(|(k, p)| Ok((*k, eval(p)?)))
                .collect::<EncodingResult<_>>()?,
            flows: self
                .flows
                .iter()
                .map(|(k, p)| Ok((*k, eval(p)?)))
                .collect::<EncodingResult<_>>()?,
            flow_per_path: self
                .path_flows
                .iter()
                .map(|(k, p)| Ok((k.clone(), eval(p)?)))
                .collect::<EncodingResult<_>>()?,
        })
    }
}

/// Numeric result of a solved encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSolution {
    pub total_demand_met: f64,
    pub demands: BTreeMap<NodePair, f64>,
    pub flows: BTreeMap<NodePair, f64>,
    #[serde(with = "path_keyed")]
    pub flow_per_path: BTreeMap<Path, f64>,
}

impl OptimizationSolution {
    /// Sum several solutions entry by entry.
    pub fn sum<'a>(parts: impl IntoIterator<Item = &'a OptimizationSolution>) -> Self {
        let mut total = OptimizationSolution::default();
        for part in parts {
            total.total_demand_met += part.total_demand_met;
            for (pair, v) in &part.demands {
                *total.demands.entry(*pair).or_default() += v;
            }
            for (pair, v) in &part.flows {
                *total.flows.entry(*pair).or_default() += v;
            }
            for (path, v) in &part.flow_per_path {
                *total.flow_per_path.entry(path.clone()).or_default() += v;
            }
        }
        total
    }

    /// Flow of every path over the link `src -> dst`.
    pub fn link_load(&self, src: metaopt_core::NodeId, dst: metaopt_core::NodeId) -> f64 {
        self.flow_per_path
            .iter()
            .filter(|(path, _)| path.traverses(src, dst))
            .map(|(_, v)| v)
            .sum()
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let total_demand: f64 = self.demands.values().sum();
        let satisfied = if total_demand > 0.0 {
            100.0 * self.total_demand_met / total_demand
        } else {
            100.0
        };
        let active = self.flows.values().filter(|&&f| f > 1e-9).count();
        let mut s = format!(
            "Total demand met: {:.4}\nTotal demand:     {:.4} ({:.1}% met)\nPairs carrying flow: {}/{}\n",
            self.total_demand_met,
            total_demand,
            satisfied,
            active,
            self.flows.len()
        );
        for (path, flow) in self.flow_per_path.iter().filter(|&(_, &f)| f > 1e-9) {
            s.push_str(&format!("  {path}: {flow:.4}\n"));
        }
        s
    }

    pub fn to_json_string(&self) -> EncodingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> EncodingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// JSON object keys must be strings, so path-keyed maps serialize as a list.
mod path_keyed {
    use std::collections::BTreeMap;

    use metaopt_core::Path;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        path: Path,
        flow: f64,
    }

    pub fn serialize<S: Serializer>(map: &BTreeMap<Path, f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(path, &flow)| Entry {
                path: path.clone(),
                flow,
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Path, f64>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.path, e.flow)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaopt_core::NodeId;

    fn path(nodes: &[usize]) -> Path {
        Path::new(nodes.iter().map(|&n| NodeId::new(n)).collect()).unwrap()
    }

    fn sample() -> OptimizationSolution {
        let pair = NodePair::new(NodeId::new(0), NodeId::new(2));
        OptimizationSolution {
            total_demand_met: 5.0,
            demands: [(pair, 8.0)].into_iter().collect(),
            flows: [(pair, 5.0)].into_iter().collect(),
            flow_per_path: [(path(&[0, 1, 2]), 5.0)].into_iter().collect(),
        }
    }

    #[test]
    fn test_json_roundtrip_with_path_keys() {
        let solution = sample();
        let json = solution.to_json_string().unwrap();
        assert!(json.contains("\"(0, 2)\""));
        assert_eq!(OptimizationSolution::from_json_str(&json).unwrap(), solution);
    }

    #[test]
    fn test_sum_and_link_load() {
        let a = sample();
        let b = sample();
        let total = OptimizationSolution::sum([&a, &b]);
        assert_eq!(total.total_demand_met, 10.0);
        assert_eq!(total.link_load(NodeId::new(1), NodeId::new(2)), 10.0);
        assert_eq!(total.link_load(NodeId::new(2), NodeId::new(1)), 0.0);
    }

    #[test]
    fn test_summary_mentions_paths() {
        let summary = sample().summary();
        assert!(summary.contains("Total demand met: 5.0000"));
        assert!(summary.contains("0->1->2"));
        assert!(summary.contains("62.5% met"));
    }
}
