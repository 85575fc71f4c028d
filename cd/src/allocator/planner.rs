//! Round-robin allocation planning
//!
//! Pure functions: given candidates already in queue order and the agents
//! able to take them, decide who gets what. Cursors live on the stack of a
//! single call and always start at zero.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::registry::AgentBuckets;

/// One planned assignment: candidate index -> agent id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub index: usize,
    pub agent_id: String,
}

/// Outcome of planning, before anything is written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Candidate indices picked for this round, in pick order
    pub selected: Vec<usize>,
    pub assignments: Vec<Assignment>,
    /// Selected candidates whose language has no capable agent
    pub skipped_by_language: BTreeMap<String, usize>,
}

/// Walk the first `limit` candidates handing them out as `agents[cursor % len]`
pub fn plan_single(candidates: usize, agents: &[String], limit: usize) -> Plan {
    let take = candidates.min(limit);
    let selected: Vec<usize> = (0..take).collect();
    if agents.is_empty() {
        return Plan {
            selected,
            ..Default::default()
        };
    }
    let assignments = selected
        .iter()
        .enumerate()
        .map(|(cursor, &index)| Assignment {
            index,
            agent_id: agents[cursor % agents.len()].clone(),
        })
        .collect();
    Plan {
        selected,
        assignments,
        skipped_by_language: BTreeMap::new(),
    }
}

/// Balance selection across language buckets, then round-robin within each
///
/// `languages[i]` is the language key of candidate `i`. Buckets are visited in
/// alphabetical order taking one candidate from each non-empty bucket per
/// pass, until `limit` candidates are selected or every bucket is drained.
pub fn plan_all(languages: &[String], agents: &AgentBuckets, limit: usize) -> Plan {
    let mut task_buckets: BTreeMap<&str, VecDeque<usize>> = BTreeMap::new();
    for (index, key) in languages.iter().enumerate() {
        task_buckets.entry(key.as_str()).or_default().push_back(index);
    }

    let mut selected = Vec::new();
    'passes: loop {
        let mut took = false;
        for queue in task_buckets.values_mut() {
            if selected.len() >= limit {
                break 'passes;
            }
            if let Some(index) = queue.pop_front() {
                selected.push(index);
                took = true;
            }
        }
        if !took {
            break;
        }
    }

    let mut cursors: HashMap<&str, usize> = HashMap::new();
    let mut assignments = Vec::with_capacity(selected.len());
    let mut skipped_by_language = BTreeMap::new();
    for &index in &selected {
        let key = languages[index].as_str();
        match agents.get(key).filter(|ids| !ids.is_empty()) {
            Some(ids) => {
                let cursor = cursors.entry(key).or_insert(0);
                assignments.push(Assignment {
                    index,
                    agent_id: ids[*cursor % ids.len()].clone(),
                });
                *cursor += 1;
            }
            None => *skipped_by_language.entry(key.to_string()).or_insert(0) += 1,
        }
    }

    Plan {
        selected,
        assignments,
        skipped_by_language,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn per_agent(plan: &Plan) -> HashMap<String, Vec<usize>> {
        let mut map: HashMap<String, Vec<usize>> = HashMap::new();
        for a in &plan.assignments {
            map.entry(a.agent_id.clone()).or_default().push(a.index);
        }
        map
    }

    #[test]
    fn test_plan_single_interleaves() {
        let plan = plan_single(10, &ids(&["agent-1", "agent-2"]), 5);
        assert_eq!(plan.selected, vec![0, 1, 2, 3, 4]);
        let map = per_agent(&plan);
        assert_eq!(map["agent-1"], vec![0, 2, 4]);
        assert_eq!(map["agent-2"], vec![1, 3]);
    }

    #[test]
    fn test_plan_single_fewer_candidates_than_limit() {
        let plan = plan_single(2, &ids(&["a", "b", "c"]), 5000);
        assert_eq!(plan.assignments.len(), 2);
        assert!(plan.assignments.iter().all(|a| a.agent_id != "c"));
    }

    #[test]
    fn test_plan_all_small_bucket_not_starved() {
        let mut languages = vec!["hindi".to_string(); 10];
        languages.extend(vec!["telugu".to_string(); 2]);
        let mut agents = AgentBuckets::new();
        agents.insert("hindi".into(), ids(&["h1"]));
        agents.insert("telugu".into(), ids(&["t1"]));

        let plan = plan_all(&languages, &agents, 4);
        assert_eq!(plan.selected, vec![0, 10, 1, 11]);
        let map = per_agent(&plan);
        assert_eq!(map["h1"].len(), 2);
        assert_eq!(map["t1"].len(), 2);
    }

    #[test]
    fn test_plan_all_skips_unserved_language() {
        let languages = ids(&["hindi", "unknown", "hindi", "marathi"]);
        let mut agents = AgentBuckets::new();
        agents.insert("hindi".into(), ids(&["h1", "h2"]));

        let plan = plan_all(&languages, &agents, 5000);
        assert_eq!(plan.selected.len(), 4);
        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.skipped_by_language["unknown"], 1);
        assert_eq!(plan.skipped_by_language["marathi"], 1);
        let map = per_agent(&plan);
        assert_eq!(map["h1"], vec![0]);
        assert_eq!(map["h2"], vec![2]);
    }

    #[test]
    fn test_plan_all_cursor_per_language() {
        let languages = ids(&["hindi", "marathi", "hindi", "marathi"]);
        let mut agents = AgentBuckets::new();
        agents.insert("hindi".into(), ids(&["x", "y"]));
        agents.insert("marathi".into(), ids(&["x", "y"]));

        let plan = plan_all(&languages, &agents, 5000);
        // Each language restarts its own rotation at the first agent
        let got: Vec<(usize, &str)> = plan
            .assignments
            .iter()
            .map(|a| (a.index, a.agent_id.as_str()))
            .collect();
        assert_eq!(got, vec![(0, "x"), (1, "x"), (2, "y"), (3, "y")]);
    }

    #[test]
    fn test_plan_all_zero_limit() {
        let plan = plan_all(&ids(&["hindi"]), &AgentBuckets::new(), 0);
        assert!(plan.selected.is_empty());
    }

    proptest! {
        #[test]
        fn prop_single_language_spread(n in 0usize..200, k in 1usize..12) {
            let agents: Vec<String> = (0..k).map(|i| format!("agent-{i:02}")).collect();
            let plan = plan_single(n, &agents, usize::MAX);
            prop_assert_eq!(plan.assignments.len(), n);
            let map = per_agent(&plan);
            let floor = n / k;
            let ceil = n.div_ceil(k);
            for agent in &agents {
                let got = map.get(agent).map(Vec::len).unwrap_or(0);
                prop_assert!(got == floor || got == ceil);
            }
        }

        #[test]
        fn prop_all_mode_buckets_balanced(a in 0usize..40, b in 0usize..40, limit in 0usize..100) {
            let mut languages = vec!["alpha".to_string(); a];
            languages.extend(vec!["beta".to_string(); b]);
            let plan = plan_all(&languages, &AgentBuckets::new(), limit);

            let from_a = plan.selected.iter().filter(|&&i| i < a).count();
            let from_b = plan.selected.len() - from_a;
            prop_assert_eq!(plan.selected.len(), limit.min(a + b));
            // While both buckets still hold tasks, neither pulls ahead by more than one
            if from_a < a && from_b < b {
                prop_assert!(from_a.abs_diff(from_b) <= 1);
            }
            prop_assert_eq!(plan.skipped_by_language.values().sum::<usize>(), plan.selected.len());
        }
    }
}
