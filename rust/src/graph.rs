//! Dependency graph validation: dangling links, cycles, reachability and
//! topological order.
//!
//! Task ids are mapped to dense `u32` indices once per invocation so every pass
//! works on plain vectors instead of re-querying id-keyed maps.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::log_debug;
use crate::logging::Verbosity;
use crate::models::{Link, LinkType, Task, TaskId};

/// Dense task index (u32 for compact adjacency vectors).
pub type TaskIdx = u32;

/// Bidirectional mapping between task ids and dense indices.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    to_idx: FxHashMap<TaskId, TaskIdx>,
    from_idx: Vec<TaskId>,
}

impl TaskIndex {
    /// Index tasks in input order. A repeated id keeps its first position.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut index = Self {
            to_idx: FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default()),
            from_idx: Vec::with_capacity(tasks.len()),
        };
        for task in tasks {
            if index.to_idx.contains_key(&task.id) {
                continue;
            }
            index
                .to_idx
                .insert(task.id.clone(), index.from_idx.len() as TaskIdx);
            index.from_idx.push(task.id.clone());
        }
        index
    }

    #[inline]
    pub fn get(&self, id: &TaskId) -> Option<TaskIdx> {
        self.to_idx.get(id).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: TaskIdx) -> &TaskId {
        &self.from_idx[idx as usize]
    }

    /// The indexed task for each index, ignoring later duplicates.
    pub fn slots<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let mut slots: Vec<&Task> = Vec::with_capacity(self.len());
        for task in tasks {
            if self.get(&task.id) == Some(slots.len() as TaskIdx) {
                slots.push(task);
            }
        }
        slots
    }

    pub fn len(&self) -> usize {
        self.from_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_idx.is_empty()
    }
}

/// One end of a dependency as seen from the other task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// The task on the other side of the link.
    pub task: TaskIdx,
    pub kind: LinkType,
    /// Gap plus lag, in working units.
    pub offset: i64,
}

/// Arena adjacency over a task snapshot.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    pub index: TaskIndex,
    /// `predecessors[i]` lists edges whose `task` is a predecessor of `i`.
    pub predecessors: Vec<Vec<Edge>>,
    /// `successors[i]` lists edges whose `task` is a successor of `i`.
    pub successors: Vec<Vec<Edge>>,
}

impl TaskGraph {
    /// Build adjacency. Links with an unknown endpoint are skipped.
    pub fn new(tasks: &[Task], links: &[Link]) -> Self {
        let index = TaskIndex::from_tasks(tasks);
        let n = index.len();
        let mut predecessors: Vec<Vec<Edge>> = vec![Vec::new(); n];
        let mut successors: Vec<Vec<Edge>> = vec![Vec::new(); n];

        for link in links {
            let (Some(source), Some(target)) = (index.get(&link.source), index.get(&link.target))
            else {
                continue;
            };
            let offset = link.offset();
            successors[source as usize].push(Edge {
                task: target,
                kind: link.kind,
                offset,
            });
            predecessors[target as usize].push(Edge {
                task: source,
                kind: link.kind,
                offset,
            });
        }

        Self {
            index,
            predecessors,
            successors,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Find cycles with a depth-first search.
    ///
    /// When an edge reaches a node on the current path, the path slice from that
    /// node to the current one is one cycle. Finished nodes are never entered
    /// again, so every node and edge is visited once. The search keeps an
    /// explicit stack so long chains cannot exhaust the thread stack.
    pub fn find_cycles(&self) -> Vec<Vec<TaskIdx>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Visit {
            New,
            OnPath,
            Done,
        }

        let n = self.len();
        let mut visit = vec![Visit::New; n];
        let mut path_pos = vec![0usize; n];
        let mut path: Vec<TaskIdx> = Vec::new();
        // (node, next successor edge to inspect)
        let mut frames: Vec<(TaskIdx, usize)> = Vec::new();
        let mut reported: FxHashSet<(TaskIdx, TaskIdx)> = FxHashSet::default();
        let mut cycles: Vec<Vec<TaskIdx>> = Vec::new();

        for root in 0..n as TaskIdx {
            if visit[root as usize] != Visit::New {
                continue;
            }
            visit[root as usize] = Visit::OnPath;
            path_pos[root as usize] = path.len();
            path.push(root);
            frames.push((root, 0));

            while let Some(frame) = frames.last_mut() {
                let node = frame.0;
                let edges = &self.successors[node as usize];
                if frame.1 < edges.len() {
                    let next = edges[frame.1].task;
                    frame.1 += 1;
                    match visit[next as usize] {
                        Visit::New => {
                            visit[next as usize] = Visit::OnPath;
                            path_pos[next as usize] = path.len();
                            path.push(next);
                            frames.push((next, 0));
                        }
                        Visit::OnPath => {
                            // Parallel links would report the same cycle twice
                            if reported.insert((node, next)) {
                                cycles.push(path[path_pos[next as usize]..].to_vec());
                            }
                        }
                        Visit::Done => {}
                    }
                } else {
                    frames.pop();
                    path.pop();
                    visit[node as usize] = Visit::Done;
                }
            }
        }

        cycles
    }

    /// All tasks reachable from `start` along successor edges, excluding `start`,
    /// in breadth-first order.
    pub fn descendants(&self, start: TaskIdx) -> Vec<TaskIdx> {
        let mut seen = vec![false; self.len()];
        seen[start as usize] = true;
        let mut queue: VecDeque<TaskIdx> = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(node) = queue.pop_front() {
            for edge in &self.successors[node as usize] {
                if !seen[edge.task as usize] {
                    seen[edge.task as usize] = true;
                    result.push(edge.task);
                    queue.push_back(edge.task);
                }
            }
        }

        result
    }

    /// Topological order of the tasks not flagged in `excluded`, using Kahn's
    /// algorithm. Edges touching an excluded task are ignored.
    ///
    /// Ties are broken by input order so results are reproducible. Tasks left
    /// on a cycle among the non-excluded set are missing from the output.
    pub fn topological_order(&self, excluded: &[bool]) -> Vec<TaskIdx> {
        let n = self.len();
        let mut in_degree = vec![0usize; n];
        for (idx, preds) in self.predecessors.iter().enumerate() {
            if excluded[idx] {
                continue;
            }
            in_degree[idx] = preds.iter().filter(|e| !excluded[e.task as usize]).count();
        }

        let mut queue: VecDeque<TaskIdx> = (0..n as TaskIdx)
            .filter(|&i| !excluded[i as usize] && in_degree[i as usize] == 0)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for edge in &self.successors[node as usize] {
                let succ = edge.task as usize;
                if excluded[succ] {
                    continue;
                }
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    queue.push_back(edge.task);
                }
            }
        }

        order
    }
}

/// Links split by whether both endpoints exist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkPartition {
    pub valid_links: Vec<Link>,
    pub removed_links: Vec<Link>,
}

/// Split links into those whose endpoints both exist and those that dangle.
pub fn remove_invalid_links(tasks: &[Task], links: &[Link]) -> LinkPartition {
    let known: FxHashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    let (valid_links, removed_links) = links
        .iter()
        .cloned()
        .partition(|link| known.contains(&link.source) && known.contains(&link.target));
    LinkPartition {
        valid_links,
        removed_links,
    }
}

/// Cycles in the successor graph, each an ordered list of task ids where every
/// id links to the next and the last links back to the first.
pub fn detect_circular_dependencies(tasks: &[Task], links: &[Link]) -> Vec<Vec<TaskId>> {
    let graph = TaskGraph::new(tasks, links);
    graph
        .find_cycles()
        .into_iter()
        .map(|cycle| {
            cycle
                .into_iter()
                .map(|idx| graph.index.resolve(idx).clone())
                .collect()
        })
        .collect()
}

/// Every task reachable from `task_id` through successor links, excluding
/// `task_id` itself, in breadth-first order.
pub fn get_affected_successors(task_id: &TaskId, links: &[Link]) -> Vec<TaskId> {
    let mut forward: FxHashMap<&TaskId, Vec<&TaskId>> = FxHashMap::default();
    for link in links {
        forward.entry(&link.source).or_default().push(&link.target);
    }

    let mut seen: FxHashSet<&TaskId> = FxHashSet::default();
    seen.insert(task_id);
    let mut queue: VecDeque<&TaskId> = VecDeque::from([task_id]);
    let mut result = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(targets) = forward.get(current) else {
            continue;
        };
        for &target in targets {
            if seen.insert(target) {
                result.push(target.clone());
                queue.push_back(target);
            }
        }
    }

    result
}

/// A cleaned graph ready for the scheduling passes.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    pub graph: TaskGraph,
    pub removed_links: Vec<Link>,
    pub cycles: Vec<Vec<TaskIdx>>,
    /// `cyclic[i]` is set when task `i` is excluded for sitting on a cycle.
    pub cyclic: Vec<bool>,
    /// Topological order of the acyclic remainder.
    pub order: Vec<TaskIdx>,
}

impl ValidatedGraph {
    pub fn build(tasks: &[Task], links: &[Link], verbosity: Verbosity) -> Self {
        let LinkPartition {
            valid_links,
            removed_links,
        } = remove_invalid_links(tasks, links);
        let graph = TaskGraph::new(tasks, &valid_links);
        log_debug!(
            verbosity,
            "Graph: {} tasks, {} links ({} removed)",
            graph.len(),
            valid_links.len(),
            removed_links.len()
        );

        let cycles = graph.find_cycles();
        let mut cyclic = vec![false; graph.len()];
        for cycle in &cycles {
            for &idx in cycle {
                cyclic[idx as usize] = true;
            }
        }

        let order = graph.topological_order(&cyclic);
        let ordered = order.len() + cyclic.iter().filter(|&&c| c).count();
        if ordered != graph.len() {
            // Every cycle carries a back edge whose ends were excluded above, so
            // this only fires if that reasoning is broken; exclude the leftovers.
            let mut placed = cyclic.clone();
            for &idx in &order {
                placed[idx as usize] = true;
            }
            for (idx, done) in placed.iter().enumerate() {
                if !done {
                    log_debug!(
                        verbosity,
                        "Unordered task excluded: {}",
                        graph.index.resolve(idx as TaskIdx)
                    );
                    cyclic[idx] = true;
                }
            }
        }

        Self {
            graph,
            removed_links,
            cycles,
            cyclic,
            order,
        }
    }

    /// First reported cycle that contains `idx`.
    pub fn cycle_of(&self, idx: TaskIdx) -> Option<&[TaskIdx]> {
        self.cycles
            .iter()
            .find(|cycle| cycle.contains(&idx))
            .map(|cycle| cycle.as_slice())
    }

    /// Render a cycle as `a -> b -> c -> a`.
    pub fn describe_cycle(&self, cycle: &[TaskIdx]) -> String {
        let mut names: Vec<String> = cycle
            .iter()
            .map(|&idx| self.graph.index.resolve(idx).to_string())
            .collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names.join(" -> ")
    }
}
