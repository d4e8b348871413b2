//! Graph description
//!
//! The coloration chain is a fixed set of node kinds plus an explicit edge
//! list, including the echo back edge. The description is validated on its
//! own, before any audio runs: the destination must be reachable from the
//! source and every cycle must pass through a delay with loop gain below one.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ToneError};

/// Kind of processing node; each kind appears at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Source,
    VolumeGain,
    LowPass,
    Compressor,
    Analyser,
    Destination,
    NoiseSource,
    BandPass,
    NoiseGain,
    Delay,
    WetGain,
    FeedbackGain,
}

impl NodeKind {
    /// Nodes whose output is a scaled copy of their input
    pub fn is_gain(self) -> bool {
        matches!(
            self,
            NodeKind::VolumeGain | NodeKind::NoiseGain | NodeKind::WetGain | NodeKind::FeedbackGain
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: NodeKind,
    pub to: NodeKind,
}

const fn edge(from: NodeKind, to: NodeKind) -> Edge {
    Edge { from, to }
}

/// Node set plus edge list with connection bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: Vec<NodeKind>,
    edges: Vec<Edge>,
    connected: bool,
}

impl Topology {
    /// Build a description from parts; nothing is validated yet
    pub fn new(nodes: Vec<NodeKind>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            connected: false,
        }
    }

    /// The fixed coloration chain
    ///
    /// ```text
    /// source -> volume -> low-pass -> compressor -> analyser -> destination
    /// noise  -> band-pass -> noise gain -> compressor
    /// low-pass -> delay -> wet gain -> compressor
    ///             delay <- feedback <- wet gain
    /// ```
    pub fn coloration() -> Self {
        use NodeKind::*;
        Self::new(
            vec![
                Source, VolumeGain, LowPass, Compressor, Analyser, Destination, NoiseSource,
                BandPass, NoiseGain, Delay, WetGain, FeedbackGain,
            ],
            vec![
                edge(Source, VolumeGain),
                edge(VolumeGain, LowPass),
                edge(LowPass, Compressor),
                edge(Compressor, Analyser),
                edge(Analyser, Destination),
                edge(NoiseSource, BandPass),
                edge(BandPass, NoiseGain),
                edge(NoiseGain, Compressor),
                edge(LowPass, Delay),
                edge(Delay, WetGain),
                edge(WetGain, Compressor),
                edge(WetGain, FeedbackGain),
                edge(FeedbackGain, Delay),
            ],
        )
    }

    pub fn nodes(&self) -> &[NodeKind] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn successors(&self, node: NodeKind) -> impl Iterator<Item = NodeKind> + '_ {
        self.edges.iter().filter(move |e| e.from == node).map(|e| e.to)
    }

    /// Every elementary cycle, each starting at its smallest node
    pub fn cycles(&self) -> Vec<Vec<NodeKind>> {
        let mut found = BTreeSet::new();
        for &start in &self.nodes {
            let mut path = vec![start];
            self.walk_cycles(start, &mut path, &mut found);
        }
        found.into_iter().collect()
    }

    fn walk_cycles(&self, start: NodeKind, path: &mut Vec<NodeKind>, found: &mut BTreeSet<Vec<NodeKind>>) {
        let Some(&current) = path.last() else {
            return;
        };
        for next in self.successors(current) {
            if next == start {
                // Only keep the rotation that starts at the smallest node
                if path.iter().all(|&n| n >= start) {
                    found.insert(path.clone());
                }
            } else if !path.contains(&next) {
                path.push(next);
                self.walk_cycles(start, path, found);
                path.pop();
            }
        }
    }

    /// Check the structure and the loop gains
    ///
    /// `gain_of` reports the worst-case linear gain of a node; non-gain nodes
    /// should report 1.0.
    pub fn validate(&self, gain_of: impl Fn(NodeKind) -> f64) -> Result<()> {
        let known: BTreeSet<NodeKind> = self.nodes.iter().copied().collect();
        if known.len() != self.nodes.len() {
            return Err(topology_error("a node kind appears more than once"));
        }
        for e in &self.edges {
            if !known.contains(&e.from) || !known.contains(&e.to) {
                return Err(topology_error(format!("edge {} -> {} names an unknown node", e.from, e.to)));
            }
        }

        if !self.reaches(NodeKind::Source, NodeKind::Destination) {
            return Err(topology_error("destination is not reachable from the source"));
        }

        for cycle in self.cycles() {
            if !cycle.contains(&NodeKind::Delay) {
                return Err(topology_error(format!("cycle {:?} has no delay node", cycle)));
            }
            let loop_gain: f64 = cycle.iter().map(|&n| gain_of(n).abs()).product();
            if loop_gain >= 1.0 {
                return Err(topology_error(format!(
                    "cycle {:?} has loop gain {:.3}, must stay below 1",
                    cycle, loop_gain
                )));
            }
        }
        Ok(())
    }

    fn reaches(&self, from: NodeKind, to: NodeKind) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.insert(node) {
                stack.extend(self.successors(node));
            }
        }
        false
    }

    /// Mark every edge connected; returns how many were connected
    pub fn connect(&mut self) -> usize {
        if self.connected {
            return 0;
        }
        self.connected = true;
        debug!(edges = self.edges.len(), "graph connected");
        self.edges.len()
    }

    /// Disconnect every edge exactly once; a second call disconnects nothing
    pub fn disconnect(&mut self) -> usize {
        if !self.connected {
            return 0;
        }
        self.connected = false;
        debug!(edges = self.edges.len(), "graph disconnected");
        self.edges.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

fn topology_error(reason: impl Into<String>) -> ToneError {
    ToneError::Topology { reason: reason.into() }
}
