use std::collections::HashMap;
use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Index of a node in the circuit; also its position in `Circuit::nodes`.
pub type NodeId = usize;

/// The reference node. Its voltage is 0 by convention and it never gets an unknown.
pub const GROUND: NodeId = 0;

/// Types of circuit elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Resistor,
    CurrentSource,
    VoltageSource,
}

/// A declared two-terminal element. Only becomes part of the circuit once
/// it is added to a branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub value: f64,
    pub kind: ElementKind,
}

impl Element {
    pub fn new_resistor(resistance: f64) -> Self {
        Element {
            value: resistance,
            kind: ElementKind::Resistor,
        }
    }

    pub fn new_current_source(current: f64) -> Self {
        Element {
            value: current,
            kind: ElementKind::CurrentSource,
        }
    }

    pub fn new_voltage_source(voltage: f64) -> Self {
        Element {
            value: voltage,
            kind: ElementKind::VoltageSource,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Current,
    Voltage,
}

/// Source carried by a branch. `value` is oriented: it is negated on the
/// copy of the branch stored at the negative-terminal node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub kind: SourceKind,
    pub value: f64,
}

/// Lumped content of one edge between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    resistance: Option<f64>,
    source: Option<Source>,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a branch from a sequence of elements, as if each were added in turn.
    pub fn from_elements<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Result<Self> {
        let mut branch = Branch::new();
        for element in elements {
            branch.add_element(element)?;
        }
        Ok(branch)
    }

    /// Add an element to the branch.
    ///
    /// Resistors accumulate in series. Voltage sources accumulate in series
    /// too, but a branch never mixes a current source with anything else
    /// that drives it.
    pub fn add_element(&mut self, element: &Element) -> Result<()> {
        match element.kind {
            ElementKind::Resistor => *self.resistance.get_or_insert(0.0) += element.value,
            ElementKind::VoltageSource => {
                if self.is_current_source() {
                    return Err(Error::MixedSources);
                }
                let source = self.source.get_or_insert(Source {
                    kind: SourceKind::Voltage,
                    value: 0.0,
                });
                source.value += element.value;
            }
            ElementKind::CurrentSource => match self.source {
                None => {
                    self.source = Some(Source {
                        kind: SourceKind::Current,
                        value: element.value,
                    })
                }
                Some(Source {
                    kind: SourceKind::Current,
                    ..
                }) => return Err(Error::DuplicateCurrentSource),
                Some(Source {
                    kind: SourceKind::Voltage,
                    ..
                }) => return Err(Error::MixedSources),
            },
        }
        Ok(())
    }

    pub fn has_resistance(&self) -> bool {
        self.resistance.is_some()
    }

    pub fn resistance(&self) -> Option<f64> {
        self.resistance
    }

    pub fn source(&self) -> Option<Source> {
        self.source
    }

    /// Signed source value, 0 when the branch carries no source.
    pub fn source_value(&self) -> f64 {
        self.source.map_or(0.0, |s| s.value)
    }

    pub fn is_empty(&self) -> bool {
        self.resistance.is_none() && self.source.is_none()
    }

    pub fn is_current_source(&self) -> bool {
        matches!(
            self.source,
            Some(Source {
                kind: SourceKind::Current,
                ..
            })
        )
    }

    /// An ideal voltage source with no series resistance. Such a branch has
    /// no conductance and forces its endpoints into a supernode.
    pub fn is_pure_voltage_source(&self) -> bool {
        self.resistance.is_none()
            && matches!(
                self.source,
                Some(Source {
                    kind: SourceKind::Voltage,
                    ..
                })
            )
    }

    /// The same branch seen from its other endpoint.
    pub fn reversed(&self) -> Self {
        Branch {
            resistance: self.resistance,
            source: self.source.map(|s| Source {
                kind: s.kind,
                value: -s.value,
            }),
        }
    }
}

/// One end of a branch as recorded on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incidence {
    pub branch: Branch,
    pub neighbor: NodeId,
}

/// Represents a node in the circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub incidences: Vec<Incidence>,
}

impl Node {
    pub fn with_id(name: String, id: NodeId) -> Self {
        Node {
            id,
            name,
            incidences: Vec::new(),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.id == GROUND
    }

    pub fn degree(&self) -> usize {
        self.incidences.len()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (node {})", self.name, self.id)
    }
}

/// Complete circuit representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    pub title: String,
    pub nodes: Vec<Node>,
    node_map: HashMap<String, NodeId>,
}

impl Circuit {
    pub fn new(title: String) -> Self {
        Circuit {
            title,
            nodes: Vec::new(),
            node_map: HashMap::new(),
        }
    }

    /// Create a circuit already sized to `count` nodes, named after their ids.
    pub fn with_node_count(title: String, count: usize) -> Self {
        let mut circuit = Circuit::new(title);
        for id in 0..count {
            circuit.add_node(id.to_string());
        }
        circuit
    }

    /// Add a node to the circuit and return its ID. The first node added is ground.
    pub fn add_node(&mut self, name: String) -> NodeId {
        if let Some(&existing_id) = self.node_map.get(&name) {
            return existing_id;
        }

        let node_id = self.nodes.len();
        self.nodes.push(Node::with_id(name.clone(), node_id));
        self.node_map.insert(name, node_id);
        node_id
    }

    /// Attach a branch between two nodes. `positive` receives the branch
    /// as given, `negative` receives it with the source sign flipped.
    pub fn connect(&mut self, positive: NodeId, negative: NodeId, branch: &Branch) -> Result<()> {
        if branch.is_empty() {
            return Err(Error::EmptyBranch);
        }
        if branch.resistance() == Some(0.0) {
            return Err(Error::ZeroResistance);
        }
        if positive == negative {
            return Err(Error::SelfLoop(positive));
        }
        for id in [positive, negative] {
            if id >= self.nodes.len() {
                return Err(Error::NodeNotFound(id));
            }
        }

        self.nodes[positive].incidences.push(Incidence {
            branch: branch.clone(),
            neighbor: negative,
        });
        self.nodes[negative].incidences.push(Incidence {
            branch: branch.reversed(),
            neighbor: positive,
        });
        debug!("Attached branch {:?} between {} and {}", branch, positive, negative);
        Ok(())
    }

    /// Get node by name
    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.node_map.get(name).and_then(|&id| self.nodes.get(id))
    }

    /// Get node ID by name
    pub fn get_node_id(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Total number of nodes, ground included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of unknown voltages (every node except ground)
    pub fn unknown_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// Number of logical branches (each is stored once per endpoint)
    pub fn branch_count(&self) -> usize {
        self.nodes.iter().map(Node::degree).sum::<usize>() / 2
    }

    /// All non-ground nodes in ascending id order
    pub fn non_ground_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().skip(1)
    }

    /// Structural check run before assembly.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.len() < 2 {
            return Err(Error::TooFewNodes(self.nodes.len()));
        }

        // A node with a single connection can't carry current in and out.
        if let Some(node) = self.nodes.iter().find(|node| node.degree() < 2) {
            return Err(Error::FloatingNode {
                name: node.name.clone(),
                incidences: node.degree(),
            });
        }

        Ok(())
    }

    pub fn is_malformed(&self) -> bool {
        self.validate().is_err()
    }

    /// Log circuit summary
    pub fn log_summary(&self) {
        info!("Circuit: {}", self.title);
        info!("Nodes: {}", self.nodes.len());
        info!("Branches: {}", self.branch_count());

        if let Some(ground) = self.nodes.first() {
            info!("Ground node: {}", ground.name);
        }

        let mut pure_sources = 0;
        let mut current_sources = 0;
        for incidence in self.nodes.iter().flat_map(|node| &node.incidences) {
            if incidence.branch.is_pure_voltage_source() {
                pure_sources += 1;
            } else if incidence.branch.is_current_source() {
                current_sources += 1;
            }
        }
        info!("  Ideal voltage source branches: {}", pure_sources / 2);
        info!("  Current source branches: {}", current_sources / 2);
    }
}
