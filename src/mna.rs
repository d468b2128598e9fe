use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::circuit::{Circuit, NodeId, GROUND};
use crate::error::{Error, Result};

/// Nodal system `[G][v] = [C]` with one unknown per non-ground node.
///
/// Row and column `i` belong to node `i + 1`. Nodes tied together by ideal
/// voltage sources share the KCL row of their lowest-numbered member; the
/// rows of the other members hold the source constraints instead.
#[derive(Debug, Clone, PartialEq)]
pub struct MnaSystem {
    /// Conductance matrix G
    pub matrix: DMatrix<f64>,
    /// Constant vector C
    pub rhs: DVector<f64>,
    /// Number of unknowns (nodes excluding ground)
    pub size: usize,
}

/// One level of the depth-first supernode walk.
struct Frame {
    node: NodeId,
    /// Node we arrived from; `None` for the representative itself.
    prev: Option<NodeId>,
    /// Next incidence of `node` to examine.
    cursor: usize,
}

impl MnaSystem {
    /// Allocate a zeroed system sized for the given circuit
    pub fn new(circuit: &Circuit) -> Result<Self> {
        if circuit.node_count() < 2 {
            return Err(Error::TooFewNodes(circuit.node_count()));
        }
        let size = circuit.unknown_count();

        Ok(MnaSystem {
            matrix: DMatrix::zeros(size, size),
            rhs: DVector::zeros(size),
            size,
        })
    }

    /// Clear the system and assemble the DC equations of `circuit`.
    ///
    /// Every non-ground node is visited in ascending id order; each one not
    /// yet reached starts a traversal of its supernode.
    pub fn assemble_dc(&mut self, circuit: &Circuit) -> Result<()> {
        if circuit.unknown_count() != self.size {
            return Err(Error::DimensionMismatch {
                expected: self.size,
                actual: circuit.unknown_count(),
            });
        }

        self.matrix.fill(0.0);
        self.rhs.fill(0.0);

        let mut visited = vec![false; circuit.node_count()];
        for main in 1..circuit.node_count() {
            if !visited[main] {
                self.assemble_supernode(circuit, main, &mut visited)?;
            }
        }

        Ok(())
    }

    /// Walk the ideal-voltage-source component containing `main`, writing
    /// its merged KCL equation into row `main - 1` and one constraint row
    /// per additional member.
    fn assemble_supernode(&mut self, circuit: &Circuit, main: NodeId, visited: &mut [bool]) -> Result<()> {
        let row = main - 1;
        let mut grounded = false;

        self.enter(circuit, main, row, grounded, visited)?;
        let mut stack = vec![Frame {
            node: main,
            prev: None,
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let current = frame.node;
            let prev = frame.prev;
            let next = circuit.nodes[current]
                .incidences
                .iter()
                .enumerate()
                .skip(frame.cursor)
                .find(|(_, inc)| Some(inc.neighbor) != prev && inc.branch.is_pure_voltage_source());

            let Some((index, incidence)) = next else {
                stack.pop();
                continue;
            };
            frame.cursor = index + 1;

            let neighbor = incidence.neighbor;
            let value = incidence.branch.source_value();

            if current != GROUND && neighbor != GROUND {
                // The neighbor's own KCL equation is absorbed into `row`;
                // its row becomes V(current) - V(neighbor) = value.
                debug!("Merging node {} into supernode {}", neighbor, main);
                self.matrix[(neighbor - 1, current - 1)] += 1.0;
                self.matrix[(neighbor - 1, neighbor - 1)] += -1.0;
                self.rhs[neighbor - 1] = value;
            } else if neighbor == GROUND {
                // The whole supernode is pinned to ground: the merged KCL
                // equation is replaced by V(current) = value.
                debug!("Supernode {} is tied to ground through node {}", main, current);
                if !grounded {
                    self.matrix.row_mut(row).fill(0.0);
                }
                self.matrix[(row, current - 1)] = 1.0;
                self.rhs[row] = value;
                grounded = true;
            } else {
                debug!("Node {} is fixed by a source to ground", neighbor);
                self.matrix[(neighbor - 1, neighbor - 1)] = 1.0;
                self.rhs[neighbor - 1] = -value;
            }

            self.enter(circuit, neighbor, row, grounded, visited)?;
            stack.push(Frame {
                node: neighbor,
                prev: Some(current),
                cursor: 0,
            });
        }

        Ok(())
    }

    fn enter(&mut self, circuit: &Circuit, node: NodeId, row: usize, grounded: bool, visited: &mut [bool]) -> Result<()> {
        if visited[node] {
            return Err(Error::VoltageLoop(node));
        }
        visited[node] = true;

        if !grounded {
            debug_assert_ne!(node, GROUND, "ground entered before its supernode was grounded");
            self.accumulate_row(circuit, node, row)?;
        }
        Ok(())
    }

    /// Add the KCL contributions of `node` (currents leaving through every
    /// branch that isn't an ideal voltage source) into equation `row`.
    fn accumulate_row(&mut self, circuit: &Circuit, node: NodeId, row: usize) -> Result<()> {
        for incidence in &circuit.nodes[node].incidences {
            let branch = &incidence.branch;
            if branch.is_pure_voltage_source() {
                continue;
            }

            if branch.is_current_source() {
                self.rhs[row] += branch.source_value();
                continue;
            }

            let resistance = branch.resistance().ok_or(Error::EmptyBranch)?;
            let conductance = 1.0 / resistance;
            self.matrix[(row, node - 1)] += conductance;
            if incidence.neighbor != GROUND {
                self.matrix[(row, incidence.neighbor - 1)] -= conductance;
            }
            // Norton equivalent of a voltage source in series with the resistance
            if branch.source().is_some() {
                self.rhs[row] += branch.source_value() / resistance;
            }
        }

        trace!("Accumulated node {} into row {}", node, row);
        Ok(())
    }

    /// Borrow the assembled system as `(G, C)`
    pub fn equations(&self) -> (&DMatrix<f64>, &DVector<f64>) {
        (&self.matrix, &self.rhs)
    }

    /// Consume the system, returning `(G, C)`
    pub fn into_equations(self) -> (DMatrix<f64>, DVector<f64>) {
        (self.matrix, self.rhs)
    }
}

/// Build the nodal equations `(G, C)` of a validated circuit.
pub fn assemble_equations(circuit: &Circuit) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let mut system = MnaSystem::new(circuit)?;
    system.assemble_dc(circuit)?;
    Ok(system.into_equations())
}
