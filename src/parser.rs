//! Reader for the line-oriented circuit description format.
//!
//! ```text
//! # a 5 V source across a divider
//! node gnd
//! node out
//! node top
//! resistor r1 1k
//! resistor r2 1k
//! voltages v1 5
//! branch b1
//! branch b2
//! branch b3
//! add b1 r1
//! add b2 r2
//! add b3 v1
//! add top gnd b3
//! add top out b1
//! add out gnd b2
//! ```
//!
//! The first declared node is ground. In `add <node> <node> <branch>` the
//! first node receives the positive terminal of the branch's source.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::circuit::{Branch, Circuit, Element, NodeId};
use crate::error::{Error, Result};

lazy_static! {
    static ref IDENTIFIER_PATTERN: Regex = Regex::new(r"^[a-z][a-z0-9]*$").unwrap();

    static ref VALUE_PATTERN: Regex = Regex::new(
        r"^([+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+))(meg|[fpnumkgt])?$"
    ).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Add,
    Branch,
    Node,
    Resistor,
    Currents,
    Voltages,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "add" => Some(Keyword::Add),
            "branch" => Some(Keyword::Branch),
            "node" => Some(Keyword::Node),
            "resistor" => Some(Keyword::Resistor),
            "currents" => Some(Keyword::Currents),
            "voltages" => Some(Keyword::Voltages),
            _ => None,
        }
    }
}

/// What the reader expected at a given position, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordType {
    Keyword,
    NewIdentifier,
    DeclaredIdentifier,
    Value,
    Nothing,
}

impl fmt::Display for WordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WordType::Keyword => "keyword",
            WordType::NewIdentifier => "new identifier",
            WordType::DeclaredIdentifier => "already declared identifier",
            WordType::Value => "value",
            WordType::Nothing => "nothing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
enum Declaration {
    Element(Element),
    Branch(Branch),
    Node(NodeId),
}

/// Reader state for one netlist
struct Reader {
    line: usize,
    declarations: HashMap<String, Declaration>,
    circuit: Circuit,
}

#[derive(Debug, Default)]
pub struct NetlistParser;

impl NetlistParser {
    pub fn new() -> Self {
        NetlistParser
    }

    /// Read a circuit file. The circuit is titled after the file stem.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Circuit> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "circuit".to_string());
        self.parse_netlist_titled(&content, title)
    }

    pub fn parse_netlist(&self, content: &str) -> Result<Circuit> {
        self.parse_netlist_titled(content, "circuit".to_string())
    }

    fn parse_netlist_titled(&self, content: &str, title: String) -> Result<Circuit> {
        let mut reader = Reader {
            line: 0,
            declarations: HashMap::new(),
            circuit: Circuit::new(title),
        };

        for (index, line) in content.lines().enumerate() {
            reader.line = index + 1;
            let line = line.to_lowercase();
            let words: Vec<&str> = line.split_whitespace().collect();

            // Skip empty lines and comments
            match words.first() {
                None => continue,
                Some(word) if word.starts_with('#') => continue,
                Some(_) => reader.statement(&words)?,
            }
        }

        debug!(
            "Read {} nodes and {} declarations",
            reader.circuit.node_count(),
            reader.declarations.len()
        );
        Ok(reader.circuit)
    }
}

impl Reader {
    fn statement(&mut self, words: &[&str]) -> Result<()> {
        let keyword = Keyword::from_word(words[0])
            .ok_or_else(|| self.unexpected(WordType::Keyword, Some(words[0])))?;

        match keyword {
            Keyword::Resistor | Keyword::Currents | Keyword::Voltages => {
                let id = self.new_identifier(words.get(1).copied())?;
                let value = self.value(words.get(2).copied())?;
                self.end(words, 3)?;

                let element = match keyword {
                    Keyword::Resistor => Element::new_resistor(value),
                    Keyword::Currents => Element::new_current_source(value),
                    _ => Element::new_voltage_source(value),
                };
                self.declarations.insert(id.to_string(), Declaration::Element(element));
            }
            Keyword::Branch => {
                let id = self.new_identifier(words.get(1).copied())?;
                self.end(words, 2)?;
                self.declarations.insert(id.to_string(), Declaration::Branch(Branch::new()));
            }
            Keyword::Node => {
                let id = self.new_identifier(words.get(1).copied())?;
                self.end(words, 2)?;
                let node = self.circuit.add_node(id.to_string());
                self.declarations.insert(id.to_string(), Declaration::Node(node));
            }
            Keyword::Add => self.add(words)?,
        }

        Ok(())
    }

    /// `add <branch> <element>` or `add <node> <node> <branch>`
    fn add(&mut self, words: &[&str]) -> Result<()> {
        let first = self.declared(words.get(1).copied())?;
        let second = self.declared(words.get(2).copied())?;

        match (self.declarations[first].clone(), self.declarations[second].clone()) {
            (Declaration::Element(_), _) => Err(self.syntax(
                "expected a node or branch identifier but found element identifier after add keyword",
            )),
            (Declaration::Branch(_), Declaration::Element(element)) => {
                self.end(words, 3)?;
                let line = self.line;
                if let Some(Declaration::Branch(branch)) = self.declarations.get_mut(first) {
                    branch.add_element(&element).map_err(|e| e.at_line(line))?;
                }
                Ok(())
            }
            (Declaration::Node(positive), Declaration::Node(negative)) => {
                let third = self.declared(words.get(3).copied())?;
                let Declaration::Branch(branch) = &self.declarations[third] else {
                    return Err(self.syntax("expected a branch identifier but didn't find it"));
                };
                let branch = branch.clone();
                self.end(words, 4)?;
                self.circuit
                    .connect(positive, negative, &branch)
                    .map_err(|e| e.at_line(self.line))
            }
            _ => Err(self.syntax("add expects <branch> <element> or <node> <node> <branch>")),
        }
    }

    fn new_identifier<'w>(&self, word: Option<&'w str>) -> Result<&'w str> {
        match word {
            Some(word) if self.classify(word) == WordType::NewIdentifier => {
                if IDENTIFIER_PATTERN.is_match(word) {
                    Ok(word)
                } else {
                    Err(self.syntax(
                        "wrong identifier naming (identifiers must begin with a letter and only contain letters and numbers)",
                    ))
                }
            }
            other => Err(self.unexpected(WordType::NewIdentifier, other)),
        }
    }

    fn declared<'w>(&self, word: Option<&'w str>) -> Result<&'w str> {
        match word {
            Some(word) if self.classify(word) == WordType::DeclaredIdentifier => Ok(word),
            other => Err(self.unexpected(WordType::DeclaredIdentifier, other)),
        }
    }

    fn value(&self, word: Option<&str>) -> Result<f64> {
        match word {
            Some(word) if self.classify(word) == WordType::Value => parse_value_with_unit(word)
                .ok_or_else(|| self.syntax(&format!("invalid value: {}", word))),
            other => Err(self.unexpected(WordType::Value, other)),
        }
    }

    /// Fail if anything follows the first `len` words.
    fn end(&self, words: &[&str], len: usize) -> Result<()> {
        match words.get(len) {
            None => Ok(()),
            Some(&word) => Err(self.unexpected(WordType::Nothing, Some(word))),
        }
    }

    fn classify(&self, word: &str) -> WordType {
        if Keyword::from_word(word).is_some() {
            WordType::Keyword
        } else if VALUE_PATTERN.is_match(word) {
            WordType::Value
        } else if self.declarations.contains_key(word) {
            WordType::DeclaredIdentifier
        } else {
            WordType::NewIdentifier
        }
    }

    fn unexpected(&self, expected: WordType, found: Option<&str>) -> Error {
        match found {
            Some(word) => self.syntax(&format!("expected a {} but found: {}", expected, word)),
            None => self.syntax(&format!("expected a {} but found nothing", expected)),
        }
    }

    fn syntax(&self, message: &str) -> Error {
        Error::Syntax {
            line: self.line,
            message: message.to_string(),
        }
    }
}

/// Parse value with unit suffix (e.g., 1k, 1meg, 1m, 1u, 1n, 1p)
fn parse_value_with_unit(value_str: &str) -> Option<f64> {
    let captures = VALUE_PATTERN.captures(value_str)?;
    let value = captures.get(1)?.as_str().parse::<f64>().ok()?;

    let multiplier = match captures.get(2).map(|unit| unit.as_str()) {
        None => 1.0,
        Some("f") => 1e-15,
        Some("p") => 1e-12,
        Some("n") => 1e-9,
        Some("u") => 1e-6,
        Some("m") => 1e-3,
        Some("k") => 1e3,
        Some("meg") => 1e6,
        Some("g") => 1e9,
        Some("t") => 1e12,
        Some(_) => return None,
    };

    Some(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIVIDER: &str = "\
# divider
node gnd
node out
node top
resistor r1 1k
resistor r2 1k
voltages v1 5
branch b1
branch b2
branch b3
add b1 r1
add b2 r2
add b3 v1
add top gnd b3
add top out b1
add out gnd b2
";

    #[test]
    fn test_parse_divider() {
        let circuit = NetlistParser::new().parse_netlist(DIVIDER).unwrap();

        assert_eq!(circuit.node_count(), 3);
        assert_eq!(circuit.get_node_id("gnd"), Some(0));
        assert_eq!(circuit.get_node_id("out"), Some(1));
        assert_eq!(circuit.get_node_id("top"), Some(2));
        assert_eq!(circuit.branch_count(), 3);

        let top = circuit.get_node("top").unwrap();
        assert!(top.incidences[0].branch.is_pure_voltage_source());
        assert_eq!(top.incidences[0].branch.source_value(), 5.0);
        assert_eq!(circuit.nodes[0].incidences[0].branch.source_value(), -5.0);
        assert_eq!(top.incidences[1].branch.resistance(), Some(1000.0));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let content = "NODE G\nNode A\nRESISTOR R 2\nBranch B\nADD B R\nadd A G b\nadd a g B\n";
        let circuit = NetlistParser::new().parse_netlist(content).unwrap();
        assert_eq!(circuit.get_node("a").unwrap().degree(), 2);
    }

    #[test]
    fn test_branch_copy_is_taken_at_attach_time() {
        let content = "\
node g
node a
resistor r 10
resistor extra 5
branch b
add b r
add a g b
add b extra
add a g b
";
        let circuit = NetlistParser::new().parse_netlist(content).unwrap();
        let a = circuit.get_node("a").unwrap();
        assert_eq!(a.incidences[0].branch.resistance(), Some(10.0));
        assert_eq!(a.incidences[1].branch.resistance(), Some(15.0));
    }

    #[test]
    fn test_syntax_errors_report_line() {
        let parser = NetlistParser::new();

        let err = parser.parse_netlist("node g\nfoo bar\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
        assert!(err.to_string().contains("expected a keyword but found: foo"));

        let err = parser.parse_netlist("resistor r1\n").unwrap_err();
        assert!(err.to_string().contains("expected a value but found nothing"));

        let err = parser.parse_netlist("node a\nnode a\n").unwrap_err();
        assert!(err.to_string().contains("expected a new identifier but found: a"));

        let err = parser.parse_netlist("node a extra\n").unwrap_err();
        assert!(err.to_string().contains("expected a nothing but found: extra"));

        let err = parser.parse_netlist("node a_b\n").unwrap_err();
        assert!(err.to_string().contains("wrong identifier naming"));

        let err = parser.parse_netlist("resistor r 1\nbranch b\nadd r b\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_logical_errors_report_line() {
        let content = "\
node g
node a
currents i1 1
voltages v1 2
branch b
branch empty
add b i1
add b v1
";
        let err = NetlistParser::new().parse_netlist(content).unwrap_err();
        match err {
            Error::Construction { line, source } => {
                assert_eq!(line, 8);
                assert!(matches!(*source, Error::MixedSources));
            }
            other => panic!("expected construction error, got {:?}", other),
        }

        let content = "node g\nnode a\nbranch e\nadd a g e\n";
        let err = NetlistParser::new().parse_netlist(content).unwrap_err();
        assert!(matches!(err, Error::Construction { line: 4, .. }));

        let content = "node g\nresistor r 1\nbranch b\nadd b r\nadd g g b\n";
        let err = NetlistParser::new().parse_netlist(content).unwrap_err();
        assert!(err.to_string().contains("itself"));

        let content = "node g\nnode a\nresistor r 5\nresistor s -5\nbranch b\nadd b r\nadd b s\nadd a g b\n";
        let err = NetlistParser::new().parse_netlist(content).unwrap_err();
        match err {
            Error::Construction { line, source } => {
                assert_eq!(line, 8);
                assert!(matches!(*source, Error::ZeroResistance));
            }
            other => panic!("expected construction error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_resistor_sums_in_series() {
        let content = "\
node g
node a
resistor r 10
resistor neg -4
branch b
add b r
add b neg
add a g b
add a g b
";
        let circuit = NetlistParser::new().parse_netlist(content).unwrap();
        let a = circuit.get_node("a").unwrap();
        assert_eq!(a.incidences[0].branch.resistance(), Some(6.0));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let content = "\n   \n# comment\n#another\nnode g\n";
        let circuit = NetlistParser::new().parse_netlist(content).unwrap();
        assert_eq!(circuit.node_count(), 1);
    }

    #[test]
    fn test_parse_value_with_unit() {
        assert_eq!(parse_value_with_unit("1k"), Some(1000.0));
        assert_eq!(parse_value_with_unit("1.5meg"), Some(1.5e6));
        assert_eq!(parse_value_with_unit("10m"), Some(10e-3));
        assert_eq!(parse_value_with_unit("-2.5"), Some(-2.5));
        assert_eq!(parse_value_with_unit(".5"), Some(0.5));
        assert_eq!(parse_value_with_unit("+3."), Some(3.0));
        assert_eq!(parse_value_with_unit("1e3"), None);
        assert_eq!(parse_value_with_unit("1.2.3"), None);
        assert_eq!(parse_value_with_unit("-"), None);
    }
}
