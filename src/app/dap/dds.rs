//! Dataset Descriptor Structure parsing
//!
//! Turns the textual DDS that precedes every data response into a tree of
//! [`DdsNode`]s. Each node carries its dotted `id` (e.g. `s.x`), assigned
//! after parsing so that ids always reflect the final nesting.

use crate::app::dap::value::DapType;
use crate::errors::{DapError, DapResult};

/// Kind of a declared variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Dataset,
    Base { dtype: DapType, shape: Vec<usize> },
    Structure,
    Sequence,
    Grid,
}

/// One declaration in the structural tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsNode {
    pub name: String,
    pub id: String,
    pub kind: NodeKind,
    pub children: Vec<DdsNode>,
}

impl DdsNode {
    fn new(name: String, kind: NodeKind, children: Vec<DdsNode>) -> Self {
        Self {
            name,
            id: String::new(),
            kind,
            children,
        }
    }

    /// All nodes in pre-order, starting with `self`
    pub fn walk(&self) -> Vec<&DdsNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }

    /// Node whose id is exactly `id`
    pub fn find(&self, id: &str) -> Option<&DdsNode> {
        self.walk().into_iter().find(|node| node.id == id)
    }

    /// Chain of `(child index, node)` pairs leading from `self` to `target`
    ///
    /// `target` is compared by address, so it must be a node obtained from
    /// this tree (e.g. through [`walk`](Self::walk)).
    pub fn trail<'a>(&'a self, target: &DdsNode) -> Option<Vec<(usize, &'a DdsNode)>> {
        for (index, child) in self.children.iter().enumerate() {
            if std::ptr::eq(child, target) {
                return Some(vec![(index, child)]);
            }
            if let Some(mut rest) = child.trail(target) {
                rest.insert(0, (index, child));
                return Some(rest);
            }
        }
        None
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Dataset | NodeKind::Structure)
    }

    /// Names of the direct children, in declaration order
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|child| child.name.as_str()).collect()
    }

    /// Declared dimension sizes for base types, empty otherwise
    pub fn shape(&self) -> &[usize] {
        match &self.kind {
            NodeKind::Base { shape, .. } => shape,
            _ => &[],
        }
    }

    fn assign_ids(&mut self, parent: Option<&str>) {
        self.id = match parent {
            None => String::new(),
            Some("") => self.name.clone(),
            Some(parent) => format!("{parent}.{}", self.name),
        };
        let id = self.id.clone();
        for child in &mut self.children {
            child.assign_ids(Some(&id));
        }
    }
}

/// Parse a DDS document into its `Dataset` root
pub fn parse(text: &str) -> DapResult<DdsNode> {
    let tokens = tokenize(text);
    let mut parser = Parser { tokens, position: 0 };
    let mut root = parser.dataset()?;
    root.assign_ids(None);
    Ok(root)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if c.is_whitespace() || "{}[];:=".contains(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if !c.is_whitespace() {
                tokens.push(c.to_string());
            }
        } else {
            word.push(c);
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

struct Parser {
    tokens: Vec<String>,
    position: usize,
}

impl Parser {
    fn error(&self, reason: impl Into<String>) -> DapError {
        DapError::Parse {
            position: self.position,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn next(&mut self) -> DapResult<String> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of descriptor"))?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &str) -> DapResult<()> {
        let token = self.next()?;
        if token.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}', found '{token}'")))
        }
    }

    fn dataset(&mut self) -> DapResult<DdsNode> {
        self.expect("Dataset")?;
        self.expect("{")?;
        let children = self.declarations()?;
        self.expect("}")?;
        let name = self.next()?;
        self.expect(";")?;
        Ok(DdsNode::new(name, NodeKind::Dataset, children))
    }

    fn declarations(&mut self) -> DapResult<Vec<DdsNode>> {
        let mut children = Vec::new();
        while let Some(token) = self.peek() {
            if token == "}" || token.eq_ignore_ascii_case("Maps") {
                break;
            }
            children.push(self.declaration()?);
        }
        Ok(children)
    }

    fn declaration(&mut self) -> DapResult<DdsNode> {
        let keyword = self.next()?;
        match keyword.to_ascii_lowercase().as_str() {
            "structure" => self.container(NodeKind::Structure),
            "sequence" => self.container(NodeKind::Sequence),
            "grid" => self.grid(),
            _ => {
                let dtype: DapType = keyword
                    .parse()
                    .map_err(|_| self.error(format!("unknown declaration '{keyword}'")))?;
                let (name, shape) = self.variable()?;
                Ok(DdsNode::new(name, NodeKind::Base { dtype, shape }, Vec::new()))
            }
        }
    }

    fn container(&mut self, kind: NodeKind) -> DapResult<DdsNode> {
        self.expect("{")?;
        let children = self.declarations()?;
        self.expect("}")?;
        // Dimensions on constructor types are accepted and ignored.
        let (name, _) = self.variable()?;
        Ok(DdsNode::new(name, kind, children))
    }

    fn grid(&mut self) -> DapResult<DdsNode> {
        self.expect("{")?;
        self.expect("Array")?;
        self.expect(":")?;
        let mut children = vec![self.declaration()?];
        self.expect("Maps")?;
        self.expect(":")?;
        children.extend(self.declarations()?);
        self.expect("}")?;
        let (name, _) = self.variable()?;
        Ok(DdsNode::new(name, NodeKind::Grid, children))
    }

    /// `name [dim = size]* ;`
    fn variable(&mut self) -> DapResult<(String, Vec<usize>)> {
        let name = self.next()?;
        let mut shape = Vec::new();
        while self.peek() == Some("[") {
            self.next()?;
            let mut size_token = self.next()?;
            if self.peek() == Some("=") {
                self.next()?;
                size_token = self.next()?;
            }
            let size = size_token
                .parse::<usize>()
                .map_err(|_| self.error(format!("invalid dimension size '{size_token}'")))?;
            shape.push(size);
            self.expect("]")?;
        }
        self.expect(";")?;
        Ok((name, shape))
    }
}
