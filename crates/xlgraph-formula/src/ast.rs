//! Abstract syntax tree
//!
//! Nodes live in an arena and refer to each other by index. Every child records a
//! position so argument order survives independently of arena order: infix operands are
//! 1 and 2, a prefix or postfix operand is 1, function arguments count from 0.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{Token, TokenKind, TokenSubkind};

/// Index of a node within its [`Ast`]
pub type NodeIndex = usize;

/// AST node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Literal value
    Operand,
    /// Cell or range reference
    Range,
    Operator,
    Function,
    /// Anything else the parser passed through
    Generic,
}

/// A node of the tree, wrapping the token it came from
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub token: Token,
    /// Argument count, for function nodes
    pub num_args: usize,
    /// Position among the parent's children
    pub position: usize,
    pub parent: Option<NodeIndex>,
    /// Children ordered by position
    pub children: Vec<NodeIndex>,
}

impl AstNode {
    /// Wrap a token, choosing the variant from its kind
    pub fn from_token(token: Token) -> Self {
        let kind = match token.kind {
            TokenKind::Operand if token.subkind == TokenSubkind::Range => NodeKind::Range,
            TokenKind::Operand => NodeKind::Operand,
            TokenKind::Function => NodeKind::Function,
            TokenKind::OperatorPrefix | TokenKind::OperatorInfix | TokenKind::OperatorPostfix => {
                NodeKind::Operator
            }
            _ => NodeKind::Generic,
        };
        Self {
            kind,
            token,
            num_args: 0,
            position: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// The node's literal text
    pub fn value(&self) -> &str {
        &self.token.value
    }
}

/// A formula's syntax tree
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    nodes: Vec<AstNode>,
    root: NodeIndex,
}

impl Ast {
    /// Build the tree from a reverse-Polish node sequence
    pub fn build(rpn: Vec<AstNode>) -> FormulaResult<Self> {
        let mut nodes = rpn;
        let mut stack: Vec<NodeIndex> = Vec::new();

        for index in 0..nodes.len() {
            let children: Vec<(NodeIndex, usize)> = match nodes[index].kind {
                NodeKind::Operator => {
                    if nodes[index].token.kind == TokenKind::OperatorInfix {
                        let right = pop_operand(&mut stack, &nodes[index])?;
                        let left = pop_operand(&mut stack, &nodes[index])?;
                        vec![(left, 1), (right, 2)]
                    } else {
                        vec![(pop_operand(&mut stack, &nodes[index])?, 1)]
                    }
                }
                NodeKind::Function => {
                    let mut args = Vec::with_capacity(nodes[index].num_args);
                    for _ in 0..nodes[index].num_args {
                        args.push(pop_operand(&mut stack, &nodes[index])?);
                    }
                    args.reverse();
                    args.into_iter().enumerate().map(|(pos, c)| (c, pos)).collect()
                }
                _ => Vec::new(),
            };

            for &(child, position) in &children {
                nodes[child].position = position;
                nodes[child].parent = Some(index);
            }
            nodes[index].children = children.into_iter().map(|(c, _)| c).collect();
            stack.push(index);
        }

        let root = stack
            .pop()
            .ok_or_else(|| FormulaError::Parse("Empty formula".into()))?;
        if let Some(&extra) = stack.last() {
            return Err(FormulaError::Parse(format!(
                "Unexpected operand '{}'",
                nodes[extra].token.value
            )));
        }
        Ok(Self { nodes, root })
    }

    /// The root node index
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Get a node by index
    pub fn node(&self, index: NodeIndex) -> &AstNode {
        &self.nodes[index]
    }

    /// The parent of a node, if any
    pub fn parent(&self, index: NodeIndex) -> Option<&AstNode> {
        self.nodes[index].parent.map(|p| &self.nodes[p])
    }

    /// Children of a node in position order
    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index].children
    }

    /// The child at a given position
    pub fn child_at(&self, index: NodeIndex, position: usize) -> Option<&AstNode> {
        self.nodes[index]
            .children
            .iter()
            .map(|&c| &self.nodes[c])
            .find(|c| c.position == position)
    }

    /// Indices of all reference nodes, in reverse-Polish order
    pub fn range_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Range)
            .map(|(i, _)| i)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes; never true for a built tree
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn pop_operand(stack: &mut Vec<NodeIndex>, consumer: &AstNode) -> FormulaResult<NodeIndex> {
    stack.pop().ok_or_else(|| {
        FormulaError::Parse(format!("Missing operand for '{}'", consumer.token.value))
    })
}
