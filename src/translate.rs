use tracing::{debug, trace};

use crate::{
    ast::Attributes,
    error::{Error, Result},
    lex::{Token, TokenKind},
    to_sql::PrinterConfig,
};

pub mod columns;

use columns::{ColumnCatalog, common_columns, null_conditions};

/// Alias given to the right hand side of every anti join.
pub const ANTI_JOIN_RIGHT_ALIAS: &str = "cq1";

/// Prefix of the generated subquery aliases: `q0`, `q1`, ...
pub const SUBQUERY_ALIAS_PREFIX: &str = "q";

/// The output of translation: SQL text ready to hand to a database.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Query {
    sql_text: String,
    is_data_query: bool,
}

impl Query {
    pub fn new(sql_text: impl Into<String>) -> Self {
        let sql_text = sql_text.into();
        let is_data_query = sql_text
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"));
        Self {
            sql_text,
            is_data_query,
        }
    }

    pub fn sql_text(&self) -> &str {
        &self.sql_text
    }

    /// True if the query returns rows (it starts with `SELECT`).
    pub fn is_data_query(&self) -> bool {
        self.is_data_query
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node's token in the postfix sequence.
    pub fn postfix_index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    One(NodeId),
    Two(NodeId, NodeId),
}

#[derive(Debug)]
pub struct Node<'t> {
    pub token: &'t Token,
    pub operands: Operands,
    /// The operator consuming this node; None for the root
    pub parent: Option<NodeId>,
}

/// The expression tree implied by a postfix token sequence.
///
/// Nodes live in one flat Vec and refer to each other by index. One node is
///  pushed per postfix token, so a node's id is its postfix index and every
///  operand has a lower id than its operator. A subtree occupies a contiguous
///  run of ids ending at its root.
pub struct ExprTree<'t> {
    nodes: Vec<Node<'t>>,
    root: NodeId,
}

impl<'t> ExprTree<'t> {
    pub fn build(postfix: &'t [Token]) -> Result<Self> {
        let mut nodes: Vec<Node<'t>> = Vec::with_capacity(postfix.len());
        // Subtrees still waiting for the operator which consumes them
        let mut pending: Vec<NodeId> = Vec::new();

        for token in postfix {
            let id = NodeId(nodes.len());
            let missing =
                || Error::ill_formed(format!("operator {} is missing operands", token.literal));

            let operands = match token.kind {
                TokenKind::Ident => Operands::None,
                kind if kind.is_unary() => {
                    if token.attributes.is_none() {
                        return Err(Error::ill_formed(format!(
                            "operator {} requires an attribute clause",
                            token.literal
                        )));
                    }
                    Operands::One(pending.pop().ok_or_else(missing)?)
                }
                kind if kind.is_binary() => {
                    let right = pending.pop().ok_or_else(missing)?;
                    let left = pending.pop().ok_or_else(missing)?;
                    Operands::Two(left, right)
                }
                _ => {
                    return Err(Error::ill_formed(format!(
                        "unexpected {} where a relation or operator was expected",
                        token.literal
                    )));
                }
            };

            match operands {
                Operands::None => {}
                Operands::One(operand) => nodes[operand.0].parent = Some(id),
                Operands::Two(left, right) => {
                    nodes[left.0].parent = Some(id);
                    nodes[right.0].parent = Some(id);
                }
            }
            nodes.push(Node {
                token,
                operands,
                parent: None,
            });
            pending.push(id);
        }

        match pending.as_slice() {
            [root] => Ok(Self { root: *root, nodes }),
            [] => Err(Error::ill_formed("empty relational algebra expression")),
            more => Err(Error::ill_formed(format!(
                "{} relations are not combined by any operator",
                more.len()
            ))),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Ids only come from this tree, so indexing can't fail.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node<'t> {
        &self.nodes[id.0]
    }

    /// The ids of the subtree rooted at `id`, in postfix order.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + use<'t> {
        let mut first = id;
        loop {
            match self.node(first).operands {
                Operands::None => break,
                Operands::One(operand) | Operands::Two(operand, _) => first = operand,
            }
        }
        (first.0..=id.0).map(NodeId)
    }
}

/// What a resolved node hands to the operator consuming it.
#[derive(Debug)]
enum Fragment {
    /// A table referenced by name
    Table(String),
    /// A complete query without its trailing `;`. If the query is a
    ///  union/intersect/except, `set_operation` says which.
    Query {
        sql: String,
        set_operation: Option<TokenKind>,
    },
    /// `source as alias`, where source is a table name or a parenthesized
    ///  subquery
    Renamed { source: String, alias: String },
}

impl Fragment {
    fn query(sql: String) -> Self {
        Self::Query {
            sql,
            set_operation: None,
        }
    }

    /// The fragment as a standalone query.
    fn into_sql(self) -> String {
        match self {
            Self::Table(name) => format!("select * from {name}"),
            Self::Query { sql, .. } => sql,
            Self::Renamed { source, alias } => format!("select * from {source} as {alias}"),
        }
    }
}

/// Generates SQL in a single forward pass over the tree. Operands always
///  precede their operator, so by the time a node is visited the fragments
///  of its operands are ready to be taken.
struct Generator<'a, 't, C: ?Sized> {
    tree: &'a ExprTree<'t>,
    catalog: &'a C,
    conf: &'a PrinterConfig,
    fragments: Vec<Option<Fragment>>,
    next_alias: usize,
}

impl<'a, 't, C: ColumnCatalog + ?Sized> Generator<'a, 't, C> {
    fn new(tree: &'a ExprTree<'t>, catalog: &'a C, conf: &'a PrinterConfig) -> Self {
        Self {
            tree,
            catalog,
            conf,
            fragments: Vec::with_capacity(tree.len()),
            next_alias: 0,
        }
    }

    fn run(mut self) -> Result<String> {
        for index in 0..self.tree.len() {
            let fragment = self.generate(NodeId(index))?;
            self.fragments.push(Some(fragment));
        }
        let root = self.take(self.tree.root())?;
        Ok(format!("{};", root.into_sql()))
    }

    fn take(&mut self, id: NodeId) -> Result<Fragment> {
        self.fragments
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| Error::ill_formed("operand consumed twice"))
    }

    fn generate(&mut self, id: NodeId) -> Result<Fragment> {
        let tree = self.tree;
        let node = tree.node(id);
        let token = node.token;
        match (token.kind, node.operands) {
            (TokenKind::Ident, Operands::None) => Ok(Fragment::Table(token.literal.clone())),
            (TokenKind::Select, Operands::One(operand)) => self.select(token, operand),
            (TokenKind::Projection, Operands::One(operand)) => self.projection(token, operand),
            (TokenKind::Rename, Operands::One(operand)) => self.rename(token, operand),
            (kind, Operands::Two(left, right)) if kind.is_set_operation() => {
                self.set_operation(kind, left, right)
            }
            (TokenKind::AntiJoin, Operands::Two(left, right)) => {
                self.anti_join(id, token, left, right)
            }
            (TokenKind::Division, _) => Err(Error::ill_formed("division is not supported")),
            (_, Operands::Two(left, right)) => self.join(token, left, right),
            _ => Err(Error::ill_formed(format!("unexpected {}", token.literal))),
        }
    }

    /// Embeds an operand where a relation is expected (after `from` or
    ///  `join`). Subqueries get the next `qN` alias. Returns the text along
    ///  with the name the operand is known by, if it has one.
    fn relation(&mut self, operand: NodeId) -> Result<(String, Option<String>)> {
        let fragment = self.take(operand)?;
        Ok(self.embed(fragment))
    }

    fn embed(&mut self, fragment: Fragment) -> (String, Option<String>) {
        match fragment {
            Fragment::Table(name) => (name, None),
            Fragment::Renamed { source, alias } => (format!("{source} as {alias}"), Some(alias)),
            Fragment::Query { sql, .. } => {
                let alias = self.next_alias();
                (format!("({sql}) as {alias}"), Some(alias))
            }
        }
    }

    /// Aliases are numbered in the order subqueries get embedded. That is the
    ///  postfix order of the operators consuming them, so an inner subquery
    ///  of a right operand can be numbered before the left operand itself.
    fn next_alias(&mut self) -> String {
        let alias = format!("{SUBQUERY_ALIAS_PREFIX}{}", self.next_alias);
        self.next_alias += 1;
        trace!(%alias, "aliasing subquery");
        alias
    }

    fn select(&mut self, token: &Token, operand: NodeId) -> Result<Fragment> {
        let attributes = clause(token)?;
        let (from, alias) = self.relation(operand)?;
        // Columns of an aliased operand must be reached through the alias
        let conditions = self.conf.quote_condition(
            &attributes.to_string(),
            &attributes.column_names(),
            alias.as_deref(),
        );
        Ok(Fragment::query(format!(
            "select * from {from} where {conditions}"
        )))
    }

    fn projection(&mut self, token: &Token, operand: NodeId) -> Result<Fragment> {
        let names = clause(token)?.column_names();
        if names.is_empty() {
            return Err(Error::ill_formed(format!(
                "projection {token} does not name any column"
            )));
        }
        let (from, _) = self.relation(operand)?;
        Ok(Fragment::query(format!(
            "select distinct {} from {from}",
            self.conf.column_list(&names)
        )))
    }

    fn rename(&mut self, token: &Token, operand: NodeId) -> Result<Fragment> {
        let alias = match clause(token)?.tokens() {
            [name] if name.kind == TokenKind::Ident => name.literal.clone(),
            _ => {
                return Err(Error::ill_formed(format!(
                    "rename {token} must name exactly one relation"
                )));
            }
        };
        let source = match self.take(operand)? {
            Fragment::Table(name) => name,
            other => format!("({})", other.into_sql()),
        };
        Ok(Fragment::Renamed { source, alias })
    }

    fn set_operation(&mut self, kind: TokenKind, left: NodeId, right: NodeId) -> Result<Fragment> {
        let keyword = match kind {
            TokenKind::Union => "union",
            TokenKind::Intersection => "intersect",
            _ => "except",
        };
        let left = self.set_operand(left, kind, true)?;
        let right = self.set_operand(right, kind, false)?;
        Ok(Fragment::Query {
            sql: format!("{left} {keyword} {right}"),
            set_operation: Some(kind),
        })
    }

    /// Operands of a set operation are plain queries. A nested set operation
    ///  needs grouping unless SQL would group it the same way anyway
    ///  (intersect binds tighter than union and except, and equal precedence
    ///  groups to the left). A grouped right operand is parenthesized; a
    ///  grouped left one is selected from, so the statement still starts with
    ///  `select`.
    fn set_operand(&mut self, operand: NodeId, parent: TokenKind, is_left: bool) -> Result<String> {
        Ok(match self.take(operand)? {
            Fragment::Query {
                sql,
                set_operation: Some(inner),
            } if needs_grouping(inner, parent, is_left) => {
                if is_left {
                    let alias = self.next_alias();
                    format!("select * from ({sql}) as {alias}")
                } else {
                    format!("({sql})")
                }
            }
            fragment => fragment.into_sql(),
        })
    }

    fn join(&mut self, token: &Token, left: NodeId, right: NodeId) -> Result<Fragment> {
        let (left, _) = self.relation(left)?;
        let (right, _) = self.relation(right)?;

        let side = match token.kind {
            TokenKind::NaturalJoin => {
                return Ok(Fragment::query(format!(
                    "select * from {left} natural join {right}"
                )));
            }
            TokenKind::Cartesian => {
                return Ok(Fragment::query(format!(
                    "select * from {left} cross join {right}"
                )));
            }
            TokenKind::LeftJoin => "left",
            TokenKind::RightJoin => "right",
            TokenKind::FullJoin => "full",
            _ => return Err(Error::ill_formed(format!("unexpected {}", token.literal))),
        };

        // A join carrying a condition is an equi/theta join, otherwise natural
        let sql = match &token.attributes {
            Some(attributes) => {
                let conditions = self.conf.quote_condition(
                    &attributes.to_string(),
                    &attributes.column_names(),
                    None,
                );
                format!("select * from {left} {side} join {right} on {conditions}")
            }
            None => format!("select * from {left} natural {side} join {right}"),
        };
        Ok(Fragment::query(sql))
    }

    /// `R ▷ S` keeps the rows of R with no match in S: left join S on the
    ///  columns R and S share and keep the rows where S's side is null.
    ///
    /// The outermost anti join substitutes a left subquery without an alias.
    fn anti_join(&mut self, id: NodeId, token: &Token, left: NodeId, right: NodeId) -> Result<Fragment> {
        if token.attributes.is_some() {
            return Err(Error::ill_formed(
                "anti join does not support a join condition",
            ));
        }
        let common = common_columns(self.tree, id, self.catalog)?;
        if common.is_empty() {
            return Err(Error::ill_formed(
                "there are no common columns between the operands of the anti join",
            ));
        }

        let outermost = self.tree.node(id).parent.is_none();
        let left = match self.take(left)? {
            Fragment::Query { sql, .. } if outermost => format!("({sql})"),
            fragment => self.embed(fragment).0,
        };
        let right = match self.take(right)? {
            Fragment::Table(name) => name,
            other => format!("({})", other.into_sql()),
        };
        let conditions = null_conditions(&common, ANTI_JOIN_RIGHT_ALIAS, self.conf);
        Ok(Fragment::query(format!(
            "select * from {left} natural left join {right} as {ANTI_JOIN_RIGHT_ALIAS} where {conditions}"
        )))
    }
}

fn clause(token: &Token) -> Result<&Attributes> {
    token.attributes.as_ref().ok_or_else(|| {
        Error::ill_formed(format!(
            "operator {} requires an attribute clause",
            token.literal
        ))
    })
}

fn needs_grouping(inner: TokenKind, parent: TokenKind, is_left: bool) -> bool {
    let binds_tighter = inner == TokenKind::Intersection && parent != TokenKind::Intersection;
    let same_precedence = (inner == TokenKind::Intersection) == (parent == TokenKind::Intersection);
    !(binds_tighter || (is_left && same_precedence))
}

/// Translates a postfix token sequence (see [crate::parser::parse]) into SQL
///  for the default (Postgres) dialect.
///
/// `catalog` is only consulted for anti joins.
pub fn transform<C: ColumnCatalog + ?Sized>(postfix: &[Token], catalog: &C) -> Result<Query> {
    transform_with(postfix, catalog, &PrinterConfig::default())
}

pub fn transform_with<C: ColumnCatalog + ?Sized>(
    postfix: &[Token],
    catalog: &C,
    conf: &PrinterConfig,
) -> Result<Query> {
    let tree = ExprTree::build(postfix)?;
    let sql = Generator::new(&tree, catalog, conf).run()?;
    debug!(%sql, "generated SQL");
    Ok(Query::new(sql))
}
