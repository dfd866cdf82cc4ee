use crate::token::Token;

/// Identity of a variable-bearing expression node.
///
/// The parser hands out one id per textual occurrence; the resolver
/// keys its scope-distance table on it. Two structurally identical
/// nodes never share an id.
pub type ExprId = usize;

#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal token: number, string, `true`, `false` or `nil`.
    Literal(Token),

    Grouping(Box<Expr>),

    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `and` / `or`, kept apart from `Binary` for short-circuiting.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    Variable {
        id: ExprId,
        name: Token,
    },

    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// The closing parenthesis, for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    Get {
        object: Box<Expr>,
        name: Token,
    },

    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    This {
        id: ExprId,
        keyword: Token,
    },

    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

impl Expr {
    /// Structural equivalence, ignoring node identities and grouping
    /// wrappers. Grouping is transparent because a printed-and-reparsed
    /// expression regains parentheses the original may have lacked.
    pub fn structurally_eq(a: &Expr, b: &Expr) -> bool {
        use Expr::*;

        match (a, b) {
            (Grouping(inner), other) => Self::structurally_eq(inner, other),
            (other, Grouping(inner)) => Self::structurally_eq(other, inner),

            (Literal(ta), Literal(tb)) => ta.lexeme == tb.lexeme,

            (
                Unary {
                    operator: opa,
                    right: ra,
                },
                Unary {
                    operator: opb,
                    right: rb,
                },
            ) => opa.token_type == opb.token_type && Self::structurally_eq(ra, rb),

            (
                Binary {
                    left: la,
                    operator: opa,
                    right: ra,
                },
                Binary {
                    left: lb,
                    operator: opb,
                    right: rb,
                },
            )
            | (
                Logical {
                    left: la,
                    operator: opa,
                    right: ra,
                },
                Logical {
                    left: lb,
                    operator: opb,
                    right: rb,
                },
            ) => {
                opa.token_type == opb.token_type
                    && Self::structurally_eq(la, lb)
                    && Self::structurally_eq(ra, rb)
            }

            (Variable { name: na, .. }, Variable { name: nb, .. }) => na.lexeme == nb.lexeme,

            (
                Assign {
                    name: na,
                    value: va,
                    ..
                },
                Assign {
                    name: nb,
                    value: vb,
                    ..
                },
            ) => na.lexeme == nb.lexeme && Self::structurally_eq(va, vb),

            (
                Call {
                    callee: ca,
                    arguments: aa,
                    ..
                },
                Call {
                    callee: cb,
                    arguments: ab,
                    ..
                },
            ) => {
                Self::structurally_eq(ca, cb)
                    && aa.len() == ab.len()
                    && aa
                        .iter()
                        .zip(ab.iter())
                        .all(|(x, y)| Self::structurally_eq(x, y))
            }

            (
                Get {
                    object: oa,
                    name: na,
                },
                Get {
                    object: ob,
                    name: nb,
                },
            ) => na.lexeme == nb.lexeme && Self::structurally_eq(oa, ob),

            (
                Set {
                    object: oa,
                    name: na,
                    value: va,
                },
                Set {
                    object: ob,
                    name: nb,
                    value: vb,
                },
            ) => {
                na.lexeme == nb.lexeme
                    && Self::structurally_eq(oa, ob)
                    && Self::structurally_eq(va, vb)
            }

            (This { .. }, This { .. }) => true,

            (Super { method: ma, .. }, Super { method: mb, .. }) => ma.lexeme == mb.lexeme,

            _ => false,
        }
    }
}
