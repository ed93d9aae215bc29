use lacquer_value::Value;

/// 1-based position in the input currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

/// One space-separated run of terms. Commas split runs: in a declaration
/// value they separate list groups, in a call they separate arguments.
pub type TermGroup = Vec<Term>;

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A parsed literal (number, color, string, keyword).
    Literal(Value),
    /// Text the scanner kept verbatim because it is not a value but is
    /// legal in output position, e.g. `!important`.
    Raw(String),
    /// A function call. Dispatched to the host when the name is registered,
    /// otherwise rendered back out unchanged.
    Call { name: String, args: Vec<TermGroup>, pos: Pos },
}

/// A declaration value: comma-separated groups of space-separated terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpr {
    pub groups: Vec<TermGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: ValueExpr,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selector: String,
    pub body: Vec<Node>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub urls: Vec<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rule(Rule),
    Declaration(Declaration),
    Import(Import),
}
