use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::{GrammarError, OptionExt, Result};

/// Represents a symbol of the grammar, either a terminal or a non-terminal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A terminal character that appears literally in generated words
    Terminal(char),
    /// A non-terminal (reference to the productions of another symbol)
    NonTerminal(String),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(c) => write!(f, "{}", c),
            Symbol::NonTerminal(name) => write!(f, "{}", name),
        }
    }
}

/// A rewrite rule `lhs -> rhs`.
///
/// A production accepted by [`Grammar::new`] is right-linear: its right-hand
/// side is either a single terminal or a terminal followed by one non-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    lhs: String,
    rhs: Vec<Symbol>,
}

impl Production {
    /// Create a production without checking its shape
    pub fn new(lhs: &str, rhs: Vec<Symbol>) -> Self {
        Production {
            lhs: lhs.to_string(),
            rhs,
        }
    }

    /// `lhs -> terminal`
    pub fn terminal(lhs: &str, terminal: char) -> Self {
        Production::new(lhs, vec![Symbol::Terminal(terminal)])
    }

    /// `lhs -> terminal next`
    pub fn step(lhs: &str, terminal: char, next: &str) -> Self {
        Production::new(
            lhs,
            vec![Symbol::Terminal(terminal), Symbol::NonTerminal(next.to_string())],
        )
    }

    /// Parse a single rule such as `"A -> dA"` (the arrow may also be `→`).
    ///
    /// The first character of the right-hand side is the terminal and the
    /// trimmed remainder, if any, names the next non-terminal.
    pub fn parse(text: &str) -> Result<Self> {
        let mut productions = Self::parse_alternatives(text)?;
        if productions.len() != 1 {
            return Err(GrammarError::Parse {
                line: 1,
                message: format!("expected a single production, found {}", productions.len()),
            });
        }
        Ok(productions.remove(0))
    }

    /// Parse a rule that may list alternatives: `"A -> d | aB"`
    pub fn parse_alternatives(text: &str) -> Result<Vec<Self>> {
        parse_rule(text).map_err(|message| GrammarError::Parse { line: 1, message })
    }

    pub fn lhs(&self) -> &str {
        &self.lhs
    }

    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    /// True for a terminal-only production, which ends a derivation
    pub fn is_final(&self) -> bool {
        self.rhs.len() == 1
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> ", self.lhs)?;
        for symbol in &self.rhs {
            write!(f, "{}", symbol)?;
        }
        Ok(())
    }
}

fn production_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\S+?)\s*(?:->|→)(.*)$").expect("valid production regex"))
}

fn set_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(VN|VT)\s*=\s*\{(.*)\}$").expect("valid set regex"))
}

fn start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^start\s*=\s*(\S+)$").expect("valid start regex"))
}

fn parse_rule(text: &str) -> std::result::Result<Vec<Production>, String> {
    let captures = production_regex()
        .captures(text)
        .ok_or_else(|| format!("not a production: {:?}", text.trim()))?;
    let lhs = &captures[1];

    let productions = captures[2]
        .split('|')
        .map(|alternative| {
            let alternative = alternative.trim();
            let mut chars = alternative.chars();
            let mut rhs = Vec::new();
            if let Some(terminal) = chars.next() {
                rhs.push(Symbol::Terminal(terminal));
                let rest = chars.as_str().trim();
                if !rest.is_empty() {
                    rhs.push(Symbol::NonTerminal(rest.to_string()));
                }
            }
            Production::new(lhs, rhs)
        })
        .collect();

    Ok(productions)
}

fn split_set(body: &str) -> impl Iterator<Item = &str> {
    body.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
}

/// Serializable description of a grammar, used for the JSON format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarSpec {
    pub nonterminals: Vec<String>,
    pub terminals: Vec<char>,
    /// Defaults to the left-hand side of the first production
    #[serde(default)]
    pub start: Option<String>,
    /// Rules in text form, e.g. `"A -> d | aB"`
    pub productions: Vec<String>,
}

impl GrammarSpec {
    /// Validate the description and build the grammar.
    ///
    /// Parse errors report the 1-based position of the offending rule.
    pub fn build(self) -> Result<Grammar> {
        let mut productions = Vec::new();
        for (idx, rule) in self.productions.iter().enumerate() {
            let parsed = parse_rule(rule).map_err(|message| GrammarError::Parse {
                line: idx + 1,
                message,
            })?;
            productions.extend(parsed);
        }
        self.with_productions(productions)
    }

    fn with_productions(self, productions: Vec<Production>) -> Result<Grammar> {
        let start = match self.start {
            Some(start) => start,
            None => productions
                .first()
                .map(|p| p.lhs().to_string())
                .ok_or_malformed(|| "no start symbol and no productions".to_string())?,
        };
        Grammar::new(self.nonterminals, self.terminals, &start, productions)
    }
}

/// An immutable right-linear grammar `{VN, VT, P, S}`
#[derive(Debug, Clone)]
pub struct Grammar {
    nonterminals: BTreeSet<String>,
    terminals: BTreeSet<char>,
    start: String,
    productions: Vec<Production>,
    /// Positions in `productions`, grouped by left-hand side
    index: HashMap<String, Vec<usize>>,
}

impl Grammar {
    /// Build a grammar, checking that it is well-formed.
    ///
    /// Fails with [`GrammarError::MalformedGrammar`] when the start symbol or
    /// any symbol used by a production is undeclared, when a right-hand side
    /// is empty or not right-linear, or when a terminal and a non-terminal
    /// share a name. Non-terminals without productions are accepted; reaching
    /// one while generating is a dead end.
    pub fn new<N, T>(
        nonterminals: N,
        terminals: T,
        start: &str,
        productions: Vec<Production>,
    ) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        T: IntoIterator<Item = char>,
    {
        let nonterminals: BTreeSet<String> = nonterminals.into_iter().map(Into::into).collect();
        let terminals: BTreeSet<char> = terminals.into_iter().collect();

        for name in &nonterminals {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (None, _) => {
                    return Err(GrammarError::MalformedGrammar(
                        "empty non-terminal name".to_string(),
                    ));
                }
                (Some(c), None) if terminals.contains(&c) => {
                    return Err(GrammarError::MalformedGrammar(format!(
                        "{} is declared both as a terminal and a non-terminal",
                        c
                    )));
                }
                _ => {}
            }
        }

        if !nonterminals.contains(start) {
            return Err(GrammarError::MalformedGrammar(format!(
                "start symbol {} is not a declared non-terminal",
                start
            )));
        }

        for production in &productions {
            check_production(production, &nonterminals, &terminals)?;
        }

        let grammar = Self::assemble(nonterminals, terminals, start, productions);
        let dead_ends = grammar.dead_ends();
        if !dead_ends.is_empty() {
            log::warn!("Non-terminals without productions: {}", dead_ends.join(", "));
        }
        log::debug!(
            "Built grammar with {} non-terminals, {} terminals, {} productions",
            grammar.nonterminals.len(),
            grammar.terminals.len(),
            grammar.productions.len()
        );
        Ok(grammar)
    }

    fn assemble(
        nonterminals: BTreeSet<String>,
        terminals: BTreeSet<char>,
        start: &str,
        productions: Vec<Production>,
    ) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, production) in productions.iter().enumerate() {
            index.entry(production.lhs.clone()).or_default().push(idx);
        }

        Grammar {
            nonterminals,
            terminals,
            start: start.to_string(),
            productions,
            index,
        }
    }

    /// The lab grammar (variant 20):
    /// `S -> dA`, `A -> d | aB`, `B -> bC`, `C -> cA | aS`
    pub fn variant_20() -> Self {
        Self::assemble(
            ["S", "A", "B", "C"].iter().map(|s| s.to_string()).collect(),
            ['a', 'b', 'c', 'd'].into_iter().collect(),
            "S",
            vec![
                Production::step("S", 'd', "A"),
                Production::terminal("A", 'd'),
                Production::step("A", 'a', "B"),
                Production::step("B", 'b', "C"),
                Production::step("C", 'c', "A"),
                Production::step("C", 'a', "S"),
            ],
        )
    }

    /// Load a grammar file. `.json` files use [`GrammarSpec`], anything else
    /// the text format accepted by [`Grammar::from_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("Loading grammar from {}", path.display());

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            content.parse()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: GrammarSpec = serde_json::from_str(json)?;
        spec.build()
    }

    pub fn to_spec(&self) -> GrammarSpec {
        GrammarSpec {
            nonterminals: self.nonterminals.iter().cloned().collect(),
            terminals: self.terminals.iter().copied().collect(),
            start: Some(self.start.clone()),
            productions: self.productions.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Productions whose left-hand side is `nonterminal`, in declaration
    /// order. Empty when there are none.
    pub fn productions_for(&self, nonterminal: &str) -> Vec<&Production> {
        self.index
            .get(nonterminal)
            .map(|indices| indices.iter().map(|&idx| &self.productions[idx]).collect())
            .unwrap_or_default()
    }

    /// Declared non-terminals that have no production
    pub fn dead_ends(&self) -> Vec<&str> {
        self.nonterminals
            .iter()
            .filter(|name| !self.index.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn has_nonterminal(&self, name: &str) -> bool {
        self.nonterminals.contains(name)
    }

    pub fn nonterminals(&self) -> &BTreeSet<String> {
        &self.nonterminals
    }

    pub fn terminals(&self) -> &BTreeSet<char> {
        &self.terminals
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }
}

fn check_production(
    production: &Production,
    nonterminals: &BTreeSet<String>,
    terminals: &BTreeSet<char>,
) -> Result<()> {
    if !nonterminals.contains(production.lhs()) {
        return Err(GrammarError::MalformedGrammar(format!(
            "undeclared non-terminal {} on the left of {}",
            production.lhs(),
            production
        )));
    }

    let check_terminal = |t: &char| {
        if terminals.contains(t) {
            Ok(())
        } else {
            Err(GrammarError::MalformedGrammar(format!(
                "undeclared terminal {} in {}",
                t, production
            )))
        }
    };

    match production.rhs() {
        [] => Err(GrammarError::MalformedGrammar(format!(
            "empty right-hand side for {}",
            production.lhs()
        ))),
        [Symbol::Terminal(t)] => check_terminal(t),
        [Symbol::Terminal(t), Symbol::NonTerminal(next)] => {
            check_terminal(t)?;
            if nonterminals.contains(next) {
                Ok(())
            } else {
                Err(GrammarError::MalformedGrammar(format!(
                    "undeclared non-terminal {} in {}",
                    next, production
                )))
            }
        }
        _ => Err(GrammarError::MalformedGrammar(format!(
            "{} is not right-linear (expected `terminal` or `terminal NonTerminal`)",
            production
        ))),
    }
}

/// Parses the text format:
///
/// ```text
/// # comment
/// VN = {S, A}
/// VT = {a, d}
/// start = S
/// S -> dA
/// A -> d | aS
/// ```
///
/// Set entries may be separated by commas or whitespace. `start` is optional
/// and defaults to the left-hand side of the first production.
impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self> {
        let mut nonterminals: Option<Vec<String>> = None;
        let mut terminals: Option<Vec<char>> = None;
        let mut start: Option<String> = None;
        let mut productions = Vec::new();

        for (idx, line) in s.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(captures) = set_regex().captures(trimmed) {
                let entries = split_set(captures.get(2).map_or("", |m| m.as_str()));
                if &captures[1] == "VN" {
                    nonterminals
                        .get_or_insert_with(Vec::new)
                        .extend(entries.map(str::to_string));
                } else {
                    let declared = terminals.get_or_insert_with(Vec::new);
                    for entry in entries {
                        let mut chars = entry.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => declared.push(c),
                            _ => {
                                return Err(GrammarError::Parse {
                                    line: line_no,
                                    message: format!(
                                        "terminal {:?} must be a single character",
                                        entry
                                    ),
                                });
                            }
                        }
                    }
                }
            } else if let Some(captures) = start_regex().captures(trimmed) {
                start = Some(captures[1].to_string());
            } else {
                let parsed = parse_rule(trimmed).map_err(|message| GrammarError::Parse {
                    line: line_no,
                    message,
                })?;
                productions.extend(parsed);
            }
        }

        let missing = |what: &str| GrammarError::Parse {
            line: s.lines().count(),
            message: format!("missing {} declaration", what),
        };
        let nonterminals = nonterminals.ok_or_else(|| missing("VN"))?;
        let terminals = terminals.ok_or_else(|| missing("VT"))?;

        GrammarSpec {
            nonterminals,
            terminals,
            start,
            productions: Vec::new(),
        }
        .with_productions(productions)
    }
}

/// Renders the grammar in the text format, so the output can be loaded back
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonterminals: Vec<&str> = self.nonterminals.iter().map(String::as_str).collect();
        let terminals: Vec<String> = self.terminals.iter().map(char::to_string).collect();

        writeln!(f, "VN = {{ {} }}", nonterminals.join(", "))?;
        writeln!(f, "VT = {{ {} }}", terminals.join(", "))?;
        writeln!(f, "start = {}", self.start)?;
        for production in &self.productions {
            writeln!(f, "{}", production)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_production() {
        let production = Production::parse("A -> dA").unwrap();
        assert_eq!(production.lhs(), "A");
        assert_eq!(
            production.rhs(),
            &[Symbol::Terminal('d'), Symbol::NonTerminal("A".to_string())]
        );
        assert!(!production.is_final());

        let production = Production::parse("C→a").unwrap();
        assert_eq!(production, Production::terminal("C", 'a'));
        assert!(production.is_final());

        let production = Production::parse("Start -> x Next").unwrap();
        assert_eq!(production, Production::step("Start", 'x', "Next"));
    }

    #[test]
    fn test_parse_alternatives() {
        let productions = Production::parse_alternatives("A -> d | aB").unwrap();
        assert_eq!(
            productions,
            vec![Production::terminal("A", 'd'), Production::step("A", 'a', "B")]
        );

        assert!(Production::parse("A -> d | aB").is_err());
        assert!(Production::parse("no arrow here").is_err());
    }

    #[test]
    fn test_variant_20_is_well_formed() {
        let builtin = Grammar::variant_20();
        let checked = Grammar::new(
            builtin.nonterminals().clone(),
            builtin.terminals().clone(),
            builtin.start(),
            builtin.productions().to_vec(),
        )
        .unwrap();

        assert_eq!(checked.to_string(), builtin.to_string());
        assert!(checked.dead_ends().is_empty());
    }

    #[test]
    fn test_productions_for() {
        let grammar = Grammar::variant_20();

        let rules: Vec<String> = grammar
            .productions_for("A")
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(rules, vec!["A -> d", "A -> aB"]);

        assert_eq!(grammar.productions_for("S").len(), 1);
        assert!(grammar.productions_for("Z").is_empty());
    }

    #[test]
    fn test_undeclared_lhs() {
        let result = Grammar::new(
            ["S"],
            ['a'],
            "S",
            vec![Production::terminal("S", 'a'), Production::terminal("X", 'a')],
        );
        assert!(matches!(result, Err(GrammarError::MalformedGrammar(_))));
    }

    #[test]
    fn test_malformed_rhs() {
        let cases = vec![
            Production::new("S", vec![]),
            Production::terminal("S", 'z'),
            Production::step("S", 'a', "Q"),
            Production::new("S", vec![Symbol::NonTerminal("S".to_string())]),
            Production::new("S", vec![Symbol::Terminal('a'), Symbol::Terminal('a')]),
            Production::new(
                "S",
                vec![
                    Symbol::Terminal('a'),
                    Symbol::NonTerminal("S".to_string()),
                    Symbol::Terminal('a'),
                ],
            ),
        ];

        for production in cases {
            let result = Grammar::new(["S"], ['a'], "S", vec![production.clone()]);
            assert!(
                matches!(result, Err(GrammarError::MalformedGrammar(_))),
                "accepted {:?}",
                production
            );
        }
    }

    #[test]
    fn test_bad_declarations() {
        let undeclared_start = Grammar::new(["S"], ['a'], "T", vec![Production::terminal("S", 'a')]);
        assert!(matches!(undeclared_start, Err(GrammarError::MalformedGrammar(_))));

        let collision = Grammar::new(["S", "a"], ['a'], "S", vec![Production::terminal("S", 'a')]);
        assert!(matches!(collision, Err(GrammarError::MalformedGrammar(_))));

        let empty_name = Grammar::new(["S", ""], ['a'], "S", vec![Production::terminal("S", 'a')]);
        assert!(matches!(empty_name, Err(GrammarError::MalformedGrammar(_))));
    }

    #[test]
    fn test_dead_ends_are_allowed() {
        let grammar = Grammar::new(
            ["S", "A"],
            ['a'],
            "S",
            vec![Production::step("S", 'a', "A")],
        )
        .unwrap();
        assert_eq!(grammar.dead_ends(), vec!["A"]);
    }

    #[test]
    fn test_from_str() {
        let text = r#"
            # Variant 20
            VN = {S, A, B, C}
            VT = {a, b, c, d}
            start = S
            S -> dA
            A -> d | aB
            B → bC
            C -> cA
            C -> aS
        "#;
        let grammar: Grammar = text.parse().unwrap();

        assert_eq!(grammar.to_string(), Grammar::variant_20().to_string());
    }

    #[test]
    fn test_from_str_defaults_start() {
        let grammar: Grammar = "VN = {X Y}\nVT = {x}\nX -> xY\nY -> x\n".parse().unwrap();
        assert_eq!(grammar.start(), "X");
    }

    #[test]
    fn test_from_str_errors() {
        let err = "VN = {S}\nVT = {ab}\nS -> a\n".parse::<Grammar>().unwrap_err();
        assert!(matches!(err, GrammarError::Parse { line: 2, .. }));

        let err = "VN = {S}\nS -> a\n".parse::<Grammar>().unwrap_err();
        assert!(err.to_string().contains("missing VT"));

        let err = "VN = {S}\nVT = {a}\nS := a\n".parse::<Grammar>().unwrap_err();
        assert!(matches!(err, GrammarError::Parse { line: 3, .. }));

        let err = "VN = {S}\nVT = {a}\nQ -> a\n".parse::<Grammar>().unwrap_err();
        assert!(matches!(err, GrammarError::MalformedGrammar(_)));
    }

    #[test]
    fn test_display_round_trip() {
        let grammar = Grammar::variant_20();
        let text = grammar.to_string();

        assert!(text.starts_with("VN = { A, B, C, S }\nVT = { a, b, c, d }\nstart = S\n"));
        let reparsed: Grammar = text.parse().unwrap();
        assert_eq!(reparsed.productions(), grammar.productions());
    }

    #[test]
    fn test_json_spec() {
        let json = r#"{
            "nonterminals": ["S", "A"],
            "terminals": ["a", "b"],
            "productions": ["S -> aA", "A -> b | aS"]
        }"#;
        let grammar = Grammar::from_json_str(json).unwrap();

        assert_eq!(grammar.start(), "S");
        assert_eq!(grammar.productions().len(), 3);

        let spec = grammar.to_spec();
        assert_eq!(spec.start.as_deref(), Some("S"));
        assert_eq!(spec.productions, vec!["S -> aA", "A -> b", "A -> aS"]);
    }

    #[test]
    fn test_json_spec_errors() {
        assert!(matches!(
            Grammar::from_json_str("{ not json"),
            Err(GrammarError::Json(_))
        ));

        let json = r#"{"nonterminals": ["S"], "terminals": ["a"], "productions": ["S -> a", "S a"]}"#;
        assert!(matches!(
            Grammar::from_json_str(json),
            Err(GrammarError::Parse { line: 2, .. })
        ));
    }
}
