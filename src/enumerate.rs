use std::collections::{HashSet, VecDeque};

use crate::grammar::{Grammar, Symbol};

/// Breadth-first enumeration of the words of a grammar, shortest derivations
/// first.
pub struct Enumerator<'g> {
    grammar: &'g Grammar,
}

/// A sentential form of a right-linear grammar: a terminal prefix followed by
/// at most one non-terminal
struct Form<'g> {
    prefix: String,
    pending: Option<&'g str>,
}

impl<'g> Enumerator<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Enumerator { grammar }
    }

    /// Up to `limit` distinct words of at most `max_len` characters, in the
    /// order they are discovered. Productions are expanded in declaration
    /// order, so the result is deterministic.
    pub fn words(&self, limit: usize, max_len: usize) -> Vec<String> {
        let mut words = Vec::new();
        let mut seen = HashSet::new();
        let mut queued: HashSet<(String, Option<&'g str>)> = HashSet::new();
        let mut queue = VecDeque::new();

        queued.insert((String::new(), Some(self.grammar.start())));
        queue.push_back(Form {
            prefix: String::new(),
            pending: Some(self.grammar.start()),
        });

        while words.len() < limit {
            let Some(form) = queue.pop_front() else {
                break;
            };

            let Some(nonterminal) = form.pending else {
                if seen.insert(form.prefix.clone()) {
                    words.push(form.prefix);
                }
                continue;
            };

            // Every production adds one terminal
            if form.prefix.chars().count() >= max_len {
                continue;
            }

            for production in self.grammar.productions_for(nonterminal) {
                let (terminal, next) = match production.rhs() {
                    [Symbol::Terminal(t)] => (*t, None),
                    [Symbol::Terminal(t), Symbol::NonTerminal(next)] => (*t, Some(next.as_str())),
                    _ => unreachable!("grammar only holds right-linear productions"),
                };
                let mut prefix = form.prefix.clone();
                prefix.push(terminal);
                // Ambiguous rules reach the same form more than once
                if queued.insert((prefix.clone(), next)) {
                    queue.push_back(Form {
                        prefix,
                        pending: next,
                    });
                }
            }
        }

        log::debug!("Enumerated {} words (limit {}, max length {})", words.len(), limit, max_len);
        words
    }
}
