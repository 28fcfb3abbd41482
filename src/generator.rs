use rand::Rng;
use rand::rngs::ThreadRng;

use crate::grammar::{Grammar, Symbol};
use crate::utils::GenerationError;

/// Source of the choices made during a random walk.
///
/// `choose(len)` must return an index in `0..len`; it is only called with
/// `len >= 1`.
pub trait ChoiceSource {
    fn choose(&mut self, len: usize) -> usize;
}

/// Uniform choices drawn from a `rand` generator
#[derive(Debug, Clone)]
pub struct RngChoices<R: Rng> {
    rng: R,
}

impl<R: Rng> RngChoices<R> {
    pub fn new(rng: R) -> Self {
        RngChoices { rng }
    }
}

impl<R: Rng> ChoiceSource for RngChoices<R> {
    fn choose(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed sequence of indices, starting over once it is exhausted.
/// Each index is reduced modulo the number of candidates; an empty script
/// always picks the first candidate.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChoices {
    script: Vec<usize>,
    position: usize,
}

impl ScriptedChoices {
    pub fn new(script: Vec<usize>) -> Self {
        ScriptedChoices {
            script,
            position: 0,
        }
    }
}

impl ChoiceSource for ScriptedChoices {
    fn choose(&mut self, len: usize) -> usize {
        if self.script.is_empty() {
            return 0;
        }
        let pick = self.script[self.position % self.script.len()];
        self.position += 1;
        pick % len
    }
}

/// Configuration options for generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Step budget of a single derivation
    pub max_steps: usize,
    /// Extra attempts made by [`Generator::generate_with_retries`]
    pub retries: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            max_steps: 50,
            retries: 0,
        }
    }
}

/// A completed derivation: the sentential forms from the start symbol down to
/// the final word, e.g. `S`, `dA`, `dd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    forms: Vec<String>,
    word: String,
}

impl Derivation {
    pub fn forms(&self) -> &[String] {
        &self.forms
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn into_word(self) -> String {
        self.word
    }

    /// Number of productions applied
    pub fn len(&self) -> usize {
        self.forms.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random-walk generator over a borrowed grammar.
///
/// From the current non-terminal one production is chosen uniformly among its
/// candidates (with `A -> d` and `A -> aB` each is taken with probability
/// 0.5), its terminal is appended, and the walk moves to the trailing
/// non-terminal until a terminal-only production ends it.
pub struct Generator<'g, C: ChoiceSource> {
    grammar: &'g Grammar,
    choices: C,
    config: GeneratorConfig,
}

impl<'g> Generator<'g, RngChoices<ThreadRng>> {
    /// Generator backed by the thread-local RNG
    pub fn new(grammar: &'g Grammar) -> Self {
        Generator::with_choices(grammar, RngChoices::new(rand::thread_rng()))
    }
}

impl<'g, C: ChoiceSource> Generator<'g, C> {
    pub fn with_choices(grammar: &'g Grammar, choices: C) -> Self {
        Generator {
            grammar,
            choices,
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Generate one word, failing if the walk reaches a non-terminal without
    /// productions or takes `max_steps` non-final steps. `max_steps = 0`
    /// always fails. A choice source returning an index outside `0..len`
    /// fails the call with [`GenerationError::InvalidChoice`].
    pub fn generate(&mut self, max_steps: usize) -> Result<String, GenerationError> {
        self.derive(max_steps).map(Derivation::into_word)
    }

    /// Like [`Generator::generate`], also recording every sentential form
    pub fn derive(&mut self, max_steps: usize) -> Result<Derivation, GenerationError> {
        let grammar = self.grammar;
        let mut current = grammar.start();
        let mut output = String::new();
        let mut forms = vec![current.to_string()];
        let mut steps = 0;

        loop {
            if steps >= max_steps {
                log::debug!("Derivation exceeded {} steps at {}{}", max_steps, output, current);
                return Err(GenerationError::DepthExceeded { max_steps });
            }

            let candidates = grammar.productions_for(current);
            if candidates.is_empty() {
                log::debug!("Dead end at non-terminal {}", current);
                return Err(GenerationError::DeadEnd {
                    nonterminal: current.to_string(),
                });
            }

            let index = self.choices.choose(candidates.len());
            let production = *candidates.get(index).ok_or(GenerationError::InvalidChoice {
                index,
                candidates: candidates.len(),
            })?;
            log::trace!("Applying {}", production);

            match production.rhs() {
                [Symbol::Terminal(t)] => {
                    output.push(*t);
                    forms.push(output.clone());
                    return Ok(Derivation {
                        forms,
                        word: output,
                    });
                }
                [Symbol::Terminal(t), Symbol::NonTerminal(next)] => {
                    output.push(*t);
                    forms.push(format!("{}{}", output, next));
                    current = next.as_str();
                    steps += 1;
                }
                _ => unreachable!("grammar only holds right-linear productions"),
            }
        }
    }

    /// Generate `count` words independently; a failure never stops the batch
    pub fn generate_batch(
        &mut self,
        count: usize,
        max_steps: usize,
    ) -> Vec<Result<String, GenerationError>> {
        (0..count).map(|_| self.generate(max_steps)).collect()
    }

    /// Retry [`Generator::generate`] up to `retries` extra times, returning the
    /// first word or the last error
    pub fn generate_with_retries(
        &mut self,
        max_steps: usize,
        retries: usize,
    ) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.generate(max_steps) {
                Ok(word) => return Ok(word),
                Err(err) if attempt >= retries => return Err(err),
                Err(err) => {
                    log::debug!("Attempt {} failed: {}", attempt + 1, err);
                    attempt += 1;
                }
            }
        }
    }

    /// One word using the configured step budget and retry count
    pub fn sample(&mut self) -> Result<String, GenerationError> {
        let GeneratorConfig { max_steps, retries } = self.config;
        self.generate_with_retries(max_steps, retries)
    }

    /// `count` words using the configured step budget and retry count
    pub fn sample_batch(&mut self, count: usize) -> Vec<Result<String, GenerationError>> {
        (0..count).map(|_| self.sample()).collect()
    }
}
