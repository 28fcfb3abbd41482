use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regular_gen::{
    ChoiceSource, Enumerator, GenerationError, Generator, GeneratorConfig, Grammar, RngChoices,
};
use std::fs;
use std::path::PathBuf;

/// Random word generator for regular grammars
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Grammar file (text format, or JSON with a .json extension); the
    /// built-in variant 20 grammar is used if omitted
    #[arg(short, long, global = true)]
    grammar: Option<PathBuf>,

    /// Number of words to generate
    #[arg(help = "Number of words to generate", default_value_t = 5)]
    count: usize,

    /// Step budget of each derivation
    #[arg(long, global = true, default_value_t = GeneratorConfig::default().max_steps)]
    max_steps: usize,

    /// Extra attempts for a failed derivation
    #[arg(long, default_value_t = 0)]
    retries: usize,

    /// Seed for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the grammar
    Show,
    /// List words breadth-first, shortest derivations first
    Enumerate {
        #[arg(long, default_value_t = 15)]
        limit: usize,

        #[arg(long, default_value_t = 20)]
        max_len: usize,
    },
    /// Generate one word and print each sentential form of its derivation
    Trace,
    /// Write the built-in grammar to a file
    Example {
        /// Output file path
        #[arg(help = "Output file path", default_value = "variant_20_grammar.txt")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let grammar = match &cli.grammar {
        Some(path) => Grammar::from_file(path)?,
        None => Grammar::variant_20(),
    };
    let config = GeneratorConfig {
        max_steps: cli.max_steps,
        retries: cli.retries,
    };

    match cli.command {
        Some(Commands::Show) => print!("{}", grammar),
        Some(Commands::Enumerate { limit, max_len }) => {
            for word in Enumerator::new(&grammar).words(limit, max_len) {
                println!("{}", word);
            }
        }
        Some(Commands::Trace) => {
            let mut generator = Generator::with_choices(&grammar, choices(cli.seed));
            match generator.derive(config.max_steps) {
                Ok(derivation) => {
                    for form in derivation.forms() {
                        println!("{}", form);
                    }
                }
                Err(err) => println!("{}", failure_marker(&err)),
            }
        }
        Some(Commands::Example { output }) => {
            fs::write(&output, Grammar::variant_20().to_string())?;
            println!("Created example grammar at: {}", output.display());
        }
        None => {
            let mut generator =
                Generator::with_choices(&grammar, choices(cli.seed)).with_config(config);
            for (i, result) in generator.sample_batch(cli.count).into_iter().enumerate() {
                match result {
                    Ok(word) => println!("{}. {}", i + 1, word),
                    Err(err) => println!("{}. {}", i + 1, failure_marker(&err)),
                }
            }
        }
    }

    Ok(())
}

fn choices(seed: Option<u64>) -> impl ChoiceSource {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    RngChoices::new(rng)
}

fn failure_marker(err: &GenerationError) -> String {
    format!("<failed: {}>", err)
}
