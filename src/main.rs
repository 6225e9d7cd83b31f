//! kinpuzzle CLI: kinship reasoning puzzle generator.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use kinpuzzle::algebra::{RelationAlgebra, RuleStore};
use kinpuzzle::generator::{Generator, GeneratorConfig};

#[derive(Parser)]
#[command(name = "kinpuzzle", version, about = "Kinship reasoning puzzle generator")]
struct Cli {
    /// Relation rule file (TOML). Defaults to the bundled kinship rules.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Generator config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Random seed (overrides the config).
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate puzzles and print them as JSON lines.
    Generate {
        /// Facts per story.
        #[arg(long)]
        length: Option<usize>,

        /// Number of puzzles.
        #[arg(long)]
        count: Option<usize>,

        /// Attach supporting noise.
        #[arg(long)]
        supporting: bool,

        /// Attach irrelevant noise.
        #[arg(long)]
        irrelevant: bool,

        /// Attach disconnected noise.
        #[arg(long)]
        disconnected: bool,

        /// Print readable stories and proofs instead of JSON.
        #[arg(long)]
        text: bool,
    },

    /// Simulate a family and show graph, closure and expansion statistics.
    Closure,

    /// Show the relation vocabulary of the loaded rules.
    Rules,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rules = match &cli.rules {
        Some(path) => RuleStore::load(path)?,
        None => RuleStore::bundled()?,
    };
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    match cli.command {
        Commands::Generate {
            length,
            count,
            supporting,
            irrelevant,
            disconnected,
            text,
        } => {
            if let Some(length) = length {
                config.story_length = length;
            }
            if let Some(count) = count {
                config.puzzles = count;
            }
            config.noise.supporting |= supporting;
            config.noise.irrelevant |= irrelevant;
            config.noise.disconnected |= disconnected;

            let mut generator = Generator::new(config, &rules)?;
            let batch = generator.generate()?;

            for puzzle in batch.iter() {
                if text {
                    println!("{} {}", puzzle.id, puzzle.query);
                    for fact in &puzzle.story {
                        println!("  story  {fact}");
                    }
                    for group in &puzzle.noise {
                        for fact in &group.facts {
                            println!("  {:<6} {fact}", group.kind.to_string());
                        }
                    }
                    for step in &puzzle.proof {
                        println!("  proof  {step}");
                    }
                } else {
                    println!("{}", serde_json::to_string(puzzle).into_diagnostic()?);
                }
            }

            if text {
                println!("\nSignatures:");
                for (signature, count) in batch.signature_counts() {
                    println!("  {signature}: {count}");
                }
            }
        }

        Commands::Closure => {
            let generator = Generator::new(config, &rules)?;
            let graph = generator.graph();
            let closure = generator.closure();
            let index = generator.index();

            println!("People:          {}", graph.node_count());
            println!("Ground truth:    {}", graph.edge_count());
            println!("Closure edges:   {}", closure.len());
            println!("Closure rounds:  {}", closure.rounds());
            println!("Expandable:      {}", index.len());
            println!("Decompositions:  {}", index.option_count());
            println!("\nPeople:");
            for person in graph.people() {
                println!("  {} {} ({})", person.id, person.name, person.gender);
            }
        }

        Commands::Rules => {
            let algebra = RelationAlgebra::from_store(&rules, &config.channel)?;
            println!(
                "Channel \"{}\": {} relations, {} composition rules",
                algebra.channel(),
                algebra.relation_count(),
                algebra.composition_count()
            );
            for relation in algebra.relations() {
                let mut line = format!("  {}", algebra.label(relation));
                if let Some(inverse) = algebra.invert(relation) {
                    line.push_str(&format!("  inverse={}", algebra.label(inverse)));
                }
                if let Some(canonical) = algebra.canonicalize(relation) {
                    line.push_str(&format!("  same-as={}", algebra.label(canonical)));
                }
                let producers = algebra.decompositions(relation).len();
                if producers > 0 {
                    line.push_str(&format!("  produced-by={producers}"));
                }
                println!("{line}");
            }
        }
    }

    Ok(())
}
