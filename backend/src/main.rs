use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, MietteHandlerOpts, Result};
use tracing::info;

use u8rop::{
    compiler::{
        catalog::GadgetCatalog, core::compile_source, gadgets::GADGET_TABLE, payload::Payload,
        target::TargetProfile,
    },
    lexer, parser, utils,
};

#[derive(Parser)]
#[command(
    name = "u8rop",
    version = "0.1.0",
    about = "Compiles a tiny imperative language into nX-U8 gadget chains"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Also append logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    #[command(visible_aliases = &["lx"])]
    Lex { input: PathBuf },
    #[command(visible_aliases = &["p"])]
    Parse {
        input: PathBuf,
        #[arg(short, long)]
        target: Option<PathBuf>,
    },
    #[command(visible_aliases = &["c"])]
    Compile {
        input: PathBuf,
        /// Gadget listing: `<hex address> <description>` per line.
        #[arg(short, long)]
        gadgets: PathBuf,
        #[arg(short, long)]
        target: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Hex)]
        format: Format,
        /// Standard output when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the gadget table and, with a listing, what it resolves.
    #[command(visible_aliases = &["g"])]
    Gadgets {
        #[arg(short, long)]
        gadgets: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Hex,
    Listing,
    Bin,
    Hexdump,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(
            MietteHandlerOpts::new()
                .color(true)
                .context_lines(3)
                .build(),
        )
    }))?;
    let _guard = utils::logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.cmd {
        Cmd::Lex { input } => {
            let src = fs::read_to_string(&input).into_diagnostic()?;
            let tokens = lexer::core::lex(&display_name(&input), &src)?;
            tokens.into_iter().for_each(|t| println!("{t:?}"));
        }

        Cmd::Parse { input, target } => {
            let profile = load_profile(target.as_deref())?;
            let src = fs::read_to_string(&input).into_diagnostic()?;
            let name = display_name(&input);
            let tokens = lexer::core::lex(&name, &src)?;
            let (program, symbols) =
                parser::core::parse(&name, &src, &tokens, profile.variable_base)?;
            for variable in symbols.iter() {
                println!("VAR {} @ {:#06x}", variable.name, variable.address);
            }
            for statement in &program.statements {
                println!("{statement}");
            }
        }

        Cmd::Compile {
            input,
            gadgets,
            target,
            format,
            output,
        } => {
            let profile = load_profile(target.as_deref())?;
            let catalog = GadgetCatalog::load_file(&gadgets)?;
            let src = fs::read_to_string(&input).into_diagnostic()?;
            let payload = compile_source(&display_name(&input), &src, &catalog, &profile)?;
            info!(
                "entry point {:#06x}, {} words",
                payload.entry_point().unwrap_or_default(),
                payload.len()
            );

            let bytes = render(&payload, format, profile.word_bytes)?;
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        fs::create_dir_all(parent).into_diagnostic()?;
                    }
                    fs::write(&path, bytes).into_diagnostic()?;
                }
                None => io::stdout().write_all(&bytes).into_diagnostic()?,
            }
        }

        Cmd::Gadgets { gadgets } => {
            let catalog = match gadgets {
                Some(path) => GadgetCatalog::load_file(&path)?,
                None => GadgetCatalog::new(),
            };
            for spec in GADGET_TABLE {
                let address = catalog
                    .get(spec.id)
                    .map_or_else(|| "------".to_owned(), |a| format!("{a:#06x}"));
                println!("{address}  {:<18} {}", format!("{:?}", spec.id), spec.description);
            }
            let missing = catalog.missing();
            if !missing.is_empty() {
                println!("\n{} of {} gadgets unresolved", missing.len(), GADGET_TABLE.len());
            }
        }
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_profile(path: Option<&Path>) -> Result<TargetProfile> {
    Ok(match path {
        Some(path) => TargetProfile::load(path)?,
        None => TargetProfile::default(),
    })
}

fn render(payload: &Payload, format: Format, word_bytes: u8) -> Result<Vec<u8>> {
    Ok(match format {
        Format::Hex => payload.to_hex_words(word_bytes)?.into_bytes(),
        Format::Listing => payload.to_listing(word_bytes).into_bytes(),
        Format::Bin => payload.to_bytes(word_bytes)?,
        Format::Hexdump => (payload.to_hexdump(word_bytes)? + "\n").into_bytes(),
        Format::Json => (payload.to_json()? + "\n").into_bytes(),
    })
}
