//! grimoire - reference page structurer

use std::process::ExitCode;

use clap::Parser;

use grimoire::{Context, SectionItem, parse_file};

#[derive(Parser)]
#[command(name = "grimoire")]
#[command(version, about = "Structure SRD-style reference pages", long_about = None)]
#[command(after_help = "EXAMPLES:
    grimoire --book core page.html             Structure a page to JSON on stdout
    grimoire --book core -o page.json page.html
    grimoire --book core --outline page.html   Show the section outline")]
struct Cli {
    /// Input HTML file
    #[arg(value_name = "INPUT")]
    input: String,

    /// Book identifier recorded on every section
    #[arg(short, long)]
    book: String,

    /// Name for the synthesized top-level section
    #[arg(short, long)]
    title: Option<String>,

    /// Maximum heading level to recognize (1-5)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=5))]
    max_title_level: u8,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Print an indented outline instead of JSON
    #[arg(long)]
    outline: bool,

    /// Suppress status messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut ctx = Context::new(&cli.book).with_max_title_level(cli.max_title_level);
    if let Some(title) = &cli.title {
        ctx = ctx.with_title(title);
    }

    let page = parse_file(&cli.input, &ctx).map_err(|e| e.to_string())?;
    let Some(page) = page else {
        return Err(format!("no body container in {}", cli.input));
    };

    if cli.outline {
        let mut rendered = String::new();
        render_outline(&page, 0, &mut rendered);
        print!("{rendered}");
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&page).map_err(|e| e.to_string())?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| e.to_string())?;
            if !cli.quiet {
                println!("wrote {path}");
            }
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Indented outline of the structured page: `#` for sections, `*` for stat
/// blocks, `|` for tables.
fn render_outline(item: &SectionItem, depth: usize, out: &mut String) {
    out.push_str(&"-".repeat(depth));
    match item {
        SectionItem::Section(section) => {
            match &section.name {
                Some(name) => out.push_str(&format!("# {name}\n")),
                None => out.push_str("# <anonymous>\n"),
            }
            if let Some(children) = &section.sections {
                for child in children {
                    render_outline(child, depth + 2, out);
                }
            }
        }
        SectionItem::StatBlock(record) => {
            out.push_str(&format!("* {}\n", record.name));
            if let Some(children) = &record.sections {
                for child in children {
                    render_outline(child, depth + 2, out);
                }
            }
        }
        SectionItem::Table(table) => match &table.name {
            Some(name) => out.push_str(&format!("| {name}\n")),
            None => out.push_str("| <table>\n"),
        },
    }
}
