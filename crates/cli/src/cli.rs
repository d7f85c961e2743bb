//! CLI definitions and command dispatch.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use log::info;

use fontflat_core::{
    Preset, Subsetter,
    batch::{subset_batch, subset_file},
    compare::compare,
    config::{parse_features, parse_ranges},
    inspect::FontReport,
    io::{glob_fonts, read_font},
};

#[derive(Parser)]
#[command(name = "fontflat")]
#[command(about = "Subset OpenType fonts with CFF or TrueType outlines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// What to keep and how to rewrite it.
#[derive(Debug, Clone, clap::Args)]
pub struct RequestArgs {
    /// Start from a preset's ranges and features
    #[arg(long)]
    pub preset: Option<Preset>,
    /// Code points and ranges, e.g. U+4E00-9FFF,U+3000
    #[arg(short, long)]
    pub unicodes: Option<String>,
    /// Keep every character of this text
    #[arg(short, long)]
    pub text: Option<String>,
    /// Glyph IDs to keep regardless of cmap
    #[arg(long, value_delimiter = ',')]
    pub gids: Vec<u16>,
    /// Layout features to keep; '*' for all, '' for none
    #[arg(long)]
    pub layout_features: Option<String>,
    /// Layout scripts to keep; '*' for all
    #[arg(long, default_value = "*")]
    pub layout_scripts: String,
    #[arg(long)]
    pub desubroutinize: bool,
    #[arg(long)]
    pub retain_gids: bool,
    #[arg(long)]
    pub retain_glyph_names: bool,
    #[arg(long)]
    pub drop_vf_tables: bool,
    /// Extra tables to drop
    #[arg(long, value_delimiter = ',')]
    pub drop_tables: Vec<String>,
    /// Drop malformed non-outline tables instead of failing
    #[arg(long)]
    pub best_effort: bool,
}

impl RequestArgs {
    pub fn subsetter(&self) -> Result<Subsetter> {
        let mut subsetter = self.preset.map(Preset::subsetter).unwrap_or_default();
        if let Some(unicodes) = &self.unicodes {
            subsetter = subsetter.with_unicode_ranges(parse_ranges(unicodes)?);
        }
        if let Some(text) = &self.text {
            subsetter = subsetter.with_text(text);
        }
        if let Some(features) = &self.layout_features {
            subsetter = subsetter.with_layout_features(parse_features(features)?);
        }
        let subsetter = subsetter
            .with_glyph_ids(self.gids.iter().copied())
            .with_layout_scripts(parse_features(&self.layout_scripts)?)
            .drop_tables(&self.drop_tables)?;

        // Flags only switch behavior on; a preset may already have.
        let request = subsetter.request();
        Ok(subsetter
            .desubroutinize(request.desubroutinize || self.desubroutinize)
            .retain_gids(request.retain_gids || self.retain_gids)
            .retain_glyph_names(request.retain_glyph_names || self.retain_glyph_names)
            .best_effort(request.best_effort || self.best_effort)
            .drop_vf_tables(self.drop_vf_tables || self.preset.is_some()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subset one or more fonts
    Subset {
        #[command(flatten)]
        request: RequestArgs,
        /// Output file; only valid with a single input
        #[arg(short, long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,
        #[arg(long, default_value = "dist")]
        output_dir: PathBuf,
        /// Appended to each output file stem in --output-dir
        #[arg(long, default_value = "-subset")]
        suffix: String,
        /// Glob pattern for inputs, relative to each input directory
        #[arg(long)]
        pattern: Option<String>,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print the table directory and CFF structure of fonts
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Subset with fontflat and hb-subset and compare the results
    Compare {
        #[command(flatten)]
        request: RequestArgs,
        input: PathBuf,
    },
}

impl Commands {
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Subset { request, output, output_dir, suffix, pattern, inputs } => {
                let subsetter = request.subsetter()?;
                let inputs = expand_inputs(inputs, pattern.as_deref())?;
                match output {
                    Some(output) => {
                        let [input] = inputs.as_slice() else {
                            bail!("--output needs exactly one input, got {}", inputs.len());
                        };
                        subset_file(&subsetter, input, &output)?;
                    }
                    None => {
                        subset_batch(&subsetter, &inputs, &output_dir, &suffix).ok_or_bail("Subset")?;
                    }
                }
            }
            Commands::Inspect { files } => {
                for file in files {
                    let report = FontReport::from_font(&read_font(&file)?)?;
                    println!("{}\n{report}\n", file.display());
                }
            }
            Commands::Compare { request, input } => {
                let request = request.subsetter()?.request();
                let comparison = compare(&read_font(&input)?, &request)?;
                println!("{comparison}");
            }
        }
        Ok(())
    }
}

/// Directories are expanded with `pattern` (default `*.[ot]tf`).
fn expand_inputs(inputs: Vec<PathBuf>, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = glob_fonts(&input, pattern.unwrap_or("*.[ot]tf"))?;
            info!("{}: {} fonts", input.display(), found.len());
            out.extend(found);
        } else {
            out.push(input);
        }
    }
    if out.is_empty() {
        bail!("No input fonts found");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use fontflat_subsetter::parse_tag;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_args() {
        let cli = Cli::parse_from([
            "fontflat",
            "subset",
            "--unicodes",
            "U+4E2D,U+6587",
            "--layout-features",
            "",
            "--desubroutinize",
            "--drop-tables",
            "name,DSIG",
            "font.otf",
        ]);
        let Commands::Subset { request, inputs, .. } = cli.command else {
            panic!("expected subset");
        };
        let request = request.subsetter().unwrap().request();
        assert_eq!(inputs, vec![PathBuf::from("font.otf")]);
        assert_eq!(request.unicodes.len(), 2);
        assert!(!request.wants_layout());
        assert!(request.desubroutinize);
        assert!(request.should_drop(parse_tag("name").unwrap()));
    }

    #[test]
    fn test_preset_keeps_its_flags() {
        let cli = Cli::parse_from(["fontflat", "compare", "--preset", "japanese", "font.otf"]);
        let Commands::Compare { request, .. } = cli.command else {
            panic!("expected compare");
        };
        let request = request.subsetter().unwrap().request();
        assert!(request.retain_glyph_names);
        assert!(request.should_drop(parse_tag("fvar").unwrap()));
        assert!(request.layout_features.matches(parse_tag("vert").unwrap()));
        assert!(!request.layout_features.matches(parse_tag("smcp").unwrap()));
    }
}
