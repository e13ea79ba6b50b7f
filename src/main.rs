//! # ttf-subset CLI
//!
//! Usage:
//!   ttf-subset Font.ttf -o Font-subset.ttf --glyphs 0,36-40
//!   ttf-subset Font.ttf -o Font-subset.ttf --text "Invoice"
//!   ttf-subset Fonts.ttc -o Face2.ttf --face-index 2 --text "Hello"
//!   ttf-subset Font.ttf -o Font-subset.ttf --request request.json

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ttf_subset::SubsetRequest;

#[derive(Parser, Debug)]
#[command(version, about = "Subset a TrueType font to the glyphs a document uses")]
struct Args {
    /// The input font file (.ttf or .ttc)
    font: PathBuf,

    /// The output font file
    #[arg(short, long, default_value = "subset.ttf")]
    output: PathBuf,

    /// Glyph ids to keep, e.g. `0,36-40`
    #[arg(short, long)]
    glyphs: Option<String>,

    /// Keep the glyphs for these characters
    #[arg(short, long)]
    text: Option<String>,

    /// Face within a collection
    #[arg(long)]
    face_index: Option<u32>,

    /// JSON subset request; flags given on the command line are added to it
    #[arg(long)]
    request: Option<PathBuf>,

    /// Log pipeline decisions
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let font_data =
        fs::read(&args.font).with_context(|| format!("reading {}", args.font.display()))?;

    let mut request = match &args.request {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SubsetRequest::from_json(&json)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => SubsetRequest::default(),
    };
    if let Some(glyphs) = &args.glyphs {
        request.glyph_ids.extend(parse_glyph_list(glyphs)?);
    }
    if let Some(text) = &args.text {
        request.text.get_or_insert_with(String::new).push_str(text);
    }
    if args.face_index.is_some() {
        request.face_index = args.face_index;
        request.face_offset = None;
    }
    if request.source_uri.is_none() {
        request.source_uri = Some(args.font.display().to_string());
    }

    let resolved = request.resolve(&font_data)?;
    if resolved.glyph_ids.is_empty() {
        bail!("nothing to keep: pass --glyphs, --text or --request");
    }

    let result = ttf_subset::Subsetter::new()
        .subset(
            &font_data,
            &resolved.source_uri,
            resolved.face_offset,
            &resolved.glyph_ids,
        )
        .with_context(|| format!("subsetting {}", args.font.display()))?;

    fs::write(&args.output, &result.font_data)
        .with_context(|| format!("writing {}", args.output.display()))?;
    eprintln!(
        "✓ Written {} bytes ({} glyphs) to {}",
        result.font_data.len(),
        result.glyph_map.len(),
        args.output.display()
    );
    Ok(())
}

/// Parse `0,36-40,72` into glyph ids.
fn parse_glyph_list(input: &str) -> Result<Vec<u16>> {
    let mut ids = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u16 = start.trim().parse().with_context(|| format!("bad glyph id '{}'", start))?;
                let end: u16 = end.trim().parse().with_context(|| format!("bad glyph id '{}'", end))?;
                if start > end {
                    bail!("glyph range {}-{} is backwards", start, end);
                }
                ids.extend(start..=end);
            }
            None => ids.push(
                part.parse()
                    .with_context(|| format!("bad glyph id '{}'", part))?,
            ),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_glyph_list() {
        assert_eq!(parse_glyph_list("0, 3-5,9").unwrap(), vec![0, 3, 4, 5, 9]);
        assert!(parse_glyph_list("5-3").is_err());
        assert!(parse_glyph_list("x").is_err());
        assert!(parse_glyph_list("").unwrap().is_empty());
    }
}
