use anyhow::{bail, Context};
use ccg_grammar::parse_category;
use ccg_protocol::{LexiconData, TaggerModel};
use clap::{Parser, ValueEnum};
use rkyv::ser::{serializers::AllocSerializer, Serializer};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Lexicon,
    Tagger,
}

#[derive(Parser)]
#[command(author, version, about = "Compiles a JSON lexicon or supertagger model to rkyv binary")]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    #[arg(short, long, value_enum, default_value = "lexicon")]
    kind: Kind,
}

fn check_lexicon(data: &LexiconData) -> anyhow::Result<()> {
    for entry in data.entries.iter().chain(&data.defaults) {
        parse_category(&entry.category)
            .with_context(|| format!("entry {} (`{}`)", entry.id, entry.form))?;
    }
    Ok(())
}

fn check_tagger(model: &TaggerModel) -> anyhow::Result<()> {
    if model.betas.is_empty() {
        bail!("tagger model has no beam values");
    }
    if model.betas.windows(2).any(|w| w[0] <= w[1]) {
        bail!("beam values must run from most to least restrictive: {:?}", model.betas);
    }
    for dist in &model.distributions {
        for tag in &dist.tags {
            parse_category(&tag.category).with_context(|| format!("tag for `{}`", dist.form))?;
            if !(0.0..=1.0).contains(&tag.probability) {
                bail!("probability {} for `{}` as {} is out of range", tag.probability, dist.form, tag.category);
            }
        }
    }
    Ok(())
}

fn archive<T>(value: &T) -> anyhow::Result<Vec<u8>>
where
    T: rkyv::Serialize<AllocSerializer<256>>,
{
    let mut serializer = AllocSerializer::<256>::default();
    serializer
        .serialize_value(value)
        .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {:?}", e))?;
    Ok(serializer.into_serializer().into_inner().to_vec())
}

fn compile(json: &str, kind: Kind) -> anyhow::Result<Vec<u8>> {
    match kind {
        Kind::Lexicon => {
            let data: LexiconData = serde_json::from_str(json)?;
            check_lexicon(&data)?;
            println!(
                "⚙️  Compiling lexicon version {} with {} entries and {} defaults...",
                data.version,
                data.entries.len(),
                data.defaults.len()
            );
            archive(&data)
        }
        Kind::Tagger => {
            let model: TaggerModel = serde_json::from_str(json)?;
            check_tagger(&model)?;
            println!(
                "⚙️  Compiling tagger model version {} with {} forms and {} beams...",
                model.version,
                model.distributions.len(),
                model.betas.len()
            );
            archive(&model)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    println!("📖 Reading JSON from {:?}...", cli.input);
    let input_data = fs::read_to_string(&cli.input)?;

    let bytes = compile(&input_data, cli.kind)?;
    fs::write(&cli.output, bytes)?;

    println!("✅ Success! Binary written to {:?}", cli.output);
    Ok(())
}
